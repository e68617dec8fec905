use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::models::{Edge, InteractionGraph, SegmentStore};
use crate::policy::ConnectivityPolicy;

use super::workers::run_chunked;

/// Configuration for Stage 1 graph construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage1Config {
    /// Whether a segment may link to several successors of the same speaker.
    /// When false only the earliest accepted successor per speaker is kept.
    pub allow_segment_jump: bool,
    /// Number of worker threads evaluating candidate pairs
    pub parallelism: usize,
}

impl Default for Stage1Config {
    fn default() -> Self {
        Self {
            allow_segment_jump: true,
            parallelism: 1,
        }
    }
}

/// Result of Stage 1 graph construction
#[derive(Debug)]
pub struct Stage1Result {
    pub graph: InteractionGraph,
    /// Pairs inside the lookahead window that were handed to the policy
    pub candidate_pairs: usize,
    /// Accepted edges dropped by the segment-jump restriction
    pub jump_pruned: usize,
}

/// Execute Stage 1: connect segments into a forward-in-time DAG
///
/// For every segment, candidates are scanned in `(onset, id)` order until
/// their onset passes `onset + max_duration + policy.max_reach()`; nothing
/// beyond that horizon can satisfy the gap bound. Accepted pairs become edges
/// from the earlier to the later segment, which keeps the graph acyclic.
pub fn execute_stage1(
    store: SegmentStore,
    policy: &dyn ConnectivityPolicy,
    config: &Stage1Config,
) -> Result<Stage1Result, EngineError> {
    let reach = store.max_duration() + policy.max_reach();

    let chunks = run_chunked(store.len(), config.parallelism, |range| {
        let mut edges = Vec::new();
        let mut candidates = 0usize;
        let mut pruned = 0usize;

        for from in range {
            let scan = scan_successors(&store, policy, from, reach, config.allow_segment_jump);
            candidates += scan.candidates;
            pruned += scan.jump_pruned;
            edges.extend(scan.successors.into_iter().map(|to| Edge::new(from, to)));
        }
        (edges, candidates, pruned)
    });

    let mut edges = Vec::new();
    let mut candidate_pairs = 0;
    let mut jump_pruned = 0;
    for (chunk_edges, candidates, pruned) in chunks {
        edges.extend(chunk_edges);
        candidate_pairs += candidates;
        jump_pruned += pruned;
    }

    let graph = InteractionGraph::new(store, edges)?;
    info!(
        "Built interaction graph: {} nodes, {} edges ({} candidate pairs, {} pruned by segment jump)",
        graph.node_count(),
        graph.edge_count(),
        candidate_pairs,
        jump_pruned
    );

    Ok(Stage1Result {
        graph,
        candidate_pairs,
        jump_pruned,
    })
}

struct SuccessorScan {
    successors: Vec<usize>,
    candidates: usize,
    jump_pruned: usize,
}

fn scan_successors(
    store: &SegmentStore,
    policy: &dyn ConnectivityPolicy,
    from: usize,
    reach: f64,
    allow_segment_jump: bool,
) -> SuccessorScan {
    let segments = store.segments();
    let source = &segments[from];
    let horizon = source.onset + reach;

    let mut scan = SuccessorScan {
        successors: Vec::new(),
        candidates: 0,
        jump_pruned: 0,
    };
    let mut seen_speakers: HashSet<&str> = HashSet::new();

    for (to, candidate) in segments.iter().enumerate().skip(from + 1) {
        if candidate.onset > horizon {
            break;
        }
        scan.candidates += 1;

        if !policy.can_connect(source, candidate) {
            continue;
        }
        if !allow_segment_jump && !seen_speakers.insert(candidate.speaker.as_str()) {
            scan.jump_pruned += 1;
            continue;
        }
        scan.successors.push(to);
    }

    if !scan.successors.is_empty() {
        debug!("Segment {} -> {:?}", source.id, scan.successors);
    }
    scan
}
