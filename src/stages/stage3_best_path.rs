use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::models::{
    BestPath, InteractionGraph, InteractionalSequence, PathView, SearchStrategy, SegmentId,
    SequencePartition,
};
use crate::scoring::{score_path, PathScorer, Score};

use super::workers::run_chunked;

/// Configuration for Stage 3 best-path selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage3Config {
    /// Largest sequence (in segments) searched exhaustively when the scorer
    /// is not prefix-monotonic
    pub exhaustive_limit: usize,
    /// Number of worker threads, each handling a contiguous block of sequences
    pub parallelism: usize,
}

impl Default for Stage3Config {
    fn default() -> Self {
        Self {
            exhaustive_limit: 10,
            parallelism: 1,
        }
    }
}

/// Result of Stage 3 best-path selection
#[derive(Debug)]
pub struct Stage3Result {
    /// One entry per sequence, in partition order
    pub best_paths: Vec<BestPath>,
    pub unique: usize,
    pub dynamic: usize,
    pub exhaustive: usize,
}

/// Execute Stage 3: select the highest-scoring start-to-end path of every sequence
///
/// Sequences are independent and may be searched on several threads; the
/// result is identical for any `parallelism`. The first failing sequence in
/// partition order determines the returned error.
pub fn execute_stage3(
    graph: &InteractionGraph,
    partition: &SequencePartition,
    scorer: &dyn PathScorer,
    config: &Stage3Config,
) -> Result<Stage3Result, EngineError> {
    let chunks = run_chunked(partition.len(), config.parallelism, |range| {
        partition.sequences[range]
            .iter()
            .map(|sequence| find_best_path(graph, sequence, scorer, config))
            .collect::<Result<Vec<_>, _>>()
    });

    let mut best_paths = Vec::with_capacity(partition.len());
    for chunk in chunks {
        best_paths.extend(chunk?);
    }

    let count = |strategy: SearchStrategy| best_paths.iter().filter(|p| p.strategy == strategy).count();
    let result = Stage3Result {
        unique: count(SearchStrategy::Unique),
        dynamic: count(SearchStrategy::DynamicProgramming),
        exhaustive: count(SearchStrategy::Exhaustive),
        best_paths,
    };

    info!(
        "Selected best paths with {}: {} unique, {} dynamic, {} exhaustive",
        scorer.name(),
        result.unique,
        result.dynamic,
        result.exhaustive
    );
    Ok(result)
}

/// Select the best start-to-end path of one sequence
///
/// Ties between equally scored candidates go to the path through the
/// predecessor (or ending at the end node) with the smaller segment id.
pub fn find_best_path(
    graph: &InteractionGraph,
    sequence: &InteractionalSequence,
    scorer: &dyn PathScorer,
    config: &Stage3Config,
) -> Result<BestPath, EngineError> {
    let (nodes, strategy) = if is_chain(graph, sequence) {
        (sequence.nodes.clone(), SearchStrategy::Unique)
    } else if scorer.is_prefix_monotonic() {
        (dynamic_best(graph, sequence, scorer)?, SearchStrategy::DynamicProgramming)
    } else if sequence.len() <= config.exhaustive_limit {
        (exhaustive_best(graph, sequence, scorer)?, SearchStrategy::Exhaustive)
    } else {
        warn!(
            "Scorer {} is not prefix-monotonic; sequence {} has {} segments, above the exhaustive limit {}. The selected path may not be optimal",
            scorer.name(),
            sequence.index,
            sequence.len(),
            config.exhaustive_limit
        );
        (dynamic_best(graph, sequence, scorer)?, SearchStrategy::DynamicProgramming)
    };

    let view = PathView::new(graph, &nodes);
    let score = score_path(scorer, &view)?;
    debug!(
        "Sequence {}: best path {:?} scored {:?}",
        sequence.index,
        view.ids(),
        score.components()
    );

    Ok(BestPath {
        sequence: sequence.index,
        stats: view.stats(),
        nodes,
        score,
        strategy,
    })
}

/// Every start-to-end path of a sequence, in depth-first order
///
/// The count grows exponentially with the number of branching points; only
/// call this on small sequences.
pub fn enumerate_paths(graph: &InteractionGraph, sequence: &InteractionalSequence) -> Vec<Vec<usize>> {
    let mut paths = Vec::new();
    let mut stack = Vec::new();
    for &start in &sequence.start_nodes {
        extend_paths(graph, start, &mut stack, &mut paths);
    }
    paths
}

fn extend_paths(graph: &InteractionGraph, node: usize, stack: &mut Vec<usize>, paths: &mut Vec<Vec<usize>>) {
    stack.push(node);
    let successors = graph.successors(node);
    if successors.is_empty() {
        paths.push(stack.clone());
    }
    for &next in successors {
        extend_paths(graph, next, stack, paths);
    }
    stack.pop();
}

/// A sequence in which no node branches has exactly one start-to-end path
fn is_chain(graph: &InteractionGraph, sequence: &InteractionalSequence) -> bool {
    sequence
        .nodes
        .iter()
        .all(|&n| graph.predecessors(n).len() <= 1 && graph.successors(n).len() <= 1)
}

fn segment_id(graph: &InteractionGraph, node: usize) -> SegmentId {
    graph.segment(node).map_or(SegmentId(node), |s| s.id)
}

/// Topological DP over node positions: each node keeps the best-scoring path
/// from any start node that ends in it.
fn dynamic_best(
    graph: &InteractionGraph,
    sequence: &InteractionalSequence,
    scorer: &dyn PathScorer,
) -> Result<Vec<usize>, EngineError> {
    let mut back: Vec<Option<usize>> = vec![None; sequence.len()];
    let mut best: Vec<Option<Score>> = vec![None; sequence.len()];

    let path_to = |back: &[Option<usize>], local: usize| -> Vec<usize> {
        let mut path = Vec::new();
        let mut cursor = Some(local);
        while let Some(i) = cursor {
            path.push(sequence.nodes[i]);
            cursor = back[i];
        }
        path.reverse();
        path
    };

    for (local, &node) in sequence.nodes.iter().enumerate() {
        let predecessors = graph.predecessors(node);
        if predecessors.is_empty() {
            best[local] = Some(score_path(scorer, &PathView::new(graph, &[node]))?);
            continue;
        }

        let mut chosen: Option<(usize, Score)> = None;
        for &pred in predecessors {
            let pred_local = sequence.local_index(pred).ok_or_else(|| EngineError::CrossSequenceEdge {
                from: segment_id(graph, pred),
                to: segment_id(graph, node),
            })?;

            let mut candidate = path_to(&back, pred_local);
            candidate.push(node);
            let score = score_path(scorer, &PathView::new(graph, &candidate))?;

            let better = match &chosen {
                None => true,
                Some((current, current_score)) => match score.compare(current_score) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => {
                        segment_id(graph, pred) < segment_id(graph, sequence.nodes[*current])
                    }
                },
            };
            if better {
                chosen = Some((pred_local, score));
            }
        }

        if let Some((pred_local, score)) = chosen {
            back[local] = Some(pred_local);
            best[local] = Some(score);
        }
    }

    let mut winner: Option<(usize, &Score)> = None;
    for &end in &sequence.end_nodes {
        let Some(local) = sequence.local_index(end) else {
            continue;
        };
        let Some(score) = best[local].as_ref() else {
            continue;
        };
        let better = match winner {
            None => true,
            Some((current, current_score)) => match score.compare(current_score) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => segment_id(graph, end) < segment_id(graph, sequence.nodes[current]),
            },
        };
        if better {
            winner = Some((local, score));
        }
    }

    Ok(match winner {
        Some((local, _)) => path_to(&back, local),
        None => Vec::new(),
    })
}

fn exhaustive_best(
    graph: &InteractionGraph,
    sequence: &InteractionalSequence,
    scorer: &dyn PathScorer,
) -> Result<Vec<usize>, EngineError> {
    let mut winner: Option<(Vec<usize>, Score, Vec<SegmentId>)> = None;

    for path in enumerate_paths(graph, sequence) {
        let view = PathView::new(graph, &path);
        let score = score_path(scorer, &view)?;
        let ids = view.ids();

        let better = match &winner {
            None => true,
            Some((_, current_score, current_ids)) => match score.compare(current_score) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => ids < *current_ids,
            },
        };
        if better {
            winner = Some((path, score, ids));
        }
    }

    Ok(winner.map(|(path, _, _)| path).unwrap_or_default())
}
