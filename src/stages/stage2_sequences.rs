use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{Edge, EdgeKind, InteractionGraph, InteractionalSequence, SequencePartition, Turn};

/// Configuration for Stage 2 sequence extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage2Config {
    /// Only report sequences containing at least one segment of this speaker
    pub required_speaker: Option<String>,
    /// Whether single-segment sequences receive an output label
    pub label_singletons: bool,
}

/// Result of Stage 2 sequence extraction
#[derive(Debug)]
pub struct Stage2Result {
    pub partition: SequencePartition,
    /// Sequences with a single segment and no edges
    pub singleton_count: usize,
    /// Multi-segment sequences dropped by the speaker filter
    pub filtered_count: usize,
}

/// Index-based disjoint-set forest with path halving and union by rank
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    pub fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    /// Dense group id per node, numbered in order of each group's lowest node
    pub fn groups(&mut self) -> Vec<usize> {
        let len = self.parent.len();
        let mut root_group = vec![usize::MAX; len];
        let mut next = 0;
        (0..len)
            .map(|node| {
                let root = self.find(node);
                if root_group[root] == usize::MAX {
                    root_group[root] = next;
                    next += 1;
                }
                root_group[root]
            })
            .collect()
    }
}

/// Execute Stage 2: partition the graph into interactional sequences
///
/// Sequences are the weakly-connected components, numbered by their
/// earliest segment. Within each sequence, turns are built greedily in onset
/// order: a segment extends the current turn only when the previous segment
/// of the sequence has the same speaker and links to it directly. Start and
/// end nodes are those without incoming or outgoing edges.
pub fn execute_stage2(graph: &InteractionGraph, config: &Stage2Config) -> Stage2Result {
    let node_count = graph.node_count();

    let mut components = UnionFind::new(node_count);
    for edge in graph.edges() {
        components.union(edge.from, edge.to);
    }
    let node_sequence = components.groups();

    let sequence_count = node_sequence.iter().max().map_or(0, |&m| m + 1);
    let mut sequences: Vec<InteractionalSequence> = (0..sequence_count)
        .map(|index| InteractionalSequence {
            index,
            label: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            turns: Vec::new(),
            start_nodes: Vec::new(),
            end_nodes: Vec::new(),
        })
        .collect();

    for node in 0..node_count {
        let sequence = &mut sequences[node_sequence[node]];
        sequence.nodes.push(node);
        if graph.predecessors(node).is_empty() {
            sequence.start_nodes.push(node);
        }
        if graph.successors(node).is_empty() {
            sequence.end_nodes.push(node);
        }
    }
    for edge in graph.edges() {
        sequences[node_sequence[edge.from]].edges.push(*edge);
    }

    let mut node_turn = vec![0; node_count];
    for sequence in &mut sequences {
        sequence.turns = decompose_turns(graph, &sequence.nodes, &mut node_turn);
    }

    let mut singleton_count = 0;
    let mut filtered_count = 0;
    let mut next_label = 1;
    for sequence in &mut sequences {
        if sequence.is_singleton() {
            singleton_count += 1;
            if !config.label_singletons {
                continue;
            }
        }
        if let Some(required) = &config.required_speaker {
            let has_speaker = sequence
                .nodes
                .iter()
                .filter_map(|&n| graph.segment(n))
                .any(|s| &s.speaker == required);
            if !has_speaker {
                if !sequence.is_singleton() {
                    filtered_count += 1;
                }
                debug!("Sequence {} has no segment from {}", sequence.index, required);
                continue;
            }
        }
        sequence.label = Some(next_label);
        next_label += 1;
    }

    info!(
        "Found {} interactional sequences ({} reported, {} singletons, {} filtered)",
        sequences.len(),
        next_label - 1,
        singleton_count,
        filtered_count
    );

    Stage2Result {
        partition: SequencePartition {
            sequences,
            node_sequence,
            node_turn,
        },
        singleton_count,
        filtered_count,
    }
}

/// Group a sequence's nodes into turns, in onset order
fn decompose_turns(
    graph: &InteractionGraph,
    nodes: &[usize],
    node_turn: &mut [usize],
) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();
    let mut previous: Option<usize> = None;

    for &node in nodes {
        let Some(segment) = graph.segment(node) else {
            continue;
        };

        let continues = previous.is_some_and(|prev| {
            graph.has_edge(prev, node)
                && graph.edge_kind(&Edge::new(prev, node)) == EdgeKind::Continuation
        });

        match turns.last_mut() {
            Some(turn) if continues => {
                turn.nodes.push(node);
                turn.onset = turn.onset.min(segment.onset);
                turn.offset = turn.offset.max(segment.offset);
            }
            _ => {
                let index = turns.len();
                turns.push(Turn {
                    index,
                    speaker: segment.speaker.clone(),
                    nodes: vec![node],
                    onset: segment.onset,
                    offset: segment.offset,
                });
            }
        }

        node_turn[node] = turns.len() - 1;
        previous = Some(node);
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Segment, SegmentStore};

    fn graph() -> InteractionGraph {
        let store = SegmentStore::new(
            vec![
                Segment::new(0, "A", 0.0, 1.0),
                Segment::new(1, "B", 1.2, 2.0),
                Segment::new(2, "B", 2.2, 3.0),
                Segment::new(3, "A", 3.2, 4.0),
                Segment::new(4, "C", 10.0, 11.0),
                Segment::new(5, "B", 20.0, 21.0),
                Segment::new(6, "C", 21.5, 22.0),
            ],
            7,
        );
        InteractionGraph::new(
            store,
            vec![
                Edge::new(0, 1),
                Edge::new(1, 2),
                Edge::new(2, 3),
                Edge::new(5, 6),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_union_find_groups_in_node_order() {
        let mut uf = UnionFind::new(5);
        uf.union(3, 4);
        uf.union(1, 3);
        assert_eq!(uf.groups(), vec![0, 1, 2, 1, 1]);
    }

    #[test]
    fn test_partition_and_turns() {
        let result = execute_stage2(&graph(), &Stage2Config::default());
        let partition = &result.partition;

        assert_eq!(partition.len(), 3);
        assert_eq!(partition.sequences[0].nodes, vec![0, 1, 2, 3]);
        assert_eq!(partition.sequences[1].nodes, vec![4]);
        assert_eq!(partition.sequences[2].nodes, vec![5, 6]);

        let turns: Vec<Vec<usize>> = partition.sequences[0]
            .turns
            .iter()
            .map(|t| t.nodes.clone())
            .collect();
        assert_eq!(turns, vec![vec![0], vec![1, 2], vec![3]]);
        assert_eq!(partition.turn_of(2).map(|t| t.index), Some(1));

        assert_eq!(partition.sequences[0].start_nodes, vec![0]);
        assert_eq!(partition.sequences[0].end_nodes, vec![3]);
        assert_eq!(partition.sequences[1].start_nodes, vec![4]);
        assert_eq!(partition.sequences[1].end_nodes, vec![4]);
    }

    #[test]
    fn test_turn_ends_at_other_speaker() {
        // A links to its own later segment across B's turn
        let store = SegmentStore::new(
            vec![
                Segment::new(0, "A", 0.0, 1_000.0),
                Segment::new(1, "B", 1_200.0, 2_000.0),
                Segment::new(2, "A", 2_300.0, 3_000.0),
            ],
            3,
        );
        let graph = InteractionGraph::new(
            store,
            vec![Edge::new(0, 1), Edge::new(0, 2), Edge::new(1, 2)],
        )
        .unwrap();

        let partition = execute_stage2(&graph, &Stage2Config::default()).partition;
        let turns: Vec<Vec<usize>> = partition.sequences[0]
            .turns
            .iter()
            .map(|t| t.nodes.clone())
            .collect();

        assert_eq!(turns, vec![vec![0], vec![1], vec![2]]);
        assert_eq!(partition.turn_of(2).map(|t| t.index), Some(2));
    }

    #[test]
    fn test_labels_skip_singletons() {
        let result = execute_stage2(&graph(), &Stage2Config::default());
        let labels: Vec<Option<usize>> = result
            .partition
            .sequences
            .iter()
            .map(|s| s.label)
            .collect();

        assert_eq!(labels, vec![Some(1), None, Some(2)]);
        assert_eq!(result.singleton_count, 1);
    }

    #[test]
    fn test_required_speaker_filter() {
        let config = Stage2Config {
            required_speaker: Some("A".to_string()),
            label_singletons: false,
        };
        let result = execute_stage2(&graph(), &config);
        let labels: Vec<Option<usize>> = result
            .partition
            .sequences
            .iter()
            .map(|s| s.label)
            .collect();

        assert_eq!(labels, vec![Some(1), None, None]);
        assert_eq!(result.filtered_count, 1);
    }
}
