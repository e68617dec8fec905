use serde::{Deserialize, Serialize};

use super::Edge;

/// A maximal run of same-speaker segments linked by continuation edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Position of this turn within its sequence (0-based, onset order)
    pub index: usize,
    /// Speaker for this turn
    pub speaker: String,
    /// Node positions in this turn, ascending
    pub nodes: Vec<usize>,
    /// Earliest onset of the turn's segments
    pub onset: f64,
    /// Latest offset of the turn's segments
    pub offset: f64,
}

impl Turn {
    pub fn duration(&self) -> f64 {
        self.offset - self.onset
    }

    /// Number of segments in this turn
    pub fn unit_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_multi_unit(&self) -> bool {
        self.nodes.len() > 1
    }
}

/// A weakly-connected component of the interaction graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionalSequence {
    /// Position of this sequence in the partition (0-based, earliest onset first)
    pub index: usize,
    /// Output label (1-based) for sequences that are reported, `None` otherwise
    pub label: Option<usize>,
    /// Node positions, ascending
    pub nodes: Vec<usize>,
    /// Edges inside this sequence, sorted
    pub edges: Vec<Edge>,
    /// Turn decomposition, in onset order
    pub turns: Vec<Turn>,
    /// Nodes with no incoming edge
    pub start_nodes: Vec<usize>,
    /// Nodes with no outgoing edge
    pub end_nodes: Vec<usize>,
}

impl InteractionalSequence {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Single segment, no edges
    pub fn is_singleton(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn contains(&self, node: usize) -> bool {
        self.nodes.binary_search(&node).is_ok()
    }

    /// Position of `node` inside `nodes`
    pub fn local_index(&self, node: usize) -> Option<usize> {
        self.nodes.binary_search(&node).ok()
    }

    pub fn is_start(&self, node: usize) -> bool {
        self.start_nodes.binary_search(&node).is_ok()
    }

    pub fn is_end(&self, node: usize) -> bool {
        self.end_nodes.binary_search(&node).is_ok()
    }

    pub fn is_reported(&self) -> bool {
        self.label.is_some()
    }
}

/// Partition of every graph node into interactional sequences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencePartition {
    pub sequences: Vec<InteractionalSequence>,
    /// node position -> sequence index
    pub(crate) node_sequence: Vec<usize>,
    /// node position -> turn index within its sequence
    pub(crate) node_turn: Vec<usize>,
}

impl SequencePartition {
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn sequence_of(&self, node: usize) -> Option<&InteractionalSequence> {
        self.node_sequence
            .get(node)
            .and_then(|&i| self.sequences.get(i))
    }

    pub fn turn_of(&self, node: usize) -> Option<&Turn> {
        let sequence = self.sequence_of(node)?;
        self.node_turn.get(node).and_then(|&t| sequence.turns.get(t))
    }

    /// Sequences that carry an output label
    pub fn reported(&self) -> impl Iterator<Item = &InteractionalSequence> {
        self.sequences.iter().filter(|s| s.is_reported())
    }
}
