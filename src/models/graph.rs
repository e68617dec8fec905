use serde::{Deserialize, Serialize};

use crate::error::EngineError;

use super::{Segment, SegmentStore};

/// Directed edge between two node positions in the segment store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
}

impl Edge {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }
}

/// What an edge represents between its two segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Speaker change (prompt/response)
    Transition,
    /// Same speaker carrying on (multi-unit turn)
    Continuation,
}

/// Segments plus the forward-in-time edges connecting them.
///
/// Node indices are positions in the `(onset, id)`-sorted store, so every
/// valid edge satisfies `from < to` and node order is a topological order.
#[derive(Debug, Clone)]
pub struct InteractionGraph {
    store: SegmentStore,
    edges: Vec<Edge>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl InteractionGraph {
    /// Assemble the graph and check the forward-time invariant on every edge.
    pub fn new(store: SegmentStore, mut edges: Vec<Edge>) -> Result<Self, EngineError> {
        edges.sort_unstable();
        edges.dedup();

        let node_count = store.len();
        for edge in &edges {
            validate_edge(&store, edge, node_count)?;
        }

        let mut successors = vec![Vec::new(); node_count];
        let mut predecessors = vec![Vec::new(); node_count];
        for edge in &edges {
            successors[edge.from].push(edge.to);
            predecessors[edge.to].push(edge.from);
        }

        Ok(Self {
            store,
            edges,
            successors,
            predecessors,
        })
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All edges, sorted by `(from, to)`
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn segment(&self, node: usize) -> Option<&Segment> {
        self.store.get(node)
    }

    /// Outgoing neighbours in ascending node order
    pub fn successors(&self, node: usize) -> &[usize] {
        self.successors.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming neighbours in ascending node order
    pub fn predecessors(&self, node: usize) -> &[usize] {
        self.predecessors.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.edges.binary_search(&Edge::new(from, to)).is_ok()
    }

    pub fn edge_kind(&self, edge: &Edge) -> EdgeKind {
        match (self.segment(edge.from), self.segment(edge.to)) {
            (Some(a), Some(b)) if a.same_speaker(b) => EdgeKind::Continuation,
            _ => EdgeKind::Transition,
        }
    }
}

fn validate_edge(store: &SegmentStore, edge: &Edge, node_count: usize) -> Result<(), EngineError> {
    let (from, to) = match (store.get(edge.from), store.get(edge.to)) {
        (Some(from), Some(to)) => (from, to),
        _ => {
            return Err(EngineError::UnknownNode {
                node: edge.from.max(edge.to),
                node_count,
            })
        }
    };

    if edge.from == edge.to {
        return Err(EngineError::SelfLoop(from.id));
    }

    let backwards = edge.from > edge.to
        || from.onset > to.onset
        || (from.onset == to.onset && from.id > to.id);
    if backwards {
        return Err(EngineError::BackwardEdge {
            from: from.id,
            to: to.id,
            from_onset: from.onset,
            to_onset: to.onset,
        });
    }

    Ok(())
}
