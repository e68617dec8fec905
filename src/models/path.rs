use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::scoring::Score;

use super::{Edge, InteractionGraph, Segment, SegmentId};

/// Summary statistics of a path, the inputs of the built-in scorers
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PathStats {
    /// Number of segments on the path
    pub num_segments: usize,
    /// Number of distinct speakers
    pub num_speakers: usize,
    /// Number of turns traversed (speaker runs)
    pub num_turns: usize,
    /// Consecutive pairs with a speaker change
    pub num_turn_transitions: usize,
    /// Consecutive pairs with the same speaker
    pub num_multi_unit_transitions: usize,
    /// Sum of segment durations
    pub total_duration: f64,
}

impl PathStats {
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a Segment>) -> Self {
        let mut stats = PathStats::default();
        let mut speakers = BTreeSet::new();
        let mut previous: Option<&Segment> = None;

        for segment in segments {
            stats.num_segments += 1;
            stats.total_duration += segment.duration();
            speakers.insert(segment.speaker.as_str());

            match previous {
                Some(prev) if prev.same_speaker(segment) => stats.num_multi_unit_transitions += 1,
                Some(_) => stats.num_turn_transitions += 1,
                None => {}
            }
            previous = Some(segment);
        }

        stats.num_speakers = speakers.len();
        stats.num_turns = if stats.num_segments == 0 {
            0
        } else {
            stats.num_turn_transitions + 1
        };
        stats
    }
}

/// Borrowed view of a candidate path, handed to scorers
#[derive(Debug, Clone, Copy)]
pub struct PathView<'a> {
    graph: &'a InteractionGraph,
    nodes: &'a [usize],
}

impl<'a> PathView<'a> {
    pub fn new(graph: &'a InteractionGraph, nodes: &'a [usize]) -> Self {
        Self { graph, nodes }
    }

    /// Node positions along the path
    pub fn nodes(&self) -> &'a [usize] {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &'a Segment> + 'a {
        let graph = self.graph;
        self.nodes.iter().filter_map(move |&n| graph.segment(n))
    }

    pub fn ids(&self) -> Vec<SegmentId> {
        self.segments().map(|s| s.id).collect()
    }

    pub fn stats(&self) -> PathStats {
        PathStats::from_segments(self.segments())
    }

    pub fn graph(&self) -> &'a InteractionGraph {
        self.graph
    }
}

/// How a sequence's best path was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// The sequence has exactly one start-to-end path
    Unique,
    /// Topological dynamic programming
    DynamicProgramming,
    /// Full enumeration of start-to-end paths
    Exhaustive,
}

/// The selected start-to-end path of one sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPath {
    /// Index of the sequence in the partition
    pub sequence: usize,
    /// Node positions from start node to end node
    pub nodes: Vec<usize>,
    pub score: Score,
    pub stats: PathStats,
    pub strategy: SearchStrategy,
}

impl BestPath {
    pub fn edges(&self) -> Vec<Edge> {
        self.nodes
            .windows(2)
            .map(|pair| Edge::new(pair[0], pair[1]))
            .collect()
    }

    pub fn contains_node(&self, node: usize) -> bool {
        self.nodes.contains(&node)
    }

    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.nodes
            .windows(2)
            .any(|pair| pair[0] == edge.from && pair[1] == edge.to)
    }
}
