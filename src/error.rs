use thiserror::Error;

use crate::models::SegmentId;

/// Setup-time configuration failures. Raised before any construction begins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{rule} rule: {field} must be finite, got {value}")]
    NonFiniteThreshold {
        rule: &'static str,
        field: &'static str,
        value: f64,
    },

    #[error("{rule} rule: max_gap must be non-negative, got {value}")]
    NegativeMaxGap { rule: &'static str, value: f64 },

    #[error("{rule} rule: min_gap {min} exceeds max_gap {max}")]
    InvertedGapBounds {
        rule: &'static str,
        min: f64,
        max: f64,
    },

    #[error("{rule} rule: max_overlap must be non-negative, got {value}")]
    NegativeMaxOverlap { rule: &'static str, value: f64 },

    #[error("speaker-pair relation is empty; no cross-speaker transition could ever be created")]
    EmptySpeakerRelation,

    #[error("invalid duration filter: {0}")]
    InvalidDurationFilter(String),

    #[error("invalid linguistic filter: {0}")]
    InvalidLinguisticFilter(String),

    #[error("best-path selection requested but no scorer is configured")]
    MissingScorer,

    #[error("scorer '{scorer}' has no terms")]
    EmptyScorer { scorer: String },

    #[error("scorer '{scorer}' returned non-comparable score {score:?} for path {path:?}")]
    NonComparableScore {
        scorer: String,
        score: Vec<f64>,
        path: Vec<SegmentId>,
    },
}

/// Fatal failures raised while running the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(
        "edge {from} -> {to} violates forward-time ordering (onset {from_onset} -> {to_onset})"
    )]
    BackwardEdge {
        from: SegmentId,
        to: SegmentId,
        from_onset: f64,
        to_onset: f64,
    },

    #[error("self-loop on segment {0}")]
    SelfLoop(SegmentId),

    #[error("edge references node {node} but the graph only has {node_count} nodes")]
    UnknownNode { node: usize, node_count: usize },

    #[error("edge {from} -> {to} crosses an interactional sequence boundary")]
    CrossSequenceEdge { from: SegmentId, to: SegmentId },
}
