pub mod error;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod policy;
pub mod scoring;
pub mod stages;

pub use error::{ConfigError, EngineError};
pub use io::{parse_segment_json, AnnotatedRow, AnnotatedTranscript, GraphExport};
pub use models::{
    BestPath, Edge, EdgeKind, InteractionGraph, InteractionalSequence, PathStats, PathView,
    SearchStrategy, Segment, SegmentId, SegmentRecord, SegmentStore, SequencePartition, Turn,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput};
pub use policy::{ConnectivityPolicy, PolicyConfig, RulePolicy, SpeakerRule, TemporalRule};
pub use scoring::{FnScorer, PathScorer, PathStatistic, Score, ScorerSpec};
pub use stages::{
    enumerate_paths, execute_stage0, execute_stage1, execute_stage2, execute_stage3,
    find_best_path, Stage0Config, Stage1Config, Stage2Config, Stage3Config,
};
