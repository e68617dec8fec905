pub mod stage0_load;
pub mod stage1_build_graph;
pub mod stage2_sequences;
pub mod stage3_best_path;
pub mod workers;

pub use stage0_load::*;
pub use stage1_build_graph::*;
pub use stage2_sequences::*;
pub use stage3_best_path::*;
pub use workers::run_chunked;
