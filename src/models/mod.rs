pub mod graph;
pub mod path;
pub mod segment;
pub mod sequence;

pub use graph::*;
pub use path::*;
pub use segment::*;
pub use sequence::*;
