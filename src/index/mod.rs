pub mod build;
pub mod layout;
pub mod segment;
pub mod sink;
pub mod source;
pub mod stats;
pub mod types;
pub mod usage;

/// Subdirectory of an index directory holding the source store
pub const SOURCE_DIR: &str = "source";

/// Subdirectory of an index directory holding the usage store
pub const USAGE_DIR: &str = "usage";

pub use build::{build_project, import_usages, BuildOptions, BuildReport, Failure};
pub use layout::LayoutIndexer;
pub use sink::{IndexSink, MemoryIndexSink};
pub use source::{SourceReader, SourceWriter};
pub use types::*;
pub use usage::{UsageReader, UsageWriter, Usages};
