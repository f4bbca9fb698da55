//! # srcdb - source-code search engine core
//!
//! Ingests a repository's files, extracts structural lexical information and
//! builds stores that answer identity lookups, directory browsing and "find
//! all usages" queries.
//!
//! ## Architecture
//!
//! - [`index::source`] - file contents keyed by id and by `(project, path)`
//! - [`index::usage`] - reverse lookup from a symbol to every usage
//! - [`index::layout`] - snapshots of one directory's immediate children
//! - [`parser`] - source text to structurally tagged tokens and index terms
//! - [`index::build`] - crawls a project and feeds all of the above
//!
//! Stores are written once by a single-owner writer and published by
//! `close()`. Readers are immutable and can be shared between threads.
//!
//! ## Quick Start
//!
//! ```no_run
//! use srcdb::index::{SourceFile, SourceReader, SourceWriter};
//! use std::path::Path;
//!
//! let dir = Path::new("/tmp/srcdb-demo");
//! let mut writer = SourceWriter::create(dir)?;
//! writer.write(&SourceFile::new(1, "demo", "/src/Main.java", b"class Main {}".to_vec()))?;
//! writer.write_directory("demo", "/src")?;
//! writer.close()?;
//!
//! let reader = SourceReader::open(dir)?;
//! assert_eq!(reader.list_directory("demo", "/src"), vec!["Main.java"]);
//! # Ok::<(), srcdb::Error>(())
//! ```

pub mod error;
pub mod index;
pub mod parser;
pub mod utils;

pub use error::{Error, Result};
