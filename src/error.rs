//! Error taxonomy shared by the stores, the layout indexer and the build driver.
//!
//! Misses are never errors: lookups return `Ok(None)` and usage queries return
//! an empty sequence. Everything here is either a rejected input (recoverable
//! per item) or a broken invariant (fatal for the build).

use crate::parser::ParseError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("duplicate file id {0}")]
    DuplicateId(u64),

    #[error("duplicate path {project}:{path}")]
    DuplicatePath { project: String, path: String },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("bad directory {}: {source}", path.display())]
    BadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {project}:{path}: {source}")]
    Parse {
        project: String,
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store at {} was never finalized", .0.display())]
    NotFinalized(PathBuf),

    #[error("store writer at {} failed an earlier write", .0.display())]
    Poisoned(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::CorruptIndex(msg.into())
    }

    /// Fatal errors mean the on-disk data, an encoder or the store files
    /// themselves are broken and the current build must stop. Everything else
    /// only affects one item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::CorruptIndex(_) | Error::Serialization(_) | Error::Poisoned(_) | Error::Io(_)
        )
    }

    pub(crate) fn bad_directory(path: &Path, source: io::Error) -> Self {
        Error::BadDirectory {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
