//! Source store: file contents keyed by id and by `(project, path)`.
//!
//! On disk a store is a directory with:
//!
//! - `source.log` - append-only `[len u32][record]` entries
//! - `source.ids` - fixed `[id u64][offset u64]` entries sorted by id
//! - `source.paths` - `[kind u8][project][path][offset u64]` entries sorted by
//!   `(project, path)`; directory markers carry no offset
//! - `meta.json` - written last by [`SourceWriter::close`]

mod reader;
mod writer;

pub use reader::SourceReader;
pub use writer::SourceWriter;

use crate::error::{Error, Result};
use crate::index::types::SourceFile;
use crate::utils::{put_bytes, put_str, ByteReader};

pub const LOG_FILE: &str = "source.log";
pub const IDS_FILE: &str = "source.ids";
pub const PATHS_FILE: &str = "source.paths";

pub(crate) const LOG_MAGIC: u32 = 0x5344_4C47; // "SDLG"
pub(crate) const IDS_MAGIC: u32 = 0x5344_4944; // "SDID"
pub(crate) const PATHS_MAGIC: u32 = 0x5344_5054; // "SDPT"

/// Bytes per entry in `source.ids`
pub(crate) const ID_ENTRY_LEN: usize = 16;

const KIND_FILE: u8 = 0;
const KIND_DIRECTORY: u8 = 1;

/// What a path-index key points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathTarget {
    File(u64),
    Directory,
}

impl PathTarget {
    fn tag(self) -> u8 {
        match self {
            PathTarget::File(_) => KIND_FILE,
            PathTarget::Directory => KIND_DIRECTORY,
        }
    }
}

pub(crate) fn encode_path_entry(project: &str, path: &str, target: PathTarget, buf: &mut Vec<u8>) {
    buf.push(target.tag());
    put_str(buf, project);
    put_str(buf, path);
    let offset = match target {
        PathTarget::File(offset) => offset,
        PathTarget::Directory => 0,
    };
    buf.extend_from_slice(&offset.to_le_bytes());
}

pub(crate) fn decode_path_entry(reader: &mut ByteReader<'_>) -> Result<(String, String, PathTarget)> {
    let tag = reader.u8()?;
    let project = reader.string()?;
    let path = reader.string()?;
    let offset = reader.u64_le()?;
    let target = match tag {
        KIND_FILE => PathTarget::File(offset),
        KIND_DIRECTORY => PathTarget::Directory,
        other => return Err(Error::corrupt(format!("unknown path entry kind {other}"))),
    };
    Ok((project, path, target))
}

pub(crate) fn encode_record(file: &SourceFile, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&file.id.to_le_bytes());
    put_str(buf, &file.project);
    put_str(buf, &file.path);
    put_str(buf, &file.name);
    put_bytes(buf, &file.source);
}

pub(crate) fn decode_record(bytes: &[u8]) -> Result<SourceFile> {
    let mut reader = ByteReader::new(bytes);
    let file = SourceFile {
        id: reader.u64_le()?,
        project: reader.string()?,
        path: reader.string()?,
        name: reader.string()?,
        source: reader.bytes()?.to_vec(),
    };
    if !reader.is_empty() {
        return Err(Error::corrupt(format!("trailing bytes after source record {}", file.id)));
    }
    Ok(file)
}

/// Validate a file path: `/`-rooted, no trailing separator, no empty segments
pub(crate) fn check_file_path(path: &str) -> Result<()> {
    let invalid = |reason| {
        Err(Error::InvalidPath {
            path: path.to_string(),
            reason,
        })
    };
    if !path.starts_with('/') {
        return invalid("must start with '/'");
    }
    if path.ends_with('/') {
        return invalid("file path must not end with '/'");
    }
    if path.contains("//") {
        return invalid("empty path segment");
    }
    Ok(())
}

/// Normalise a directory path to its path-index key, which ends in `/`
pub(crate) fn directory_key(path: &str) -> Result<String> {
    if path.is_empty() || path == "/" {
        return Ok("/".to_string());
    }
    if !path.starts_with('/') {
        return Err(Error::InvalidPath {
            path: path.to_string(),
            reason: "must start with '/'",
        });
    }
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    if path.contains("//") {
        return Err(Error::InvalidPath {
            path: path.to_string(),
            reason: "empty path segment",
        });
    }
    Ok(format!("{trimmed}/"))
}
