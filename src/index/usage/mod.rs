//! Usage store: reverse lookup from `(kind, subject id)` to every usage.
//!
//! - `usage.log` - append-only `[len u32][record]` entries
//! - `usage.dict` - fixed `[kind u8][id u64][offset u64][len u32][count u32]`
//!   entries sorted by key, pointing into the postings file
//! - `usage.postings` - delta + varint encoded log offsets, in write order
//! - `meta.json` - written last by [`UsageWriter::close`]

mod reader;
mod writer;

pub use reader::{UsageReader, Usages, UsagesIter};
pub use writer::UsageWriter;

use crate::error::{Error, Result};
use crate::index::types::{FileHandle, JumpTarget, Position, Span, UsageKind, UsageRecord};
use crate::utils::{encode_varint, put_str, ByteReader};

pub const LOG_FILE: &str = "usage.log";
pub const DICT_FILE: &str = "usage.dict";
pub const POSTINGS_FILE: &str = "usage.postings";

pub(crate) const LOG_MAGIC: u32 = 0x5544_4C47; // "UDLG"
pub(crate) const DICT_MAGIC: u32 = 0x5544_4443; // "UDDC"
pub(crate) const POSTINGS_MAGIC: u32 = 0x5544_5053; // "UDPS"

/// Bytes per entry in `usage.dict`
pub(crate) const DICT_ENTRY_LEN: usize = 1 + 8 + 8 + 4 + 4;

fn put_position(buf: &mut Vec<u8>, position: Position) {
    encode_varint(position.line as u64, buf);
    encode_varint(position.column as u64, buf);
}

fn put_target(buf: &mut Vec<u8>, target: &JumpTarget) {
    buf.extend_from_slice(&target.file.id.to_le_bytes());
    put_str(buf, &target.file.project);
    put_str(buf, &target.file.path);
    put_position(buf, target.span.from);
    put_position(buf, target.span.to);
}

fn read_position(reader: &mut ByteReader<'_>) -> Result<Position> {
    Ok(Position::new(reader.varint_u32()?, reader.varint_u32()?))
}

fn read_target(reader: &mut ByteReader<'_>) -> Result<JumpTarget> {
    let file = FileHandle {
        id: reader.u64_le()?,
        project: reader.string()?,
        path: reader.string()?,
    };
    let from = read_position(reader)?;
    let to = read_position(reader)?;
    Ok(JumpTarget {
        file,
        span: Span::new(from, to),
    })
}

pub(crate) fn encode_record(record: &UsageRecord, buf: &mut Vec<u8>) {
    buf.push(record.kind as u8);
    buf.extend_from_slice(&record.subject_id.to_le_bytes());
    put_target(buf, &record.definition);
    put_target(buf, &record.usage);
    put_str(buf, &record.snippet);
}

pub(crate) fn decode_record(bytes: &[u8]) -> Result<UsageRecord> {
    let mut reader = ByteReader::new(bytes);
    let record = UsageRecord {
        kind: UsageKind::try_from(reader.u8()?)?,
        subject_id: reader.u64_le()?,
        definition: read_target(&mut reader)?,
        usage: read_target(&mut reader)?,
        snippet: reader.string()?,
    };
    if !reader.is_empty() {
        return Err(Error::corrupt("trailing bytes after usage record"));
    }
    Ok(record)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn usage(kind: UsageKind, subject_id: u64, file: u64, line: u32, column: u32) -> UsageRecord {
        let target = |id: u64, line: u32, column: u32| JumpTarget {
            file: FileHandle {
                id,
                project: "p".into(),
                path: format!("/src/F{id}.java"),
            },
            span: Span::new(Position::new(line, column), Position::new(line, column + 4)),
        };
        UsageRecord {
            kind,
            subject_id,
            definition: target(1, 0, 6),
            usage: target(file, line, column),
            snippet: format!("line {line}"),
        }
    }

    #[test]
    fn test_record_codec() {
        let record = usage(UsageKind::Method, 99, 4, 12, 30);
        let mut buf = Vec::new();
        encode_record(&record, &mut buf);
        assert_eq!(decode_record(&buf).unwrap(), record);
    }

    #[test]
    fn test_bad_kind_tag_is_corrupt() {
        let mut buf = Vec::new();
        encode_record(&usage(UsageKind::Type, 1, 2, 0, 0), &mut buf);
        buf[0] = 0;
        assert!(decode_record(&buf).unwrap_err().is_fatal());
    }
}
