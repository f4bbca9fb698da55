use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Globally unique identifier of an indexed file
pub type FileId = u64;

/// Byte offset of a record inside a store log
pub type LogOffset = u64;

/// Identity of an indexed file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle {
    pub id: FileId,
    pub project: String,
    pub path: String,
}

/// A file and its contents, as stored in the source store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: FileId,
    pub project: String,
    pub path: String,
    pub name: String,
    pub source: Vec<u8>,
}

impl SourceFile {
    /// Build a record, deriving `name` from the last path segment
    pub fn new(id: FileId, project: &str, path: &str, source: Vec<u8>) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Self {
            id,
            project: project.to_string(),
            path: path.to_string(),
            name,
            source,
        }
    }

    pub fn handle(&self) -> FileHandle {
        FileHandle {
            id: self.id,
            project: self.project.clone(),
            path: self.path.clone(),
        }
    }

    /// Source text, if it is valid UTF-8
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.source).ok()
    }
}

/// Zero-based line/column location
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Line/column range used by jump targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub from: Position,
    pub to: Position,
}

impl Span {
    pub fn new(from: Position, to: Position) -> Self {
        Self { from, to }
    }
}

/// A precise file + span location to navigate to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JumpTarget {
    pub file: FileHandle,
    pub span: Span,
}

impl Ord for JumpTarget {
    fn cmp(&self, other: &Self) -> Ordering {
        self.file
            .id
            .cmp(&other.file.id)
            .then_with(|| self.span.cmp(&other.span))
            .then_with(|| self.file.project.cmp(&other.file.project))
            .then_with(|| self.file.path.cmp(&other.file.path))
    }
}

impl PartialOrd for JumpTarget {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What a usage record refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum UsageKind {
    Type = 1,
    Method = 2,
    Field = 3,
    Variable = 4,
}

impl TryFrom<u8> for UsageKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(UsageKind::Type),
            2 => Ok(UsageKind::Method),
            3 => Ok(UsageKind::Field),
            4 => Ok(UsageKind::Variable),
            other => Err(Error::corrupt(format!("unknown usage kind {other}"))),
        }
    }
}

/// One reference site of a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub kind: UsageKind,
    pub subject_id: u64,
    pub definition: JumpTarget,
    pub usage: JumpTarget,
    #[serde(default)]
    pub snippet: String,
}

/// Sort usages by where they occur: file, then span start
pub fn sort_by_jump_target(usages: &mut [UsageRecord]) {
    usages.sort_by(|a, b| a.usage.cmp(&b.usage));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayoutNodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub name: String,
    pub kind: LayoutNodeKind,
}

/// Immediate children of one directory, in filesystem enumeration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutNodeList {
    pub project: String,
    pub directory: String,
    pub nodes: Vec<LayoutNode>,
}

/// Kind of entity a search-index document describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    DirectoryLayout,
}

/// Exact-match key of a document handed to the search index
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    pub kind: EntityKind,
    pub project: String,
    pub name: String,
}

impl DocumentKey {
    pub fn layout(project: &str, directory: &str) -> Self {
        Self {
            kind: EntityKind::DirectoryLayout,
            project: project.to_string(),
            name: directory.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Source,
    Usage,
}

/// Store metadata stored in meta.json; its presence marks a finished store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub version: u32,
    pub kind: StoreKind,
    /// Records in the log (files for the source store, usages for the usage store)
    pub record_count: u64,
    /// Source store: directory markers. Usage store: distinct (kind, id) keys.
    pub key_count: u64,
    pub log_bytes: u64,
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: FileId, line: u32, column: u32) -> JumpTarget {
        JumpTarget {
            file: FileHandle {
                id,
                project: "p".into(),
                path: format!("/f{id}"),
            },
            span: Span::new(Position::new(line, column), Position::new(line, column + 5)),
        }
    }

    #[test]
    fn test_source_file_name_from_path() {
        let file = SourceFile::new(1, "p", "/dir/Main.java", b"class Main {}".to_vec());
        assert_eq!(file.name, "Main.java");
        assert_eq!(file.handle().path, "/dir/Main.java");
        assert_eq!(file.text(), Some("class Main {}"));
    }

    #[test]
    fn test_jump_target_order() {
        let mut targets = vec![target(2, 0, 0), target(1, 3, 1), target(1, 0, 20), target(1, 0, 10)];
        targets.sort();
        let keys: Vec<_> = targets
            .iter()
            .map(|t| (t.file.id, t.span.from.line, t.span.from.column))
            .collect();
        assert_eq!(keys, vec![(1, 0, 10), (1, 0, 20), (1, 3, 1), (2, 0, 0)]);
    }

    #[test]
    fn test_usage_kind_tags() {
        for kind in [UsageKind::Type, UsageKind::Method, UsageKind::Field, UsageKind::Variable] {
            assert_eq!(UsageKind::try_from(kind as u8).unwrap(), kind);
        }
        assert!(UsageKind::try_from(0).is_err());
    }

    #[test]
    fn test_usage_record_json_defaults_snippet() {
        let json = r#"{
            "kind": "TYPE",
            "subject_id": 100,
            "definition": {"file": {"id": 1, "project": "p", "path": "/A.java"},
                           "span": {"from": {"line": 0, "column": 0}, "to": {"line": 0, "column": 5}}},
            "usage": {"file": {"id": 2, "project": "p", "path": "/B.java"},
                      "span": {"from": {"line": 3, "column": 4}, "to": {"line": 3, "column": 9}}}
        }"#;
        let record: UsageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, UsageKind::Type);
        assert_eq!(record.snippet, "");
        assert_eq!(record.usage.span.from, Position::new(3, 4));
    }
}
