//! The search-index collaborator.
//!
//! Ranking and the inverted index itself live outside this crate. The build
//! driver and the layout indexer only need somewhere to hand terms and
//! documents to, which is what [`IndexSink`] describes.

use crate::error::Result;
use crate::index::types::{DocumentKey, FileHandle, FileId};
use crate::parser::{Term, TokenKind};
use std::collections::BTreeMap;

pub trait IndexSink {
    /// Index the terms of one file. Called at most once per file.
    fn add_terms(&mut self, file: &FileHandle, terms: Vec<Term>) -> Result<()>;

    /// Store a document under an exact-match key, replacing any previous one
    fn add_document(&mut self, key: DocumentKey, body: Vec<u8>) -> Result<()>;
}

impl<S: IndexSink + ?Sized> IndexSink for &mut S {
    fn add_terms(&mut self, file: &FileHandle, terms: Vec<Term>) -> Result<()> {
        (**self).add_terms(file, terms)
    }

    fn add_document(&mut self, key: DocumentKey, body: Vec<u8>) -> Result<()> {
        (**self).add_document(key, body)
    }
}

/// In-memory sink used by the CLI and tests
#[derive(Debug, Default)]
pub struct MemoryIndexSink {
    documents: BTreeMap<DocumentKey, Vec<u8>>,
    terms: BTreeMap<FileId, (FileHandle, Vec<Term>)>,
}

impl MemoryIndexSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, key: &DocumentKey) -> Option<&[u8]> {
        self.documents.get(key).map(Vec::as_slice)
    }

    pub fn documents(&self) -> impl Iterator<Item = (&DocumentKey, &[u8])> {
        self.documents.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn terms(&self, id: FileId) -> Option<&[Term]> {
        self.terms.get(&id).map(|(_, terms)| terms.as_slice())
    }

    pub fn file_count(&self) -> usize {
        self.terms.len()
    }

    pub fn term_count(&self) -> usize {
        self.terms.values().map(|(_, terms)| terms.len()).sum()
    }

    /// Files declaring `name` (case-insensitive) with the given kind
    pub fn find_declarations(&self, name: &str, kind: TokenKind) -> Vec<&FileHandle> {
        let needle = name.to_lowercase();
        self.terms
            .values()
            .filter(|(_, terms)| terms.iter().any(|t| t.kind == kind && t.text == needle))
            .map(|(file, _)| file)
            .collect()
    }
}

impl IndexSink for MemoryIndexSink {
    fn add_terms(&mut self, file: &FileHandle, terms: Vec<Term>) -> Result<()> {
        self.terms.insert(file.id, (file.clone(), terms));
        Ok(())
    }

    fn add_document(&mut self, key: DocumentKey, body: Vec<u8>) -> Result<()> {
        self.documents.insert(key, body);
        Ok(())
    }
}
