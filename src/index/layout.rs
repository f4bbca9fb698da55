use crate::error::{Error, Result};
use crate::index::sink::IndexSink;
use crate::index::types::{DocumentKey, LayoutNode, LayoutNodeKind, LayoutNodeList};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Snapshots the immediate children of one directory at a time and hands each
/// snapshot to the search index as a directory-layout document.
pub struct LayoutIndexer<S: IndexSink> {
    project: String,
    root: PathBuf,
    sink: S,
}

impl<S: IndexSink> LayoutIndexer<S> {
    pub fn new(project: &str, root: &Path, sink: S) -> Self {
        Self {
            project: project.to_string(),
            root: root.to_path_buf(),
            sink,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// List `dir`, classify each child, and index the result. Children keep
    /// the order the filesystem enumerates them in.
    pub fn index_directory(&mut self, dir: &Path) -> Result<LayoutNodeList> {
        let bad = |e: io::Error| Error::bad_directory(dir, e);
        let directory = project_path(&self.root, dir)
            .ok_or_else(|| bad(io::Error::new(io::ErrorKind::InvalidInput, "outside the project root")))?;

        let mut nodes = Vec::new();
        for entry in fs::read_dir(dir).map_err(bad)? {
            let entry = entry.map_err(bad)?;
            // Follows symlinks, a link to a directory lists as a directory
            let kind = if entry.path().is_dir() {
                LayoutNodeKind::Directory
            } else {
                LayoutNodeKind::File
            };
            nodes.push(LayoutNode {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }

        let list = LayoutNodeList {
            project: self.project.clone(),
            directory,
            nodes,
        };
        let body = serde_json::to_vec(&list)?;
        self.sink
            .add_document(DocumentKey::layout(&self.project, &list.directory), body)?;
        log::debug!("indexed layout of {}:{} ({} entries)", list.project, list.directory, list.nodes.len());
        Ok(list)
    }
}

/// `/`-rooted name of `path` relative to the project root, or `None` if it
/// lies outside the root
pub(crate) fn project_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut name = String::from("/");
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                if name.len() > 1 {
                    name.push('/');
                }
                name.push_str(&part.to_string_lossy());
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::sink::MemoryIndexSink;
    use tempfile::TempDir;

    #[test]
    fn test_index_directory_classifies_children() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("src/main")).unwrap();
        fs::write(root.path().join("src/App.java"), b"class App {}").unwrap();
        fs::write(root.path().join("README"), b"readme").unwrap();

        let mut indexer = LayoutIndexer::new("proj", root.path(), MemoryIndexSink::new());
        let list = indexer.index_directory(&root.path().join("src")).unwrap();
        assert_eq!(list.directory, "/src");
        assert_eq!(list.nodes.len(), 2);
        let kind_of = |name: &str| list.nodes.iter().find(|n| n.name == name).unwrap().kind;
        assert_eq!(kind_of("main"), LayoutNodeKind::Directory);
        assert_eq!(kind_of("App.java"), LayoutNodeKind::File);

        let root_list = indexer.index_directory(root.path()).unwrap();
        assert_eq!(root_list.directory, "/");

        let sink = indexer.into_sink();
        let body = sink.document(&DocumentKey::layout("proj", "/src")).unwrap();
        let stored: LayoutNodeList = serde_json::from_slice(body).unwrap();
        assert_eq!(stored, list);
    }

    #[test]
    fn test_empty_directory() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("empty")).unwrap();
        let mut indexer = LayoutIndexer::new("proj", root.path(), MemoryIndexSink::new());
        let list = indexer.index_directory(&root.path().join("empty")).unwrap();
        assert!(list.nodes.is_empty());
    }

    #[test]
    fn test_bad_directory() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("file"), b"x").unwrap();
        let mut sink = MemoryIndexSink::new();
        let mut indexer = LayoutIndexer::new("proj", root.path(), &mut sink);

        let kind_of = |result: Result<LayoutNodeList>| match result {
            Err(Error::BadDirectory { source, .. }) => source.kind(),
            other => panic!("expected a bad directory, got {other:?}"),
        };
        assert_eq!(
            kind_of(indexer.index_directory(&root.path().join("missing"))),
            io::ErrorKind::NotFound
        );
        assert_eq!(
            kind_of(indexer.index_directory(&root.path().join("file"))),
            io::ErrorKind::NotADirectory
        );
        // Outside the project root
        assert_eq!(kind_of(indexer.index_directory(Path::new("/"))), io::ErrorKind::InvalidInput);
        assert_eq!(sink.documents().count(), 0);
    }

    #[test]
    fn test_project_path() {
        let root = Path::new("/work/proj");
        assert_eq!(project_path(root, root).as_deref(), Some("/"));
        assert_eq!(project_path(root, &root.join("a/b.java")).as_deref(), Some("/a/b.java"));
        assert_eq!(project_path(root, Path::new("/work/other")), None);
    }
}
