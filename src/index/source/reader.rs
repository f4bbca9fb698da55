use super::*;
use crate::index::segment::{map_segment, read_meta};
use crate::index::types::{FileId, StoreKind, StoreMeta};
use crate::utils::HEADER_LEN;
use memmap2::Mmap;
use std::fs;
use std::path::{Path, PathBuf};

struct PathEntry {
    project: String,
    path: String,
    target: PathTarget,
}

impl PathEntry {
    fn key(&self) -> (&str, &str) {
        (&self.project, &self.path)
    }
}

/// Read-only view of a finished source store. Immutable after `open`, so one
/// reader can serve any number of threads.
pub struct SourceReader {
    dir: PathBuf,
    meta: StoreMeta,
    log: Mmap,
    ids: Mmap,
    paths: Vec<PathEntry>,
}

impl SourceReader {
    pub fn open(dir: &Path) -> Result<Self> {
        let meta = read_meta(dir, StoreKind::Source)?;
        let log = map_segment(&dir.join(LOG_FILE), LOG_MAGIC)?;
        let ids = map_segment(&dir.join(IDS_FILE), IDS_MAGIC)?;
        if (ids.len() - HEADER_LEN) % ID_ENTRY_LEN != 0 {
            return Err(Error::corrupt(format!("{IDS_FILE}: truncated entry")));
        }
        let id_count = ((ids.len() - HEADER_LEN) / ID_ENTRY_LEN) as u64;
        if id_count != meta.record_count {
            return Err(Error::corrupt(format!(
                "{IDS_FILE}: {id_count} entries, metadata says {}",
                meta.record_count
            )));
        }
        let paths = read_paths(&dir.join(PATHS_FILE))?;

        log::debug!("opened source store {} ({} files)", dir.display(), id_count);
        Ok(Self {
            dir: dir.to_path_buf(),
            meta,
            log,
            ids,
            paths,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        (self.ids.len() - HEADER_LEN) / ID_ENTRY_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn id_entry(&self, index: usize) -> (FileId, u64) {
        let start = HEADER_LEN + index * ID_ENTRY_LEN;
        let entry = &self.ids[start..start + ID_ENTRY_LEN];
        let mut id = [0u8; 8];
        let mut offset = [0u8; 8];
        id.copy_from_slice(&entry[..8]);
        offset.copy_from_slice(&entry[8..]);
        (u64::from_le_bytes(id), u64::from_le_bytes(offset))
    }

    /// Look up a file by id
    pub fn query_source_by_id(&self, id: FileId) -> Result<Option<SourceFile>> {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (mid_id, offset) = self.id_entry(mid);
            if mid_id == id {
                let file = self.read_record(offset)?;
                if file.id != id {
                    return Err(Error::corrupt(format!(
                        "id {id} points at record of file {}",
                        file.id
                    )));
                }
                return Ok(Some(file));
            }
            if mid_id < id {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        log::debug!("no source with id {id}");
        Ok(None)
    }

    /// Look up a file by project and path. Directory markers are not files.
    pub fn query_source_by_path(&self, project: &str, path: &str) -> Result<Option<SourceFile>> {
        let found = self
            .paths
            .binary_search_by(|entry| entry.key().cmp(&(project, path)))
            .ok()
            .map(|i| self.paths[i].target);

        match found {
            Some(PathTarget::File(offset)) => {
                let file = self.read_record(offset)?;
                if file.project != project || file.path != path {
                    return Err(Error::corrupt(format!(
                        "{project}:{path} points at record of {}:{}",
                        file.project, file.path
                    )));
                }
                Ok(Some(file))
            }
            _ => {
                log::debug!("no source at {project}:{path}");
                Ok(None)
            }
        }
    }

    /// Names of the direct children of a directory, in key order.
    ///
    /// Files are returned as `name`, directories as `name/`. Only directories
    /// with a marker show up as children. An unknown directory and an empty
    /// one both produce an empty list.
    pub fn list_directory(&self, project: &str, path: &str) -> Vec<String> {
        let Ok(prefix) = directory_key(path) else {
            return Vec::new();
        };
        let start = self
            .paths
            .partition_point(|entry| entry.key() < (project, prefix.as_str()));

        self.paths[start..]
            .iter()
            .take_while(|entry| entry.project == project && entry.path.starts_with(&prefix))
            .filter_map(|entry| {
                let rest = &entry.path[prefix.len()..];
                let direct = match entry.target {
                    PathTarget::File(_) => !rest.is_empty() && !rest.contains('/'),
                    PathTarget::Directory => {
                        rest.len() > 1 && rest.find('/') == Some(rest.len() - 1)
                    }
                };
                direct.then(|| rest.to_string())
            })
            .collect()
    }

    fn read_record(&self, offset: u64) -> Result<SourceFile> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|&start| start >= HEADER_LEN && start < self.log.len())
            .ok_or_else(|| Error::corrupt(format!("log offset {offset} out of range")))?;
        let mut reader = ByteReader::new(&self.log[start..]);
        let len = reader.u32_le()? as usize;
        decode_record(reader.take(len)?)
    }
}

fn read_paths(path: &Path) -> Result<Vec<PathEntry>> {
    let bytes = fs::read(path)?;
    crate::utils::check_header(&bytes, PATHS_MAGIC, PATHS_FILE)?;

    let mut reader = ByteReader::new(&bytes[HEADER_LEN..]);
    let count = reader.u64_le()?;
    let mut entries = Vec::with_capacity(count.min(1 << 20) as usize);
    for _ in 0..count {
        let (project, path, target) = decode_path_entry(&mut reader)?;
        entries.push(PathEntry { project, path, target });
    }
    if !reader.is_empty() {
        return Err(Error::corrupt(format!("{PATHS_FILE}: trailing bytes")));
    }
    if entries.windows(2).any(|w| w[0].key() >= w[1].key()) {
        return Err(Error::corrupt(format!("{PATHS_FILE}: entries out of order")));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::source::SourceWriter;
    use tempfile::TempDir;

    fn build(dir: &Path) -> SourceReader {
        let mut writer = SourceWriter::create(dir).unwrap();
        writer.write(&SourceFile::new(10, "P", "/dir/a", b"a".to_vec())).unwrap();
        writer.write(&SourceFile::new(3, "P", "/dir/b", b"b".to_vec())).unwrap();
        writer.write(&SourceFile::new(7, "P", "/dir/c/deep", b"deep".to_vec())).unwrap();
        writer.write(&SourceFile::new(8, "Q", "/dir/other", b"q".to_vec())).unwrap();
        writer.write_directory("P", "/dir/c").unwrap();
        writer.write_directory("P", "/dir").unwrap();
        writer.close().unwrap();
        SourceReader::open(dir).unwrap()
    }

    #[test]
    fn test_lookup_by_id_and_path() {
        let dir = TempDir::new().unwrap();
        let reader = build(dir.path());
        assert_eq!(reader.len(), 4);

        let file = reader.query_source_by_id(7).unwrap().unwrap();
        assert_eq!(file.path, "/dir/c/deep");
        assert_eq!(file.name, "deep");
        assert_eq!(reader.query_source_by_path("P", "/dir/b").unwrap().unwrap().id, 3);

        assert!(reader.query_source_by_id(4).unwrap().is_none());
        assert!(reader.query_source_by_path("P", "/dir/zzz").unwrap().is_none());
        assert!(reader.query_source_by_path("nope", "/dir/a").unwrap().is_none());
        // A directory marker is not a file
        assert!(reader.query_source_by_path("P", "/dir/").unwrap().is_none());
    }

    #[test]
    fn test_list_direct_children_only() {
        let dir = TempDir::new().unwrap();
        let reader = build(dir.path());

        assert_eq!(reader.list_directory("P", "/"), vec!["dir/"]);
        assert_eq!(reader.list_directory("P", "/dir"), vec!["a", "b", "c/"]);
        assert_eq!(reader.list_directory("P", "/dir/"), vec!["a", "b", "c/"]);
        assert_eq!(reader.list_directory("P", "/dir/c"), vec!["deep"]);
        assert!(reader.list_directory("P", "/missing").is_empty());
        assert!(reader.list_directory("P", "relative").is_empty());
        assert_eq!(reader.list_directory("Q", "/dir"), vec!["other"]);
    }

    #[test]
    fn test_unfinished_store_is_invisible() {
        let dir = TempDir::new().unwrap();
        let mut writer = SourceWriter::create(dir.path()).unwrap();
        writer.write(&SourceFile::new(1, "P", "/a", b"a".to_vec())).unwrap();
        assert!(matches!(
            SourceReader::open(dir.path()),
            Err(Error::NotFinalized(_))
        ));
        drop(writer);
    }

    #[test]
    fn test_corrupt_offset_is_fatal() {
        let dir = TempDir::new().unwrap();
        let reader = build(dir.path());
        assert!(reader.read_record(u64::MAX).unwrap_err().is_fatal());
        assert!(reader.read_record(1).unwrap_err().is_fatal());
    }
}
