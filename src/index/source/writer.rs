use super::*;
use crate::index::segment::{clear_store, now_secs, write_meta};
use crate::index::types::{FileId, LogOffset, StoreKind, StoreMeta};
use crate::utils::{append_record, write_header, FORMAT_VERSION, HEADER_LEN};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Single-owner writer for one source store generation.
///
/// Records are appended to the log as they arrive; both indexes are kept in
/// memory and written by [`close`](Self::close).
pub struct SourceWriter {
    dir: PathBuf,
    log: BufWriter<File>,
    log_len: u64,
    ids: FxHashMap<FileId, LogOffset>,
    /// (project, path key) -> target, sorted for the path segment
    paths: BTreeMap<(String, String), PathTarget>,
    directories: u64,
    /// Reused record encoding buffer
    buf: Vec<u8>,
    /// An append failed part way; the log no longer matches `log_len`
    poisoned: bool,
}

impl SourceWriter {
    /// Start a fresh store in `dir`, discarding any previous generation
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        clear_store(dir, &[LOG_FILE, IDS_FILE, PATHS_FILE])?;

        let mut log = BufWriter::new(File::create(dir.join(LOG_FILE))?);
        write_header(&mut log, LOG_MAGIC)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            log,
            log_len: HEADER_LEN as u64,
            ids: FxHashMap::default(),
            paths: BTreeMap::new(),
            directories: 0,
            buf: Vec::new(),
            poisoned: false,
        })
    }

    /// Append a file record. Duplicate ids or paths are rejected before
    /// anything reaches the log.
    pub fn write(&mut self, file: &SourceFile) -> Result<()> {
        self.check_usable()?;
        check_file_path(&file.path)?;
        if self.ids.contains_key(&file.id) {
            return Err(Error::DuplicateId(file.id));
        }
        let key = (file.project.clone(), file.path.clone());
        let as_directory = (file.project.clone(), format!("{}/", file.path));
        if self.paths.contains_key(&key) || self.paths.contains_key(&as_directory) {
            return Err(Error::DuplicatePath {
                project: file.project.clone(),
                path: file.path.clone(),
            });
        }

        self.buf.clear();
        encode_record(file, &mut self.buf);
        let len = u32::try_from(self.buf.len())
            .map_err(|_| Error::corrupt(format!("source record {} exceeds 4 GiB", file.id)))?;

        let offset = self.log_len;
        if let Err(e) = append_record(&mut self.log, len, &self.buf) {
            self.poisoned = true;
            return Err(e.into());
        }
        self.log_len += 4 + self.buf.len() as u64;

        self.ids.insert(file.id, offset);
        self.paths.insert(key, PathTarget::File(offset));
        log::debug!("stored {}:{} as id {} at {}", file.project, file.path, file.id, offset);
        Ok(())
    }

    /// Record that `path` is a directory of `project`
    pub fn write_directory(&mut self, project: &str, path: &str) -> Result<()> {
        self.check_usable()?;
        let key = directory_key(path)?;
        if key != "/" {
            let as_file = (project.to_string(), key[..key.len() - 1].to_string());
            if self.paths.contains_key(&as_file) {
                return Err(Error::DuplicatePath {
                    project: project.to_string(),
                    path: path.to_string(),
                });
            }
        }
        if self
            .paths
            .insert((project.to_string(), key), PathTarget::Directory)
            .is_none()
        {
            self.directories += 1;
        }
        Ok(())
    }

    pub fn file_count(&self) -> usize {
        self.ids.len()
    }

    /// Write both index segments and the metadata marker. A poisoned writer
    /// refuses, leaving the store unpublished.
    pub fn close(mut self) -> Result<StoreMeta> {
        self.check_usable()?;
        self.log.flush()?;
        self.write_ids()?;
        self.write_paths()?;

        let meta = StoreMeta {
            version: FORMAT_VERSION,
            kind: StoreKind::Source,
            record_count: self.ids.len() as u64,
            key_count: self.directories,
            log_bytes: self.log_len,
            created_at: now_secs(),
        };
        write_meta(&self.dir, &meta)?;
        log::info!(
            "source store {}: {} files, {} directories",
            self.dir.display(),
            meta.record_count,
            meta.key_count
        );
        Ok(meta)
    }

    fn check_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(Error::Poisoned(self.dir.clone()));
        }
        Ok(())
    }

    fn write_ids(&self) -> Result<()> {
        let mut sorted: Vec<_> = self.ids.iter().map(|(&id, &offset)| (id, offset)).collect();
        sorted.sort_unstable();

        let mut file = BufWriter::new(File::create(self.dir.join(IDS_FILE))?);
        write_header(&mut file, IDS_MAGIC)?;
        for (id, offset) in sorted {
            file.write_all(&id.to_le_bytes())?;
            file.write_all(&offset.to_le_bytes())?;
        }
        file.flush()?;
        Ok(())
    }

    fn write_paths(&self) -> Result<()> {
        let mut file = BufWriter::new(File::create(self.dir.join(PATHS_FILE))?);
        write_header(&mut file, PATHS_MAGIC)?;
        file.write_all(&(self.paths.len() as u64).to_le_bytes())?;

        let mut buf = Vec::new();
        for ((project, path), &target) in &self.paths {
            buf.clear();
            encode_path_entry(project, path, target, &mut buf);
            file.write_all(&buf)?;
        }
        file.flush()?;
        Ok(())
    }
}
