use super::*;
use crate::index::segment::{clear_store, now_secs, write_meta};
use crate::index::types::{LogOffset, StoreKind, StoreMeta};
use crate::utils::{append_record, delta_encode, write_header, FORMAT_VERSION, HEADER_LEN};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Single-owner writer for one usage store generation
pub struct UsageWriter {
    dir: PathBuf,
    log: BufWriter<File>,
    log_len: u64,
    /// (kind, subject id) -> log offsets in write order
    postings: BTreeMap<(UsageKind, u64), Vec<LogOffset>>,
    records: u64,
    buf: Vec<u8>,
    poisoned: bool,
}

impl UsageWriter {
    /// Start a fresh store in `dir`, discarding any previous generation
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        clear_store(dir, &[LOG_FILE, DICT_FILE, POSTINGS_FILE])?;

        let mut log = BufWriter::new(File::create(dir.join(LOG_FILE))?);
        write_header(&mut log, LOG_MAGIC)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            log,
            log_len: HEADER_LEN as u64,
            postings: BTreeMap::new(),
            records: 0,
            buf: Vec::new(),
            poisoned: false,
        })
    }

    /// Append a usage record and add it to the posting list of its subject
    pub fn write(&mut self, record: &UsageRecord) -> Result<()> {
        self.check_usable()?;
        self.buf.clear();
        encode_record(record, &mut self.buf);
        let len = u32::try_from(self.buf.len())
            .map_err(|_| Error::corrupt("usage record exceeds 4 GiB"))?;

        let offset = self.log_len;
        if let Err(e) = append_record(&mut self.log, len, &self.buf) {
            self.poisoned = true;
            return Err(e.into());
        }
        self.log_len += 4 + self.buf.len() as u64;
        self.records += 1;

        self.postings
            .entry((record.kind, record.subject_id))
            .or_default()
            .push(offset);
        Ok(())
    }

    pub fn record_count(&self) -> u64 {
        self.records
    }

    /// Write the dictionary and postings segments, then the metadata marker
    pub fn close(mut self) -> Result<StoreMeta> {
        self.check_usable()?;
        self.log.flush()?;

        let mut dict = BufWriter::new(File::create(self.dir.join(DICT_FILE))?);
        let mut postings = BufWriter::new(File::create(self.dir.join(POSTINGS_FILE))?);
        write_header(&mut dict, DICT_MAGIC)?;
        write_header(&mut postings, POSTINGS_MAGIC)?;
        dict.write_all(&(self.postings.len() as u64).to_le_bytes())?;

        let mut postings_offset: u64 = 0;
        let mut encoded = Vec::new();
        for (&(kind, id), offsets) in &self.postings {
            // Log offsets grow with every write, so write order is ascending
            encoded.clear();
            delta_encode(offsets, &mut encoded);
            let len = u32::try_from(encoded.len())
                .map_err(|_| Error::corrupt(format!("posting list for {kind:?} {id} too large")))?;
            let count = u32::try_from(offsets.len())
                .map_err(|_| Error::corrupt(format!("too many usages of {kind:?} {id}")))?;

            dict.write_all(&[kind as u8])?;
            dict.write_all(&id.to_le_bytes())?;
            dict.write_all(&postings_offset.to_le_bytes())?;
            dict.write_all(&len.to_le_bytes())?;
            dict.write_all(&count.to_le_bytes())?;

            postings.write_all(&encoded)?;
            postings_offset += encoded.len() as u64;
        }
        dict.flush()?;
        postings.flush()?;

        let meta = StoreMeta {
            version: FORMAT_VERSION,
            kind: StoreKind::Usage,
            record_count: self.records,
            key_count: self.postings.len() as u64,
            log_bytes: self.log_len,
            created_at: now_secs(),
        };
        write_meta(&self.dir, &meta)?;
        log::info!(
            "usage store {}: {} usages of {} subjects",
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
}
