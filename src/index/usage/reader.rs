use super::*;
use crate::index::segment::{map_segment, read_meta};
use crate::index::types::{StoreKind, StoreMeta};
use crate::utils::{check_header, DeltaDecoder, HEADER_LEN};
use memmap2::Mmap;
use std::fs;
use std::path::{Path, PathBuf};

/// Usage dictionary entry
#[derive(Debug, Clone, Copy)]
struct DictEntry {
    kind: UsageKind,
    id: u64,
    offset: u64,
    length: u32,
    count: u32,
}

/// Read-only view of a finished usage store
pub struct UsageReader {
    dir: PathBuf,
    meta: StoreMeta,
    log: Mmap,
    postings: Mmap,
    /// Sorted by (kind, id)
    dict: Vec<DictEntry>,
}

impl UsageReader {
    pub fn open(dir: &Path) -> Result<Self> {
        let meta = read_meta(dir, StoreKind::Usage)?;
        let log = map_segment(&dir.join(LOG_FILE), LOG_MAGIC)?;
        let postings = map_segment(&dir.join(POSTINGS_FILE), POSTINGS_MAGIC)?;
        let dict = read_dict(&dir.join(DICT_FILE))?;

        let body = (postings.len() - HEADER_LEN) as u64;
        if let Some(entry) = dict
            .iter()
            .find(|e| e.offset.checked_add(e.length as u64).is_none_or(|end| end > body))
        {
            return Err(Error::corrupt(format!(
                "posting list of {:?} {} runs past the end of {POSTINGS_FILE}",
                entry.kind, entry.id
            )));
        }

        log::debug!("opened usage store {} ({} subjects)", dir.display(), dict.len());
        Ok(Self {
            dir: dir.to_path_buf(),
            meta,
            log,
            postings,
            dict,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    /// All usages of `(kind, id)` in write order. Absent keys give an empty
    /// sequence. Nothing is decoded until the sequence is iterated.
    pub fn query(&self, kind: UsageKind, id: u64) -> Usages<'_> {
        match self.dict.binary_search_by(|e| (e.kind, e.id).cmp(&(kind, id))) {
            Ok(i) => {
                let entry = self.dict[i];
                let start = HEADER_LEN + entry.offset as usize;
                Usages {
                    log: &self.log,
                    postings: &self.postings[start..start + entry.length as usize],
                    count: entry.count,
                }
            }
            Err(_) => {
                log::debug!("no usages of {kind:?} {id}");
                Usages {
                    log: &self.log,
                    postings: &[],
                    count: 0,
                }
            }
        }
    }
}

/// A finite, restartable sequence of usage records.
///
/// Every call to [`iter`](Self::iter) starts over from the first record; the
/// sequence borrows the reader and never changes it.
#[derive(Debug, Clone, Copy)]
pub struct Usages<'a> {
    log: &'a [u8],
    postings: &'a [u8],
    count: u32,
}

impl<'a> Usages<'a> {
    pub fn iter(&self) -> UsagesIter<'a> {
        UsagesIter {
            log: self.log,
            offsets: DeltaDecoder::new(self.postings),
            remaining: self.count,
        }
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Decode every record, stopping at the first corrupt one
    pub fn to_vec(&self) -> Result<Vec<UsageRecord>> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &Usages<'a> {
    type Item = Result<UsageRecord>;
    type IntoIter = UsagesIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for Usages<'a> {
    type Item = Result<UsageRecord>;
    type IntoIter = UsagesIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct UsagesIter<'a> {
    log: &'a [u8],
    offsets: DeltaDecoder<'a>,
    remaining: u32,
}

impl Iterator for UsagesIter<'_> {
    type Item = Result<UsageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let Some(offset) = self.offsets.next() else {
            self.remaining = 0;
            return Some(Err(Error::corrupt("posting list shorter than its count")));
        };
        let record = usize::try_from(offset)
            .ok()
            .filter(|&start| start >= HEADER_LEN && start < self.log.len())
            .ok_or_else(|| Error::corrupt(format!("usage log offset {offset} out of range")))
            .and_then(|start| {
                let mut reader = ByteReader::new(&self.log[start..]);
                let len = reader.u32_le()? as usize;
                decode_record(reader.take(len)?)
            });
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

fn read_dict(path: &Path) -> Result<Vec<DictEntry>> {
    let bytes = fs::read(path)?;
    check_header(&bytes, DICT_MAGIC, DICT_FILE)?;

    let mut reader = ByteReader::new(&bytes[HEADER_LEN..]);
    let count = reader.u64_le()?;
    let expected = usize::try_from(count)
        .ok()
        .and_then(|n| n.checked_mul(DICT_ENTRY_LEN))
        .ok_or_else(|| Error::corrupt(format!("{DICT_FILE}: bad entry count {count}")))?;
    if bytes.len() - HEADER_LEN - 8 != expected {
        return Err(Error::corrupt(format!("{DICT_FILE}: size does not match {count} entries")));
    }

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        entries.push(DictEntry {
            kind: UsageKind::try_from(reader.u8()?)?,
            id: reader.u64_le()?,
            offset: reader.u64_le()?,
            length: reader.u32_le()?,
            count: reader.u32_le()?,
        });
    }
    if entries.windows(2).any(|w| (w[0].kind, w[0].id) >= (w[1].kind, w[1].id)) {
        return Err(Error::corrupt(format!("{DICT_FILE}: entries out of order")));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::sort_by_jump_target;
    use crate::index::usage::tests::usage;
    use crate::index::usage::UsageWriter;
    use tempfile::TempDir;

    #[test]
    fn test_query_in_write_order() {
        let dir = TempDir::new().unwrap();
        let mut writer = UsageWriter::create(dir.path()).unwrap();
        writer.write(&usage(UsageKind::Type, 100, 2, 5, 30)).unwrap();
        writer.write(&usage(UsageKind::Field, 100, 2, 1, 1)).unwrap();
        writer.write(&usage(UsageKind::Type, 100, 2, 5, 10)).unwrap();
        writer.close().unwrap();

        let reader = UsageReader::open(dir.path()).unwrap();
        let usages = reader.query(UsageKind::Type, 100);
        assert_eq!(usages.len(), 2);

        let mut records = usages.to_vec().unwrap();
        let columns: Vec<_> = records.iter().map(|r| r.usage.span.from.column).collect();
        assert_eq!(columns, vec![30, 10]);

        sort_by_jump_target(&mut records);
        let columns: Vec<_> = records.iter().map(|r| r.usage.span.from.column).collect();
        assert_eq!(columns, vec![10, 30]);

        assert_eq!(reader.query(UsageKind::Field, 100).len(), 1);
    }

    #[test]
    fn test_sequence_is_restartable() {
        let dir = TempDir::new().unwrap();
        let mut writer = UsageWriter::create(dir.path()).unwrap();
        for column in 0..5 {
            writer.write(&usage(UsageKind::Method, 7, 3, 0, column)).unwrap();
        }
        writer.close().unwrap();

        let reader = UsageReader::open(dir.path()).unwrap();
        let usages = reader.query(UsageKind::Method, 7);
        let mut first = usages.iter();
        first.next().unwrap().unwrap();
        first.next().unwrap().unwrap();

        // A fresh iteration starts from the beginning
        let all: Vec<_> = (&usages).into_iter().map(|r| r.unwrap().usage.span.from.column).collect();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
        assert_eq!(usages.iter().count(), 5);
    }

    #[test]
    fn test_absent_key_is_empty() {
        let dir = TempDir::new().unwrap();
        UsageWriter::create(dir.path()).unwrap().close().unwrap();
        let reader = UsageReader::open(dir.path()).unwrap();
        for _ in 0..3 {
            let usages = reader.query(UsageKind::Variable, 12345);
            assert!(usages.is_empty());
            assert_eq!(usages.iter().count(), 0);
        }
    }

    #[test]
    fn test_truncated_postings_reported() {
        let dir = TempDir::new().unwrap();
        let mut writer = UsageWriter::create(dir.path()).unwrap();
        writer.write(&usage(UsageKind::Type, 1, 2, 0, 0)).unwrap();
        writer.close().unwrap();

        let reader = UsageReader::open(dir.path()).unwrap();
        let usages = Usages {
            count: 3,
            ..reader.query(UsageKind::Type, 1)
        };
        let results: Vec<_> = usages.iter().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().unwrap_err().is_fatal());
    }

    #[test]
    fn test_posting_offset_overflow_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let mut writer = UsageWriter::create(dir.path()).unwrap();
        writer.write(&usage(UsageKind::Type, 1, 2, 0, 0)).unwrap();
        writer.close().unwrap();

        // Offset field of the only entry: after kind and id
        let path = dir.path().join(DICT_FILE);
        let mut dict = fs::read(&path).unwrap();
        let at = HEADER_LEN + 8 + 1 + 8;
        dict[at..at + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        fs::write(&path, dict).unwrap();

        assert!(matches!(UsageReader::open(dir.path()), Err(Error::CorruptIndex(_))));
    }
}
