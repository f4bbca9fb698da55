//! Helpers shared by the store writers and readers: the `meta.json` marker and
//! memory-mapped segment files.

use crate::error::{Error, Result};
use crate::index::types::{StoreKind, StoreMeta};
use crate::utils::{check_header, FORMAT_VERSION};
use memmap2::Mmap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const META_FILE: &str = "meta.json";

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Write `meta.json`. This is the last file a writer produces, so a store
/// directory without it is an unfinished build.
pub(crate) fn write_meta(dir: &Path, meta: &StoreMeta) -> Result<()> {
    let mut file = BufWriter::new(File::create(dir.join(META_FILE))?);
    serde_json::to_writer_pretty(&mut file, meta)?;
    file.flush()?;
    Ok(())
}

/// Read and validate the metadata of a finished store of the given kind
pub fn read_meta(dir: &Path, kind: StoreKind) -> Result<StoreMeta> {
    let file = match File::open(dir.join(META_FILE)) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NotFinalized(dir.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    let meta: StoreMeta = serde_json::from_reader(io::BufReader::new(file))?;

    if meta.kind != kind {
        return Err(Error::corrupt(format!(
            "{} holds a {:?} store, expected {:?}",
            dir.display(),
            meta.kind,
            kind
        )));
    }
    if meta.version != FORMAT_VERSION {
        return Err(Error::corrupt(format!("unsupported store version {}", meta.version)));
    }
    Ok(meta)
}

/// Remove the files of a previous generation. `meta.json` goes first so a
/// crash midway leaves an unfinished store rather than a mixed one.
pub(crate) fn clear_store(dir: &Path, files: &[&str]) -> Result<()> {
    let mut names = vec![META_FILE];
    names.extend_from_slice(files);
    for name in names {
        match fs::remove_file(dir.join(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Map a segment file and check its header
pub(crate) fn map_segment(path: &Path, magic: u32) -> Result<Mmap> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("segment");
    check_header(&mmap, magic, name)?;
    Ok(mmap)
}
