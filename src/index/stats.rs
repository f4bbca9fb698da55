use crate::error::Error;
use crate::index::segment::read_meta;
use crate::index::types::{StoreKind, StoreMeta};
use crate::index::{SOURCE_DIR, USAGE_DIR};
use anyhow::{Context, Result};
use std::path::Path;

/// Display statistics for the stores found under an index directory
pub fn show_stats(index_dir: &Path) -> Result<()> {
    println!("Index Statistics");
    println!("================");
    println!();
    println!("Index location:   {}", index_dir.display());

    let mut found = false;
    for (label, subdir, kind) in [
        ("Source store", SOURCE_DIR, StoreKind::Source),
        ("Usage store", USAGE_DIR, StoreKind::Usage),
    ] {
        let dir = index_dir.join(subdir);
        match load(&dir, kind)? {
            Some(meta) => {
                found = true;
                println!();
                print_store(label, &dir, &meta);
            }
            None => log::debug!("no {label} at {}", dir.display()),
        }
    }

    if !found {
        println!();
        println!("No finished stores found. Run 'srcdb index' first.");
    }
    Ok(())
}

/// Metadata of a finished store, `None` when absent or unfinished
fn load(dir: &Path, kind: StoreKind) -> Result<Option<StoreMeta>> {
    match read_meta(dir, kind) {
        Ok(meta) => Ok(Some(meta)),
        Err(Error::NotFinalized(_)) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", dir.display())),
    }
}

fn print_store(label: &str, dir: &Path, meta: &StoreMeta) {
    println!("{label}");
    println!("  Format version: {}", meta.version);
    match meta.kind {
        StoreKind::Source => {
            println!("  Files:          {}", meta.record_count);
            println!("  Directories:    {}", meta.key_count);
        }
        StoreKind::Usage => {
            println!("  Usages:         {}", meta.record_count);
            println!("  Subjects:       {}", meta.key_count);
        }
    }
    println!("  Log size:       {}", format_size(meta.log_bytes));
    if let Ok(size) = dir_size(dir) {
        println!("  On disk:        {}", format_size(size));
    }
    println!("  Created:        {}", format_timestamp(meta.created_at));
}

/// Total size of the files directly inside `path`
fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut size = 0;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        if entry.path().is_file() {
            size += entry.metadata()?.len();
        }
    }
    Ok(size)
}

/// Format byte size to human readable
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format unix timestamp
fn format_timestamp(ts: u64) -> String {
    use std::time::{Duration, UNIX_EPOCH};
    let datetime = UNIX_EPOCH + Duration::from_secs(ts);
    format!("{:?}", datetime)
}
