//! Build driver: crawls one project and fills the stores and the search index.

use crate::error::Error;
use crate::index::layout::{project_path, LayoutIndexer};
use crate::index::sink::IndexSink;
use crate::index::source::SourceWriter;
use crate::index::types::{SourceFile, StoreMeta, UsageRecord};
use crate::index::usage::UsageWriter;
use crate::index::{SOURCE_DIR, USAGE_DIR};
use crate::parser::{extract_tokens, terms_from_tokens, ParseError, Token};
use crate::utils::progress::Progress;
use crate::utils::AppConfig;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Files read and tokenized per parallel batch; bounds memory on large trees
const CHUNK_SIZE: usize = 2000;

/// What to build and where
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub project: String,
    pub root: PathBuf,
    /// Index directory; the source store goes in its `source/` subdirectory
    pub index_dir: PathBuf,
    pub config: AppConfig,
    /// Suppress progress bars
    pub silent: bool,
}

/// A file or directory the build skipped
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error("{path}: {size} bytes exceeds the size limit")]
    TooLarge { path: String, size: u64 },

    #[error("{path}: {error}")]
    Rejected {
        path: String,
        #[source]
        error: Error,
    },
}

impl Failure {
    pub fn path(&self) -> &str {
        match self {
            Failure::TooLarge { path, .. } | Failure::Rejected { path, .. } => path,
        }
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, Failure::Rejected { error: Error::Parse { .. }, .. })
    }
}

/// Outcome of a build. Failed items are listed; everything else was indexed.
#[derive(Debug)]
pub struct BuildReport {
    pub project: String,
    pub files: usize,
    pub directories: usize,
    pub terms: usize,
    pub failures: Vec<Failure>,
    pub source_meta: StoreMeta,
}

/// Result of reading and tokenizing one file (computed in parallel)
enum ProcessedFile {
    Read {
        path: String,
        content: Vec<u8>,
        tokens: std::result::Result<Vec<Token>, ParseError>,
    },
    Skipped(Failure),
}

fn process_file(full_path: &Path, path: String, max_file_size: u64) -> ProcessedFile {
    let size = full_path.metadata().map(|m| m.len()).unwrap_or(0);
    if size > max_file_size {
        return ProcessedFile::Skipped(Failure::TooLarge { path, size });
    }

    match fs::read(full_path) {
        Ok(content) => {
            let tokens = extract_tokens(&content);
            ProcessedFile::Read { path, content, tokens }
        }
        Err(e) => ProcessedFile::Skipped(Failure::Rejected { path, error: e.into() }),
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("Invalid include pattern {pattern:?}"))?;
        builder.add(glob);
    }
    builder.build().context("Failed to compile include patterns")
}

/// Fail the build on fatal errors; anything else becomes a per-item failure
fn triage(failures: &mut Vec<Failure>, path: &str, error: Error) -> Result<()> {
    if error.is_fatal() {
        return Err(error).with_context(|| format!("Fatal error while indexing {path}"));
    }
    log::warn!("skipping {path}: {error}");
    failures.push(Failure::Rejected {
        path: path.to_string(),
        error,
    });
    Ok(())
}

/// Crawl `options.root` and build the source store and search index for it.
///
/// Directories get a marker in the source store and a layout document in the
/// sink. Every readable file is stored; files that fail to tokenize are
/// reported and contribute no terms. Only fatal errors abort the build.
pub fn build_project<S: IndexSink>(options: &BuildOptions, sink: &mut S) -> Result<BuildReport> {
    let root = options
        .root
        .canonicalize()
        .with_context(|| format!("Invalid project root {}", options.root.display()))?;
    let config = &options.config;
    let includes = build_globset(&config.include_patterns)?;

    let discover = Progress::spinner(options.silent, "Discovering files...");
    let ignored = config.ignored_dirs.clone();
    let walker = WalkBuilder::new(&root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            let name = entry.file_name().to_string_lossy();
            !(is_dir && ignored.iter().any(|d| d.as_str() == name.as_ref()))
        })
        .build();

    let mut directories = Vec::new();
    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("walk error: {e}");
                continue;
            }
        };
        let path = entry.path().to_path_buf();
        let Some(name) = project_path(&root, &path) else {
            continue;
        };
        if path.is_dir() {
            directories.push((path, name));
        } else if path.is_file() && includes.is_match(name.trim_start_matches('/')) {
            files.push((path, name));
        }
    }
    discover.finish(format!(
        "Found {} files in {} directories",
        files.len(),
        directories.len()
    ));

    let mut writer = SourceWriter::create(&options.index_dir.join(SOURCE_DIR))
        .context("Failed to create source store")?;
    let mut failures = Vec::new();

    // Directories: marker + layout document
    let mut layout = LayoutIndexer::new(&options.project, &root, &mut *sink);
    let mut directory_count = 0;
    for (path, name) in &directories {
        if let Err(e) = writer.write_directory(&options.project, name) {
            triage(&mut failures, name, e)?;
            continue;
        }
        match layout.index_directory(path) {
            Ok(_) => directory_count += 1,
            Err(e) => triage(&mut failures, name, e)?,
        }
    }
    drop(layout);

    // Files: parallel read + tokenize, sequential store writes
    let progress = Progress::files(options.silent, files.len(), "Indexing files...");

    let mut next_id = config.first_file_id;
    let mut term_count = 0;
    for chunk in files.chunks(CHUNK_SIZE) {
        let processed: Vec<ProcessedFile> = chunk
            .par_iter()
            .map(|(full_path, name)| {
                let result = process_file(full_path, name.clone(), config.max_file_size);
                progress.inc();
                result
            })
            .collect();

        for item in processed {
            let (path, content, tokens) = match item {
                ProcessedFile::Read { path, content, tokens } => (path, content, tokens),
                ProcessedFile::Skipped(failure) => {
                    log::warn!("skipping {failure}");
                    failures.push(failure);
                    continue;
                }
            };

            let file = SourceFile::new(next_id, &options.project, &path, content);
            if let Err(e) = writer.write(&file) {
                triage(&mut failures, &path, e)?;
                continue;
            }
            next_id += 1;

            match tokens {
                Ok(tokens) => {
                    let terms = terms_from_tokens(&file.source, &tokens);
                    term_count += terms.len();
                    if let Err(e) = sink.add_terms(&file.handle(), terms) {
                        triage(&mut failures, &path, e)?;
                    }
                }
                Err(source) => {
                    let error = Error::Parse {
                        project: options.project.clone(),
                        path: path.clone(),
                        source,
                    };
                    triage(&mut failures, &path, error)?;
                }
            }
        }
    }

    let stored = writer.file_count();
    progress.finish(format!("Stored {stored} files"));

    let source_meta = writer.close().context("Failed to finalize source store")?;
    log::info!(
        "indexed {}: {} files, {} directories, {} terms, {} failures",
        options.project,
        stored,
        directory_count,
        term_count,
        failures.len()
    );

    Ok(BuildReport {
        project: options.project.clone(),
        files: stored,
        directories: directory_count,
        terms: term_count,
        failures,
        source_meta,
    })
}

/// Build the usage store in `index_dir` from JSON lines, one [`UsageRecord`]
/// per line. Blank lines are ignored; a malformed line aborts the import.
pub fn import_usages<R: BufRead>(input: R, index_dir: &Path) -> Result<StoreMeta> {
    let mut writer = UsageWriter::create(&index_dir.join(USAGE_DIR)).context("Failed to create usage store")?;

    for (number, line) in input.lines().enumerate() {
        let line = line.context("Failed to read usage input")?;
        if line.trim().is_empty() {
            continue;
        }
        let record: UsageRecord =
            serde_json::from_str(&line).with_context(|| format!("Invalid usage record on line {}", number + 1))?;
        writer.write(&record)?;
    }

    writer.close().context("Failed to finalize usage store")
}
