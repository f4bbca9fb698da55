use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use srcdb::index::{
    build_project, import_usages, sort_by_jump_target, stats, BuildOptions, MemoryIndexSink, SourceReader,
    Span, UsageKind, UsageReader, SOURCE_DIR, USAGE_DIR,
};
use srcdb::parser::{extract_tokens, LineMap};
use srcdb::utils::{get_index_dir, AppConfig};
use std::fs;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "srcdb")]
#[command(about = "Source-code search engine core: source, usage and layout stores")]
struct Cli {
    /// Config file (defaults to config.json in the app data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Which index to use: an explicit directory, or the default one of a project
#[derive(Args)]
struct Target {
    /// Project name
    #[arg(short, long)]
    project: String,

    /// Index directory (defaults to one per project in the app data directory)
    #[arg(long)]
    index_dir: Option<PathBuf>,
}

impl Target {
    fn index_dir(&self) -> Result<PathBuf> {
        match &self.index_dir {
            Some(dir) => Ok(dir.clone()),
            None => get_index_dir(&self.project),
        }
    }

    fn source_reader(&self) -> Result<SourceReader> {
        let dir = self.index_dir()?.join(SOURCE_DIR);
        SourceReader::open(&dir).with_context(|| format!("Failed to open source store at {}", dir.display()))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the source store and layout documents for a project
    Index {
        #[command(flatten)]
        target: Target,

        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// No progress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print a stored file
    Cat {
        #[command(flatten)]
        target: Target,

        /// File id
        #[arg(long, conflicts_with = "path")]
        id: Option<u64>,

        /// File path inside the project, e.g. /src/Main.java
        #[arg(long)]
        path: Option<String>,
    },
    /// List the children of a stored directory
    Ls {
        #[command(flatten)]
        target: Target,

        #[arg(default_value = "/")]
        path: String,
    },
    /// Print the tokens of a source file
    Tokens {
        file: PathBuf,

        /// Include generic tokens, not just declarations
        #[arg(short, long)]
        all: bool,
    },
    /// Build the usage store from JSON lines (one usage record per line)
    ImportUsages {
        #[command(flatten)]
        target: Target,

        /// Input file (defaults to stdin)
        input: Option<PathBuf>,
    },
    /// Print every usage of a symbol as JSON lines
    Usages {
        #[command(flatten)]
        target: Target,

        #[arg(long, value_enum)]
        kind: KindArg,

        /// Subject id
        id: u64,

        /// Sort by file and position instead of write order
        #[arg(short, long)]
        sort: bool,
    },
    /// Show index statistics
    Stats {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Type,
    Method,
    Field,
    Variable,
}

impl From<KindArg> for UsageKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Type => UsageKind::Type,
            KindArg::Method => UsageKind::Method,
            KindArg::Field => UsageKind::Field,
            KindArg::Variable => UsageKind::Variable,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Index { target, path, quiet } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            run_index(&target, &path, config, quiet)?;
        }
        Commands::Cat { target, id, path } => {
            let reader = target.source_reader()?;
            let file = match (id, path) {
                (Some(id), _) => reader.query_source_by_id(id)?,
                (None, Some(path)) => reader.query_source_by_path(&target.project, &path)?,
                (None, None) => bail!("Either --id or --path is required"),
            };
            match file {
                Some(file) => io::stdout().write_all(&file.source)?,
                None => eprintln!("No such file"),
            }
        }
        Commands::Ls { target, path } => {
            let reader = target.source_reader()?;
            for name in reader.list_directory(&target.project, &path) {
                println!("{name}");
            }
        }
        Commands::Tokens { file, all } => {
            print_tokens(&file, all)?;
        }
        Commands::ImportUsages { target, input } => {
            let index_dir = target.index_dir()?;
            let meta = match input {
                Some(path) => {
                    let file = fs::File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
                    import_usages(BufReader::new(file), &index_dir)?
                }
                None => import_usages(io::stdin().lock(), &index_dir)?,
            };
            println!(
                "Imported {} usages of {} subjects into {}",
                meta.record_count,
                meta.key_count,
                index_dir.join(USAGE_DIR).display()
            );
        }
        Commands::Usages { target, kind, id, sort } => {
            let dir = target.index_dir()?.join(USAGE_DIR);
            let reader =
                UsageReader::open(&dir).with_context(|| format!("Failed to open usage store at {}", dir.display()))?;
            let mut records = reader.query(kind.into(), id).to_vec()?;
            if sort {
                sort_by_jump_target(&mut records);
            }
            let mut out = io::stdout().lock();
            for record in &records {
                serde_json::to_writer(&mut out, record)?;
                writeln!(out)?;
            }
        }
        Commands::Stats { target } => {
            stats::show_stats(&target.index_dir()?)?;
        }
    }

    Ok(())
}

fn run_index(target: &Target, path: &Path, config: AppConfig, quiet: bool) -> Result<()> {
    let options = BuildOptions {
        project: target.project.clone(),
        root: path.to_path_buf(),
        index_dir: target.index_dir()?,
        config,
        silent: quiet,
    };
    if !quiet {
        println!("Indexing {} as {}", path.display(), options.project);
    }

    let mut sink = MemoryIndexSink::new();
    let report = build_project(&options, &mut sink)?;

    println!(
        "Indexed {} files and {} directories ({} terms)",
        report.files, report.directories, report.terms
    );
    if !report.failures.is_empty() {
        eprintln!("{} items failed:", report.failures.len());
        for failure in &report.failures {
            eprintln!("  {failure}");
        }
    }
    if !quiet {
        println!("Index stored at: {}", options.index_dir.display());
    }
    Ok(())
}

fn print_tokens(path: &Path, all: bool) -> Result<()> {
    let source = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let tokens = extract_tokens(&source).with_context(|| format!("Failed to tokenize {}", path.display()))?;
    let lines = LineMap::new(&source);

    let mut out = io::stdout().lock();
    for token in tokens.iter().filter(|t| all || t.kind.is_declaration()) {
        let Span { from, to } = lines.span(token.span);
        let text = token
            .span
            .slice(&source)
            .map(String::from_utf8_lossy)
            .unwrap_or_default();
        writeln!(
            out,
            "{}:{}-{}:{}\t{:?}\t{}",
            from.line + 1,
            from.column + 1,
            to.line + 1,
            to.column + 1,
            token.kind,
            text
        )?;
    }
    Ok(())
}
