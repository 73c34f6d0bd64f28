mod generator;
mod reporter;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::IsTerminal;
use std::num::{NonZeroU64, NonZeroUsize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use streamscout::{CliOverrides, NullReporter, Reporter, SearchConfig, StreamSearcher};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::generator::generate_input;
use crate::reporter::ConsoleReporter;

/// Term used when neither the command line nor a config file names one
const DEFAULT_TERM: &str = "Leapfn";

/// Size of the input generated when no file is given
const DEFAULT_GEN_SIZE: u64 = 100_000_000;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliSearchArgs {
    /// File to search. Without it a random input is generated at ./_input.txt
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,

    /// Term to search for in each chunk
    #[arg(short = 't', long)]
    term: Option<String>,

    /// Treat the term as a regular expression
    #[arg(short = 'r', long)]
    regex: bool,

    /// Number of workers (default: CPU cores)
    #[arg(short = 'w', long)]
    workers: Option<NonZeroUsize>,

    /// Per-chunk timeout in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Chunk size in bytes (default: file size / workers)
    #[arg(short = 'c', long)]
    chunk_size: Option<NonZeroU64>,

    /// Capacity of the pending-job queue (default: number of jobs)
    #[arg(long)]
    queue_capacity: Option<NonZeroUsize>,

    /// Also search the trailing bytes that do not fill a whole chunk
    #[arg(long)]
    include_tail: bool,

    /// Read the file through a memory map
    #[arg(long)]
    mmap: bool,

    /// Size of the generated input when no file is given
    #[arg(long, default_value_t = DEFAULT_GEN_SIZE)]
    gen_size: u64,

    /// Configuration file to load on top of the global and local ones
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the summary as JSON instead of per-job lines
    #[arg(long)]
    json: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a file chunk by chunk with a pool of workers
    Search(Box<CliSearchArgs>),

    /// Write a random input file with the term sprinkled through it
    Generate {
        /// Where to write the file
        #[arg(short = 'o', long, default_value = "./_input.txt")]
        output: PathBuf,

        /// Size of the file in bytes
        #[arg(short = 's', long, default_value_t = DEFAULT_GEN_SIZE)]
        size: u64,

        /// Term to insert
        #[arg(short = 't', long, default_value = DEFAULT_TERM)]
        term: String,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    run()
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search(args) => run_search(*args),
        Commands::Generate {
            output,
            size,
            term,
            seed,
        } => {
            setup_logging("warn")?;
            let inserted = generate_input(&output, size, &term, seed)
                .with_context(|| format!("Failed to generate {}", output.display()))?;
            println!(
                "Wrote {} bytes to {} with {} occurrences of {:?}",
                size,
                output.display(),
                inserted.len(),
                term
            );
            Ok(())
        }
    }
}

fn run_search(args: CliSearchArgs) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let file_given = args.file.is_some();
    let overrides = CliOverrides {
        file_path: args.file,
        search_term: args.term,
        is_regex: args.regex,
        worker_count: args.workers,
        timeout_ms: args.timeout,
        chunk_size: args.chunk_size,
        queue_capacity: args.queue_capacity,
        include_tail: args.include_tail,
        use_mmap: args.mmap,
        log_level: args.log_level,
    };

    let mut config = SearchConfig::load_from(args.config.as_deref())
        .context("Failed to load configuration")?
        .merge_with_cli(overrides);
    if config.search_term.is_empty() {
        config.search_term = DEFAULT_TERM.to_string();
    }

    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    setup_logging(&config.log_level)?;
    debug!("Effective configuration: {:?}", config);

    if !file_given && config.file_path == SearchConfig::default().file_path {
        ensure_generated(&config.file_path, args.gen_size, &config.search_term)?;
    }

    let searcher = StreamSearcher::new(&config)
        .with_context(|| format!("Failed to set up search of {}", config.file_path.display()))?;
    info!(
        "Searching {} for {:?} with {} workers",
        config.file_path.display(),
        config.search_term,
        config.worker_count
    );

    if args.json {
        let summary = searcher.search_with(Arc::new(NullReporter))?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let show_progress = std::io::stderr().is_terminal();
    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter::new(
        searcher.plan().job_count(),
        show_progress,
    ));
    let summary = searcher.search_with(reporter)?;

    if summary.timed_out > 0 || summary.failed > 0 {
        eprintln!(
            "{}",
            format!(
                "{} of {} jobs did not finish ({} timed out, {} failed)",
                summary.timed_out + summary.failed,
                summary.jobs.len(),
                summary.timed_out,
                summary.failed
            )
            .yellow()
        );
    }

    Ok(())
}

/// Writes a fresh random input at `path`
fn ensure_generated(path: &Path, size: u64, term: &str) -> Result<()> {
    info!("Generating {} bytes of input at {}", size, path.display());
    let inserted = generate_input(path, size, term, None)
        .with_context(|| format!("Failed to generate {}", path.display()))?;
    debug!("Inserted {} occurrences of {:?}", inserted.len(), term);
    Ok(())
}

fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("streamscout={},warn", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    Ok(())
}
