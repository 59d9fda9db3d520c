//! Datalens: one image-and-annotation view over many dataset sources.
//!
//! COCO JSON files, kwcoco bundles and Hugging Face hub datasets (streamed or
//! downloaded) are all normalized into the same id-indexed [`dataset::Dataset`]
//! model. An [`ImagePipeline`] sits in front of the active dataset and keeps
//! originals and transformed images in two LRU caches sized from the first
//! decoded image and the memory available at the time.
//!
//! # Modules
//!
//! - [`dataset`]: the shared model, the [`DatasetSource`] trait and the COCO
//!   readers
//! - [`hub`]: hub identifiers, row sources and schema normalization
//! - [`registry`]: identifier resolution and the process-wide dataset registry
//! - [`cache`]: the LRU cache and capacity estimation
//! - [`pipeline`]: cached access to original and transformed images
//! - [`inspect`]: dataset summaries for the CLI
//! - [`error`]: error types for datalens operations

pub mod cache;
pub mod dataset;
pub mod error;
pub mod hub;
pub mod inspect;
pub mod pipeline;
pub mod registry;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

pub use dataset::{DatasetSource, ImageId};
pub use error::DatalensError;
pub use pipeline::{ImagePipeline, Transform};
pub use registry::get_dataset;

use hub::LoadMode;

/// The datalens CLI application.
#[derive(Parser)]
#[command(name = "datalens")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG applies otherwise.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Expand dataset references into fully-qualified identifiers.
    Expand(ExpandArgs),
    /// Show counts and the label distribution of a dataset.
    Inspect(InspectArgs),
    /// Load every image of a dataset through the image cache.
    Scan(ScanArgs),
}

#[derive(clap::Args)]
struct ExpandArgs {
    /// COCO JSON paths or hub repository names.
    #[arg(required = true)]
    identifiers: Vec<String>,

    /// Emit 'download' identifiers instead of 'streaming' ones.
    #[arg(long)]
    download: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct InspectArgs {
    /// COCO JSON path or 'repo@config@split@{streaming|download}'.
    identifier: String,

    /// Output format for the report.
    #[arg(long, value_enum, default_value = "text")]
    output: ReportFormat,

    /// Number of labels to list.
    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(clap::Args)]
struct ScanArgs {
    /// COCO JSON path or 'repo@config@split@{streaming|download}'.
    identifier: String,

    /// Stop after this many images.
    #[arg(long)]
    limit: Option<usize>,
}

/// Run the datalens CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), DatalensError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Expand(args)) => run_expand(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        Some(Commands::Scan(args)) => run_scan(args),
        None => {
            println!("datalens {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Uniform image and annotation access over COCO, kwcoco and Hugging Face datasets.");
            println!();
            println!("Run 'datalens --help' for usage information.");
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_expand(args: ExpandArgs) -> Result<(), DatalensError> {
    let mode = if args.download {
        LoadMode::Download
    } else {
        LoadMode::Streaming
    };
    let catalog = registry::default_catalog();
    for identifier in registry::expand_identifiers(&args.identifiers, mode, catalog.as_ref())? {
        println!("{identifier}");
    }
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<(), DatalensError> {
    let source = get_dataset(&args.identifier)?;
    let opts = inspect::InspectOptions {
        top_labels: args.top,
        ..Default::default()
    };
    let report = inspect::inspect_dataset(source.name(), source.dataset(), &opts);

    match args.output {
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
            println!("{json}");
        }
        ReportFormat::Text => print!("{report}"),
    }
    Ok(())
}

fn run_scan(args: ScanArgs) -> Result<(), DatalensError> {
    let source = get_dataset(&args.identifier)?;
    let ids: Vec<ImageId> = source
        .dataset()
        .images
        .keys()
        .take(args.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();

    let mut pipeline = ImagePipeline::new();
    pipeline.set_dataset(source);

    let mut failed = 0usize;
    for id in &ids {
        if let Err(err) = pipeline.get_image_without_cache_eviction(id) {
            tracing::warn!(image = %id, error = %err, "failed to load image");
            failed += 1;
        }
    }

    println!("Scanned:  {}", ids.len());
    println!("Failed:   {failed}");
    println!("Cached:   {}", pipeline.originals().len());
    match pipeline.sizing() {
        cache::CacheSizing::Sized(capacity) => println!("Capacity: {capacity} per cache"),
        cache::CacheSizing::Pending => println!("Capacity: not estimated (no image loaded)"),
    }
    Ok(())
}
