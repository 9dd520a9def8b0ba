//! Scanbatch: augmentation and bucketed batching for OCR training data.
//!
//! Scanned text-line images are randomly perturbed (resize, enhancement,
//! padding, crop, stray lines, rotation) and then grouped with examples of
//! similar width and label length into dense, padded batches for
//! attention-based sequence models.
//!
//! # Modules
//!
//! - [`augment`]: Randomized image transforms and the fixed augmentation chain
//! - [`bucket`]: Length-bucketed accumulation of examples into batches
//! - [`generate`]: Streaming generator tying records, augmentation and buckets together
//! - [`label`]: Charmaps and label tokenization
//! - [`record`]: Raw records, TFRecord I/O, annotation import and shuffled epochs
//! - [`codec`]: Image decode/encode adapter
//! - [`config`]: YAML configuration for the CLI
//! - [`error`]: Error types for scanbatch operations

pub mod augment;
pub mod bucket;
pub mod codec;
pub mod config;
pub mod error;
pub mod generate;
pub mod label;
pub mod record;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use image::ImageFormat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::augment::Augmenter;
use crate::bucket::BucketSpec;
use crate::config::{CharmapChoice, ScanbatchConfig};
use crate::generate::{BatchGenerator, GeneratorStats, InvalidRecordPolicy, PreprocessMode};
use crate::record::annotations::DatasetSummary;

pub use error::ScanbatchError;

// Mixed into the stream seed so the generator and the shuffle buffer draw
// from different sequences.
const GENERATOR_SEED_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

/// The scanbatch CLI application.
#[derive(Parser)]
#[command(name = "scanbatch")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Build a TFRecord file from a tab-separated annotation list.
    Dataset(DatasetArgs),
    /// Stream a TFRecord file through augmentation and bucketing.
    Batches(BatchesArgs),
    /// Augment a single image file.
    Augment(AugmentArgs),
}

/// Report output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments for the dataset subcommand.
#[derive(clap::Args)]
struct DatasetArgs {
    /// Annotation file: `path<TAB>label[<TAB>comment]` per line.
    annotations: PathBuf,

    /// Output TFRecord file.
    output: PathBuf,

    /// Reject labels longer than this many characters.
    #[arg(long)]
    max_label_len: Option<usize>,

    /// Output format for the summary.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output_format: OutputFormat,
}

/// Arguments for the batches subcommand.
#[derive(clap::Args)]
struct BatchesArgs {
    /// TFRecord file to read.
    input: PathBuf,

    /// YAML config file; flags given here override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bucket as WIDTHxLABEL_LEN (repeatable, smallest first).
    #[arg(long = "bucket", value_name = "WxL")]
    buckets: Vec<BucketSpec>,

    /// Number of examples per batch.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Probability of augmenting each record.
    #[arg(long, conflicts_with = "width_filter")]
    augment_prob: Option<f64>,

    /// Drop records wider than --max-width instead of augmenting.
    #[arg(long)]
    width_filter: bool,

    /// Maximum image width.
    #[arg(long)]
    max_width: Option<u32>,

    /// Number of passes over the file.
    #[arg(long)]
    epochs: Option<usize>,

    /// Shuffle buffer size (0 disables shuffling).
    #[arg(long)]
    shuffle_buffer: Option<usize>,

    /// Seed for shuffling and augmentation.
    #[arg(long, env = "SCANBATCH_SEED")]
    seed: Option<u64>,

    /// Symbol table used to tokenize labels.
    #[arg(long, value_enum)]
    charmap: Option<CharmapChoice>,

    /// Log and skip invalid records instead of stopping.
    #[arg(long)]
    skip_invalid: bool,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

/// Arguments for the augment subcommand.
#[derive(clap::Args)]
struct AugmentArgs {
    /// Input image.
    input: PathBuf,

    /// Output image; the format follows the extension, else the input's.
    output: PathBuf,

    /// Maximum width after resizing.
    #[arg(long)]
    max_width: Option<u32>,

    /// Seed for the augmentation draws.
    #[arg(long, env = "SCANBATCH_SEED")]
    seed: Option<u64>,
}

/// Run the scanbatch CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), ScanbatchError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Dataset(args)) => run_dataset(args),
        Some(Commands::Batches(args)) => run_batches(args),
        Some(Commands::Augment(args)) => run_augment(args),
        None => {
            println!("scanbatch {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Augmentation and bucketed batching for OCR training data.");
            println!();
            println!("Run 'scanbatch --help' for usage information.");
            Ok(())
        }
    }
}

fn run_dataset(args: DatasetArgs) -> Result<(), ScanbatchError> {
    let summary: DatasetSummary =
        record::annotations::build_dataset(&args.annotations, &args.output, args.max_label_len)?;

    match args.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!(
                "Wrote {} record(s) to {}",
                summary.written,
                args.output.display()
            );
            println!("  longest label: {} character(s)", summary.longest_label);
            if summary.skipped_empty_labels > 0 {
                println!(
                    "  skipped {} entries with an empty label",
                    summary.skipped_empty_labels
                );
            }
        }
    }

    Ok(())
}

/// JSON shape of the batches report.
#[derive(Serialize)]
struct BatchesReport<'a> {
    input: &'a std::path::Path,
    buckets: &'a [BucketSpec],
    batch_size: usize,
    stats: &'a GeneratorStats,
}

fn run_batches(args: BatchesArgs) -> Result<(), ScanbatchError> {
    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => ScanbatchConfig::default(),
    };
    apply_batches_overrides(&mut config, &args);

    let stream = record::stream::open_stream(&args.input, &config.stream)?;
    let rng = match config.stream.seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ GENERATOR_SEED_MIX),
        None => StdRng::from_os_rng(),
    };
    let buckets = config.generator.buckets.clone();
    let batch_size = config.generator.batch_size;

    let mut generator =
        BatchGenerator::new(stream, config.generator, config.charmap.build(), rng)?;

    for (n, batch) in generator.by_ref().enumerate() {
        let batch = batch?;
        if args.output == OutputFormat::Text {
            println!(
                "batch {}: bucket #{} ({}), {} example(s), tokens {:?}",
                n + 1,
                batch.bucket,
                batch.spec,
                batch.len(),
                batch.tokens.dim()
            );
        }
    }

    let stats = generator.into_stats();
    match args.output {
        OutputFormat::Json => {
            let report = BatchesReport {
                input: &args.input,
                buckets: &buckets,
                batch_size,
                stats: &stats,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!();
            println!("Batches from {}:", args.input.display());
            print!("{}", stats);
        }
    }

    Ok(())
}

fn apply_batches_overrides(config: &mut ScanbatchConfig, args: &BatchesArgs) {
    let generator = &mut config.generator;
    if !args.buckets.is_empty() {
        generator.buckets = args.buckets.clone();
    }
    if let Some(batch_size) = args.batch_size {
        generator.batch_size = batch_size;
    }
    if args.width_filter {
        generator.mode = PreprocessMode::WidthFilter;
    } else if let Some(probability) = args.augment_prob {
        generator.mode = PreprocessMode::Augment { probability };
    }
    if args.max_width.is_some() {
        generator.max_width = args.max_width;
    }
    if args.skip_invalid {
        generator.on_invalid = InvalidRecordPolicy::Skip;
    }

    if let Some(epochs) = args.epochs {
        config.stream.epochs = epochs;
    }
    if let Some(shuffle_buffer) = args.shuffle_buffer {
        config.stream.shuffle_buffer = shuffle_buffer;
    }
    if args.seed.is_some() {
        config.stream.seed = args.seed;
    }

    if let Some(charmap) = args.charmap {
        config.charmap = charmap;
    }
}

fn run_augment(args: AugmentArgs) -> Result<(), ScanbatchError> {
    let bytes = std::fs::read(&args.input)?;
    let (img, input_format) = codec::decode(&bytes)?;
    let format = ImageFormat::from_path(&args.output).unwrap_or(input_format);

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let augmented = Augmenter::default().apply(&img, args.max_width, &mut rng)?;

    if augmented.width() == 0 || augmented.height() == 0 {
        return Err(ScanbatchError::DegenerateImage {
            comment: args.input.display().to_string(),
            width: augmented.width(),
            height: augmented.height(),
        });
    }

    std::fs::write(&args.output, codec::encode(&augmented, format)?)?;
    println!(
        "Augmented {} ({}x{}) -> {} ({}x{})",
        args.input.display(),
        img.width(),
        img.height(),
        args.output.display(),
        augmented.width(),
        augmented.height()
    );

    Ok(())
}
