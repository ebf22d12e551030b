use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::ThreadPoolBuilder;
use wordbpe::corpus::load_records;
use wordbpe::serialization::{default_output_paths, save_huggingface_tokenizer, TableOutputs};
use wordbpe::{
    tfdf, IngestConfig, Representation, TfDfConfig, Trainer, TrainerConfig, WeightSource,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Word-level BPE trainer with exact corpus frequencies",
    long_about = None,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(flatten)]
    train: TrainArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Count term and document frequencies in cleaned text
    Tfdf(TfDfArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Corpus of `word [tf [df]]` lines
    #[arg(required = true, value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Token table path [default: <INPUT stem>_tokens.txt]
    #[arg(long, value_name = "PATH")]
    tokens_out: Option<PathBuf>,

    /// Merge table path [default: <INPUT stem>_merges.txt]
    #[arg(long, value_name = "PATH")]
    merges_out: Option<PathBuf>,

    /// Also write a Hugging Face tokenizer.json
    #[arg(long, value_name = "PATH")]
    tokenizer_json: Option<PathBuf>,

    /// Also write a vocab/merges/freq summary JSON
    #[arg(long, value_name = "PATH")]
    vocab_json: Option<PathBuf>,

    /// Write training metrics as JSON
    #[arg(long, value_name = "PATH")]
    metrics_json: Option<PathBuf>,

    /// Minimum weighted pair frequency (at least 2)
    #[arg(long, value_name = "COUNT")]
    min_frequency: Option<u64>,

    /// Stop after this many merges
    #[arg(long, value_name = "COUNT")]
    max_merges: Option<usize>,

    /// Corpus representation used by the merge loop
    #[arg(long, value_enum, default_value_t = RepresentationArg::Words)]
    representation: RepresentationArg,

    /// Column used as the word weight
    #[arg(long, value_enum, default_value_t = WeightArg::Tf)]
    weight: WeightArg,

    /// Lowercase words before training
    #[arg(long)]
    lowercase: bool,

    /// Emit pretty tokenizer.json
    #[arg(long)]
    pretty: bool,

    /// Disable per-iteration logging/progress
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct TfDfArgs {
    /// Files or directories of cleaned text
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output path [default: <INPUT>.tfdf.tsv for a single input file]
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Number of line chunks counted in parallel
    #[arg(long, value_name = "N")]
    chunks: Option<usize>,

    /// Limit Rayon worker threads
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Keep the original letter case
    #[arg(long)]
    keep_case: bool,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RepresentationArg {
    Words,
    LinkedStream,
}

impl From<RepresentationArg> for Representation {
    fn from(arg: RepresentationArg) -> Self {
        match arg {
            RepresentationArg::Words => Self::Words,
            RepresentationArg::LinkedStream => Self::LinkedStream,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum WeightArg {
    Tf,
    Df,
    Uniform,
}

impl From<WeightArg> for WeightSource {
    fn from(arg: WeightArg) -> Self {
        match arg {
            WeightArg::Tf => Self::TermFrequency,
            WeightArg::Df => Self::DocumentFrequency,
            WeightArg::Uniform => Self::Uniform,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Tfdf(args)) => run_tfdf(args),
        None => run_train(cli.train),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn run_train(args: TrainArgs) -> Result<()> {
    let Some(input) = args.input else {
        bail!("an input corpus is required");
    };

    let mut cfg = TrainerConfig::builder()
        .max_merges(args.max_merges)
        .representation(args.representation.into())
        .show_progress(!args.no_progress);
    if let Some(min_frequency) = args.min_frequency {
        cfg = cfg.min_frequency(min_frequency);
    }
    let trainer_cfg = cfg.build()?;
    let ingest_cfg = IngestConfig::builder()
        .weight(args.weight.into())
        .lowercase(args.lowercase)
        .build();

    let (records, report) = load_records(&input, &ingest_cfg)
        .with_context(|| format!("failed to load corpus {}", input.display()))?;
    info!(
        "loaded {} records from {} ({} lines, {} rejected)",
        report.records,
        input.display(),
        report.lines,
        report.rejected.len()
    );

    let (default_tokens, default_merges) = default_output_paths(&input);
    let outputs = TableOutputs::create(
        args.tokens_out.unwrap_or(default_tokens),
        args.merges_out.unwrap_or(default_merges),
    )?;

    let spinner = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} training merges... {elapsed}")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let trainer = Trainer::new(trainer_cfg);
    let start = Instant::now();
    let artifacts = trainer.train_from_records(&records, &ingest_cfg)?;
    drop(records);
    if let Some(pb) = spinner {
        pb.finish_with_message("training complete");
    }
    let elapsed = start.elapsed();

    let tokens_path = outputs.tokens_path().to_path_buf();
    let merges_path = outputs.merges_path().to_path_buf();
    outputs
        .write(&artifacts.model)
        .context("failed to write output tables")?;

    if let Some(path) = &args.tokenizer_json {
        save_huggingface_tokenizer(&artifacts.model, path, args.pretty)
            .with_context(|| format!("failed to save tokenizer to {}", path.display()))?;
    }
    if let Some(path) = &args.vocab_json {
        artifacts
            .model
            .save_vocab_json(path)
            .with_context(|| format!("failed to save vocab summary to {}", path.display()))?;
    }
    if let Some(path) = &args.metrics_json {
        let json = serde_json::to_string_pretty(&artifacts.metrics)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    }

    let merges = artifacts.model.merges().len();
    info!(
        "training complete: merges={merges} vocab={} stop={:?} duration={elapsed:.2?}",
        artifacts.model.vocab_size(),
        artifacts.metrics.stop_reason
    );
    println!(
        "wrote {} tokens to {} and {merges} merges to {}",
        artifacts.model.token_frequencies().len(),
        tokens_path.display(),
        merges_path.display()
    );
    Ok(())
}

fn run_tfdf(args: TfDfArgs) -> Result<()> {
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("unable to configure Rayon thread pool")?;
    }

    let output = match (&args.output, args.inputs.as_slice()) {
        (Some(path), _) => path.clone(),
        (None, [single]) if single.is_file() => tfdf::default_output_path(single),
        (None, _) => bail!("--output is required unless a single input file is given"),
    };

    let cfg = TfDfConfig {
        chunks: args.chunks,
        lowercase: !args.keep_case,
        recursive: !args.no_recursive,
        follow_symlinks: args.follow_symlinks,
    };
    cfg.validate()?;

    let file = File::create(&output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let lines = tfdf::load_lines(&args.inputs, &cfg).context("failed to read inputs")?;
    if lines.is_empty() {
        warn!("inputs contain no non-empty lines");
    }

    let start = Instant::now();
    let counts = tfdf::count_lines(&lines, &cfg)?;
    let rows = tfdf::sorted_table(counts);
    let mut writer = BufWriter::new(file);
    tfdf::write_table(&rows, &mut writer)
        .and_then(|()| writer.flush())
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        "counted {} distinct words over {} lines in {:.2?}",
        rows.len(),
        lines.len(),
        start.elapsed()
    );
    println!("wrote {} rows to {}", rows.len(), output.display());
    Ok(())
}
