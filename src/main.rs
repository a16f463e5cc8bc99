//! `ironsieve` batch driver.
//!
//! Reads every Arrow IPC file matched by `--input`, treats each as one record
//! keyed by the SHA-256 of its bytes, filters it and writes the survivors to
//! `--output`. The batch report is printed to stdout as JSON; logs go to
//! stderr and honor `RUST_LOG`.
//!
//! ```sh
//! ironsieve --input 'tables/*.arrow' --output out --format parquet --config sieve.toml
//! ```

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use ironsieve::{
    BatchReport, DispatchConfig, ExecMode, FilterConfig, OutputFormat, ParquetCompression, Record,
    RecordProcessor, TaskDispatcher, TaskReservation,
};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogFormat {
    Human,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "ironsieve", version, about = "Filter Arrow tables and write the survivors")]
struct Args {
    /// Glob of Arrow IPC files; each file is one record.
    #[arg(long)]
    input: String,

    /// Directory for output files; created if missing.
    #[arg(long)]
    output: PathBuf,

    /// Output format (csv or parquet).
    #[arg(long, default_value = "parquet")]
    format: OutputFormat,

    /// Parquet compression (zstd, snappy or none).
    #[arg(long, default_value = "zstd")]
    compression: ParquetCompression,

    /// Filter config file (`.toml` or `.json`). Defaults apply when omitted.
    #[arg(long, env = "IRONSIEVE_CONFIG")]
    config: Option<PathBuf>,

    /// CPUs reserved by each task.
    #[arg(long, default_value_t = 1)]
    cpus_per_task: usize,

    /// Memory reserved by each task, in bytes.
    #[arg(long, default_value_t = 512 * 1024 * 1024)]
    memory_per_task: u64,

    /// Worker threads. Defaults to as many tasks as fit on this host.
    #[arg(long)]
    workers: Option<usize>,

    /// Run every task on the main thread.
    #[arg(long, conflicts_with = "workers")]
    sequential: bool,

    /// Seed for column and row sampling; overrides the config file.
    #[arg(long)]
    seed: Option<u64>,

    /// Abort the batch if any input cannot be decoded.
    #[arg(long)]
    strict_decode: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Human)]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Human => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_records(pattern: &str) -> Result<Vec<Record>> {
    let mut paths = glob::glob(pattern)
        .with_context(|| format!("invalid glob pattern {pattern:?}"))?
        .collect::<Result<Vec<_>, _>>()
        .context("expand input glob")?;
    paths.retain(|p| p.is_file());
    paths.sort();
    if paths.is_empty() {
        bail!("no input files match {pattern:?}");
    }

    paths
        .into_iter()
        .map(|path| {
            let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            let hash = hex::encode(Sha256::digest(&bytes));
            Ok(Record::from_arrow_bytes(hash, bytes)
                .with_field("source_path", path.display().to_string()))
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let mut filter = match &args.config {
        Some(path) => FilterConfig::from_path(path)?,
        None => FilterConfig::default(),
    };
    if args.seed.is_some() {
        filter = filter.with_sample_seed(args.seed);
    }

    let mode = if args.sequential {
        ExecMode::Sequential
    } else {
        ExecMode::Parallel {
            workers: args.workers,
        }
    };
    let dispatch = DispatchConfig::new(&args.output, args.format)
        .with_parquet_compression(args.compression)
        .with_reservation(TaskReservation {
            num_cpus: args.cpus_per_task,
            memory_bytes: args.memory_per_task,
        })
        .with_mode(mode)
        .with_strict_decode(args.strict_decode);

    let records = load_records(&args.input)?;
    let dispatcher = TaskDispatcher::new(RecordProcessor::new(filter), dispatch)
        .context("configure dispatcher")?;
    info!(
        records = records.len(),
        workers = dispatcher.workers(),
        output = %args.output.display(),
        format = %args.format,
        "starting batch"
    );

    let outcomes = dispatcher.dispatch_batch(records)?;
    let report = BatchReport::from_outcomes(&outcomes);
    info!(
        written = report.written,
        rejected = report.rejected,
        failed = report.failed,
        "batch finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
