use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, error, trace};

use streamagg::config::AppConfig;
use streamagg::error::{ErrorCode, RunError};
use streamagg::pipeline::{Engine, RunResult, ScanStats, SummaryRecord};
use streamagg::storage::{BlobBackend, ObjectId, SinkBackend};

/// Aggregate large CSV objects in bounded memory
#[derive(Parser)]
#[command(name = "streamagg")]
#[command(about = "Streaming per-group aggregation of CSV objects", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log line format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate one object and write the summaries
    Run {
        /// Path to a TOML configuration file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Bucket holding the source object (overrides S3_BUCKET)
        #[arg(long)]
        bucket: Option<String>,

        /// Key of the source object (overrides FILE_NAME)
        #[arg(long)]
        key: Option<String>,

        /// Destination table (overrides DB_TABLE)
        #[arg(long)]
        table: Option<String>,

        /// Partition key of the written items (default: a fresh UUID)
        #[arg(long)]
        run_id: Option<String>,

        /// Bytes per range read
        #[arg(long)]
        chunk_size: Option<u64>,

        /// Read the source from this directory instead of the configured store
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// Write tables as JSON files into this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Aggregate and print the summaries without writing them
        #[arg(long)]
        dry_run: bool,

        /// Output format of the result
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Write a synthetic input file
    Generate {
        /// Number of data rows
        #[arg(short = 'n', long, default_value = "1000000")]
        rows: u64,

        /// Destination path
        #[arg(short, long)]
        output: PathBuf,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,hyper=debug,aws_smithy_runtime=debug",
    };

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .with_target(cli.verbose >= 2)
            .with_thread_ids(cli.verbose >= 3)
            .with_line_number(cli.verbose >= 3)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .without_time()
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }

    debug!("streamagg started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Commands::Run {
            config,
            bucket,
            key,
            table,
            run_id,
            chunk_size,
            source_dir,
            output_dir,
            dry_run,
            format,
        } => {
            let args = RunArgs {
                config,
                bucket,
                key,
                table,
                run_id,
                chunk_size,
                source_dir,
                output_dir,
                dry_run,
                format,
            };
            run_aggregation(args).await
        }
        Commands::Generate { rows, output, seed } => {
            streamagg::dataset::generate(&output, rows, seed)
        }
    };

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        match e.downcast_ref::<RunError>() {
            Some(run_error) => {
                eprintln!("Error: {}", run_error.user_message());
                std::process::exit(run_error.exit_code());
            }
            None => {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

struct RunArgs {
    config: Option<PathBuf>,
    bucket: Option<String>,
    key: Option<String>,
    table: Option<String>,
    run_id: Option<String>,
    chunk_size: Option<u64>,
    source_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    dry_run: bool,
    format: OutputFormat,
}

/// Layer the command-line flags over file and environment configuration
fn resolve_config(args: &RunArgs) -> Result<AppConfig, RunError> {
    let mut config = AppConfig::resolve(args.config.as_deref())?;

    if let Some(bucket) = &args.bucket {
        config.job.bucket = bucket.clone();
    }
    if let Some(key) = &args.key {
        config.job.key = Some(key.clone());
    }
    if let Some(table) = &args.table {
        config.job.table = Some(table.clone());
    }
    if let Some(chunk_size) = args.chunk_size {
        config.engine.chunk_size = chunk_size;
    }
    // A local source or output directory implies the file backend on that side.
    // Both sides share one base directory.
    if let Some(dir) = &args.source_dir {
        config.storage.blob_backend = BlobBackend::File;
        config.storage.base_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        if args.source_dir.is_some() && args.source_dir.as_ref() != Some(dir) {
            return Err(RunError::config(
                "--source-dir and --output-dir must name the same directory",
            ));
        }
        config.storage.sink_backend = SinkBackend::File;
        config.storage.base_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn run_aggregation(args: RunArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;

    let key = config.job.key.clone().ok_or_else(|| {
        RunError::config_with_code(
            ErrorCode::CONFIG_MISSING_REQUIRED,
            "no source key given (use --key or FILE_NAME)",
        )
    })?;
    let object = ObjectId::new(config.job.bucket.clone(), key);

    let engine = Engine::from_config(&config).await?;

    if args.dry_run {
        let (summaries, stats) = engine.summarize(&object).await?;
        print_summaries(&summaries, &stats, args.format)?;
        return Ok(());
    }

    let table = config.job.table.clone().ok_or_else(|| {
        RunError::config_with_code(
            ErrorCode::CONFIG_MISSING_REQUIRED,
            "no destination table given (use --table or DB_TABLE)",
        )
    })?;
    let run_id = args
        .run_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let result = engine.run(&object, &table, &run_id).await?;
    print_result(&result, args.format)
}

fn print_result(result: &RunResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(result).context("Failed to render result")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            println!("Run {} complete", result.run_id);
            println!("  rows processed: {}", result.rows_processed);
            println!("  rows skipped:   {}", result.rows_skipped);
            println!("  groups emitted: {}", result.groups_emitted);
            println!("  batches:        {}", result.batches_written);
            println!(
                "  read:           {} bytes in {} chunks",
                result.bytes_read, result.chunks_fetched
            );
            for row in &result.skipped_samples {
                println!("  skipped line {}: {}", row.line_number, row.reason);
            }
        }
    }
    Ok(())
}

fn print_summaries(
    summaries: &[SummaryRecord],
    stats: &ScanStats,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "summaries": summaries,
                "stats": stats,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).context("Failed to render summaries")?
            );
        }
        OutputFormat::Text => {
            for summary in summaries {
                println!(
                    "{},{},{},{}",
                    summary.group_primary,
                    summary.group_secondary,
                    summary.most_frequent_category,
                    summary.average_measure
                );
            }
            println!(
                "{} groups from {} rows ({} skipped)",
                summaries.len(),
                stats.rows_processed,
                stats.rows_skipped
            );
        }
    }
    Ok(())
}
