//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `dmarcdb` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use dmarcdb::initialization::init_logger_with;
use dmarcdb::{run_build, Bucket, Config, DirSource, Ledger, LogFormat, LogLevel};

#[derive(Parser)]
#[command(name = "dmarcdb", about = "DMARC aggregate report ingestion", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Database connection string (scheme selects the backend)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Path of the processing ledger
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    /// GeoLite2-City database file
    #[arg(long, global = true)]
    geo_city_db: Option<PathBuf>,

    /// GeoLite2-ASN database file
    #[arg(long, global = true)]
    geo_asn_db: Option<PathBuf>,

    /// DNS resolver override as host:port
    #[arg(long, global = true)]
    dns: Option<String>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest the report backlog from a folder of attachments
    Build {
        /// Folder holding the exported report attachments
        folder: PathBuf,

        /// Reprocess reports that were already marked done
        #[arg(long)]
        duplicates: bool,

        /// Halt on the first broken report instead of recording it
        #[arg(long)]
        stop_on_error: bool,

        /// Skip the reverse-DNS host cache
        #[arg(long)]
        no_cache_hosts: bool,

        /// Development mode: stop after one message
        #[arg(long)]
        dev: bool,

        /// Walk the backlog oldest-first instead of newest-first
        #[arg(long)]
        oldest_first: bool,

        /// Skip this many messages from the start of the backlog
        #[arg(long)]
        start_at: Option<usize>,

        /// Serve GET /api/stats on this port while building
        #[arg(long)]
        stats_port: Option<u16>,
    },
    /// Print recorded parse failures, aggregated by reason
    Logs,
    /// Irreversibly clear ledger buckets
    Flush {
        /// Buckets to clear (defaults to both)
        #[arg(value_enum)]
        buckets: Vec<FlushBucket>,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FlushBucket {
    /// Recorded parse failures
    Fails,
    /// Reverse-DNS host cache
    Hosts,
}

impl From<FlushBucket> for Bucket {
    fn from(b: FlushBucket) -> Self {
        match b {
            FlushBucket::Fails => Bucket::Failures,
            FlushBucket::Hosts => Bucket::HostCache,
        }
    }
}

fn build_config(cli: &Cli) -> Config {
    let mut config = Config {
        log_level: cli.log_level.clone(),
        log_format: cli.log_format.clone(),
        ..Default::default()
    };
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(ledger) = &cli.ledger {
        config.ledger_path = ledger.clone();
    }
    if let Some(city) = &cli.geo_city_db {
        config.geo_city_db = city.clone();
    }
    if let Some(asn) = &cli.geo_asn_db {
        config.geo_asn_db = asn.clone();
    }
    config.dns = cli.dns.clone();
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logger_with(cli.log_level.clone().into(), cli.log_format.clone())
        .context("Failed to initialize logger")?;

    let mut config = build_config(&cli);

    match cli.command {
        Command::Build {
            folder,
            duplicates,
            stop_on_error,
            no_cache_hosts,
            dev,
            oldest_first,
            start_at,
            stats_port,
        } => {
            config.allow_duplicates = duplicates;
            config.stop_on_error = stop_on_error;
            config.cache_hosts = !no_cache_hosts;
            config.dev = dev;
            config.oldest_first = oldest_first;
            config.start_at = start_at;
            config.stats_port = stats_port;

            let source = DirSource::new(folder, config.oldest_first, config.start_at);
            match run_build(&config, &source).await {
                Ok(report) => {
                    println!(
                        "Processed {} report{} ({} rows), skipped {} duplicates, {} failed, took {:.1}s",
                        report.processed,
                        if report.processed == 1 { "" } else { "s" },
                        report.rows_written,
                        report.duplicates,
                        report.failed,
                        report.elapsed_seconds
                    );
                    Ok(())
                }
                Err(e) => {
                    eprintln!("dmarcdb error: {:#}", e);
                    process::exit(1);
                }
            }
        }
        Command::Logs => {
            let ledger =
                Ledger::open(&config.ledger_path).context("Failed to open processing ledger")?;
            println!("Fetching logs");
            for (reason, count) in ledger.list_failures().context("Failed to list failures")? {
                println!("({count}) {reason}");
            }
            Ok(())
        }
        Command::Flush { buckets } => {
            let ledger =
                Ledger::open(&config.ledger_path).context("Failed to open processing ledger")?;
            let buckets = if buckets.is_empty() {
                println!("Flushing all fails and hosts");
                vec![FlushBucket::Fails, FlushBucket::Hosts]
            } else {
                buckets
            };
            for bucket in buckets {
                println!("Flushing {bucket:?}");
                ledger
                    .flush(bucket.into())
                    .context("Failed to flush bucket")?;
            }
            Ok(())
        }
        Command::Config => {
            println!("Loaded configuration:");
            println!("{config:#?}");
            Ok(())
        }
    }
}
