//! dmarcdb library: DMARC aggregate-report ingestion.
//!
//! This library turns a backlog of report mails into rows in a SQL database.
//! Each attachment is resolved to its XML payload (plain, gzipped or
//! zipped), parsed into a canonical report, enriched per record with
//! reverse-DNS and GeoIP context, deduplicated against a persistent ledger
//! and bulk-loaded inside a single transaction.
//!
//! # Example
//!
//! ```no_run
//! use dmarcdb::{run_build, Config, DirSource};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     database: "sqlite://dmarcdb.sqlite".into(),
//!     ..Default::default()
//! };
//! let source = DirSource::new("reports/".into(), false, None);
//!
//! let report = run_build(&config, &source).await?;
//! println!("Processed {} reports, skipped {} duplicates",
//!          report.processed, report.duplicates);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an async
//! context.

#![warn(missing_docs)]

pub mod config;
mod enrich;
mod error_handling;
pub mod initialization;
mod ledger;
mod payload;
mod report;
mod source;
mod storage;
mod web;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use error_handling::PipelineError;
pub use ledger::{Bucket, Ledger};
pub use run::{run_build, BuildReport};
pub use source::{Attachment, DirSource, MailMessage, MailSource};
pub use storage::{database_stats, init_db_pool, retrieve, run_migrations, StatsData};
pub use web::start_stats_server;

// Internal run module (contains the pipeline orchestration logic)
mod run {
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use log::{info, warn};

    use crate::config::Config;
    use crate::enrich::{Enricher, GeoIp};
    use crate::error_handling::{ErrorType, PipelineError, ProcessingStats};
    use crate::initialization::init_resolver;
    use crate::ledger::Ledger;
    use crate::payload::resolve_attachment;
    use crate::report::parse;
    use crate::source::{MailMessage, MailSource};
    use crate::storage::{init_db_pool, run_migrations, BulkLoader};

    /// Results of an ingestion run.
    ///
    /// Counters are independent by design: skipping a duplicate never
    /// adjusts the processed or failed totals.
    #[derive(Debug, Clone)]
    pub struct BuildReport {
        /// Reports parsed, enriched and committed
        pub processed: usize,
        /// Messages skipped because their ID was already marked done
        pub duplicates: usize,
        /// Reports recorded in the failure bucket (broken XML, unsupported
        /// attachment formats)
        pub failed: usize,
        /// Total rows written across all committed reports
        pub rows_written: u64,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    /// Runs the ingestion pipeline over every message the source yields.
    ///
    /// This is the main entry point for the library. For each message:
    /// ledger dedup check, payload resolution, parse, transactional bulk
    /// load, ledger done-mark. Broken reports are recorded in the failure
    /// bucket and skipped unless `stop_on_error` is set; ledger and
    /// database errors abort the whole run.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger or database cannot be opened, if the
    /// persistence layer fails mid-run, or (with `stop_on_error`) on the
    /// first broken report.
    pub async fn run_build(config: &Config, source: &dyn MailSource) -> Result<BuildReport> {
        let ledger = Arc::new(
            Ledger::open(&config.ledger_path).context("Failed to open processing ledger")?,
        );
        let resolver = init_resolver(config.dns.as_deref())
            .context("Failed to initialize DNS resolver")?;

        let geoip = match GeoIp::open(&config.geo_city_db, &config.geo_asn_db) {
            Ok(geoip) => Some(geoip),
            Err(e) => {
                warn!("Failed to open GeoIP databases: {e}. Continuing without location/ASN enrichment.");
                None
            }
        };

        let pool = init_db_pool(&config.database)
            .await
            .context("Failed to initialize database pool")?;
        run_migrations(&pool)
            .await
            .context("Failed to apply database schema")?;

        if let Some(port) = config.stats_port {
            let stats_pool = Arc::clone(&pool);
            tokio::spawn(async move {
                if let Err(e) = crate::web::start_stats_server(port, stats_pool).await {
                    warn!("Stats server error: {e}");
                }
            });
        }

        let stats = Arc::new(ProcessingStats::new());
        let enricher = Arc::new(Enricher::new(
            resolver,
            Arc::clone(&ledger),
            geoip,
            config.cache_hosts,
            Arc::clone(&stats),
        ));
        let loader = BulkLoader::new(Arc::clone(&pool), enricher);

        let messages = source.messages().context("Failed to enumerate mail source")?;
        let total = messages.len();
        info!("Backlog holds {total} messages");

        let start_time = std::time::Instant::now();
        let mut processed = 0usize;
        let mut duplicates = 0usize;
        let mut failed = 0usize;
        let mut rows_written = 0u64;

        for message in &messages {
            if !config.allow_duplicates
                && ledger
                    .is_processed(&message.id)
                    .context("Ledger read failed")?
            {
                duplicates += 1;
            } else {
                match process_message(message, &loader).await {
                    Ok(rows) => {
                        ledger.mark_done(&message.id).context("Ledger write failed")?;
                        processed += 1;
                        rows_written += rows;
                        info!("Processed {processed} / {total} reports");
                    }
                    Err(e) if e.is_report_scoped() => {
                        if config.stop_on_error {
                            return Err(e.into());
                        }
                        count_failure(&stats, &e);
                        ledger
                            .mark_failed(&message.id, &e.to_string())
                            .context("Ledger write failed")?;
                        failed += 1;
                        warn!("Report {} rejected: {e}", message.id);
                    }
                    // Ledger/load/worker errors mean unreliable persistence;
                    // surface them to the operator instead of grinding on
                    Err(e) => return Err(e.into()),
                }
            }

            // Single-shot mode stops after the first message either way,
            // duplicate or not
            if config.dev {
                info!("Development mode: stopping after one message");
                break;
            }
        }

        let elapsed_seconds = start_time.elapsed().as_secs_f64();
        info!(
            "Processed {processed} reports, skipped {duplicates} duplicates, \
             {failed} failed, took {elapsed_seconds:.1}s"
        );
        stats.log_summary();

        Ok(BuildReport {
            processed,
            duplicates,
            failed,
            rows_written,
            elapsed_seconds,
        })
    }

    /// Resolves, parses and loads every attachment of one message.
    ///
    /// All attachments must load before the message counts as done.
    async fn process_message(
        message: &MailMessage,
        loader: &BulkLoader,
    ) -> Result<u64, PipelineError> {
        let mut rows_written = 0u64;
        for attachment in &message.attachments {
            log::debug!("Opening {}", attachment.filename);
            let xml = resolve_attachment(&attachment.filename, &attachment.bytes)?;
            let report = parse(&String::from_utf8_lossy(&xml))?;
            rows_written += loader.load(&report).await?;
        }
        Ok(rows_written)
    }

    fn count_failure(stats: &ProcessingStats, error: &PipelineError) {
        match error {
            PipelineError::StructuralParse(_) | PipelineError::XmlSyntax(_) => {
                stats.increment(ErrorType::StructuralParseError)
            }
            PipelineError::UnsupportedFormat(_) => {
                stats.increment(ErrorType::UnsupportedFormatError)
            }
            PipelineError::Ledger(_) => stats.increment(ErrorType::LedgerError),
            _ => stats.increment(ErrorType::LoadError),
        }
    }
}
