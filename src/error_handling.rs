use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::SetLoggerError;
use strum::IntoEnumIterator;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the DNS resolver.
    #[error("DNS resolver initialization error: {0}")]
    DnsResolverError(String),

    /// Error opening a GeoIP database file.
    #[error("GeoIP database error: {0}")]
    GeoIpError(#[from] maxminddb::MaxMindDbError),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The connection string's scheme names a backend this build does not support.
    #[error("Unsupported database scheme \"{0}\" (supported: sqlite)")]
    UnsupportedScheme(String),

    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

/// Errors produced while moving a report through the pipeline.
///
/// The variants split along the propagation policy: structural and format
/// errors are fatal to one report/attachment and get recorded in the failure
/// bucket, while ledger/load errors are fatal to the whole run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required XML node was missing or held an unparsable value.
    #[error("report doesn't contain required \"{0}\"")]
    StructuralParse(String),

    /// The payload was not well-formed XML at all.
    #[error("malformed report XML: {0}")]
    XmlSyntax(#[from] roxmltree::Error),

    /// The attachment container format was not recognized.
    #[error("file type \"{0}\" not yet supported")]
    UnsupportedFormat(String),

    /// Ledger or host-cache read/write failed. The persistence layer is
    /// unreliable, so this aborts the run.
    #[error("ledger error: {0}")]
    Ledger(#[from] sled::Error),

    /// Bulk-load transaction failed at prepare, exec or commit.
    #[error("bulk load error: {0}")]
    Load(#[from] sqlx::Error),

    /// An enrichment worker task died (panicked or was aborted).
    #[error("enrichment worker failed: {0}")]
    Worker(String),

    /// Filesystem error while extracting or reading an attachment payload.
    #[error("payload I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive could not be opened or extracted.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl PipelineError {
    /// Whether this error is fatal to one report only (recordable in the
    /// failure bucket) rather than to the whole run.
    pub fn is_report_scoped(&self) -> bool {
        matches!(
            self,
            PipelineError::StructuralParse(_)
                | PipelineError::XmlSyntax(_)
                | PipelineError::UnsupportedFormat(_)
                | PipelineError::Io(_)
                | PipelineError::Archive(_)
        )
    }
}

/// Failure categories tracked during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    StructuralParseError,
    UnsupportedFormatError,
    LedgerError,
    LoadError,
    ReverseDnsMiss,
    GeoLookupMiss,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::StructuralParseError => "Structural parse error",
            ErrorType::UnsupportedFormatError => "Unsupported attachment format",
            ErrorType::LedgerError => "Ledger error",
            ErrorType::LoadError => "Bulk load error",
            ErrorType::ReverseDnsMiss => "Reverse DNS miss",
            ErrorType::GeoLookupMiss => "GeoIP lookup miss",
        }
    }
}

/// Thread-safe per-category counters for the end-of-run summary.
///
/// Tracks the count of each error type using atomic counters, allowing
/// concurrent updates from the enrichment workers. All counters start at
/// zero. Share across tasks with `Arc`.
pub struct ProcessingStats {
    errors: HashMap<ErrorType, AtomicUsize>,
}

impl ProcessingStats {
    pub fn new() -> Self {
        let mut errors = HashMap::new();
        for error in ErrorType::iter() {
            errors.insert(error, AtomicUsize::new(0));
        }
        ProcessingStats { errors }
    }

    pub fn increment(&self, error: ErrorType) {
        // All ErrorType variants are initialized in new(), so the lookup
        // cannot miss
        if let Some(counter) = self.errors.get(&error) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_count(&self, error: ErrorType) -> usize {
        self.errors
            .get(&error)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Logs a summary line per non-zero category.
    pub fn log_summary(&self) {
        for error in ErrorType::iter() {
            let count = self.get_count(error);
            if count > 0 {
                log::info!("{}: {}", error.as_str(), count);
            }
        }
    }
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}
