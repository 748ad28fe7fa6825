//! Configuration types.
//!
//! This module defines the library-facing `Config` struct and the logging
//! enums shared with the CLI.

use std::path::PathBuf;

use clap::ValueEnum;

use crate::config::constants::{
    DEFAULT_DATABASE_URL, DEFAULT_GEO_ASN_DB, DEFAULT_GEO_CITY_DB, DEFAULT_LEDGER_PATH,
};

/// Logging level for the application.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Library configuration (no CLI dependencies).
///
/// This is the core configuration struct used by the library. It can be
/// constructed programmatically without any CLI dependencies; the binary
/// populates it from command-line flags and the environment.
///
/// # Examples
///
/// ```no_run
/// use dmarcdb::Config;
///
/// let config = Config {
///     database: "sqlite://reports.sqlite".into(),
///     cache_hosts: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection string; the scheme selects the backend
    pub database: String,

    /// Path of the sled ledger holding processed-mail / failure / host-cache buckets
    pub ledger_path: PathBuf,

    /// Path of the MaxMind GeoLite2-City database file
    pub geo_city_db: PathBuf,

    /// Path of the MaxMind GeoLite2-ASN database file
    pub geo_asn_db: PathBuf,

    /// Optional DNS resolver override as `host:port`; system default when unset
    pub dns: Option<String>,

    /// Reprocess reports whose message IDs are already marked done
    pub allow_duplicates: bool,

    /// Halt the whole run on the first broken report instead of recording it
    pub stop_on_error: bool,

    /// Cache reverse-DNS results in the ledger's host bucket
    pub cache_hosts: bool,

    /// Development mode: stop after the first message (duplicate or not)
    pub dev: bool,

    /// Enumerate the mail backlog oldest-first instead of newest-first
    pub oldest_first: bool,

    /// Skip this many messages from the start of the enumeration
    pub start_at: Option<usize>,

    /// Port for the JSON stats endpoint (disabled when unset)
    pub stats_port: Option<u16>,

    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE_URL.to_string(),
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            geo_city_db: PathBuf::from(DEFAULT_GEO_CITY_DB),
            geo_asn_db: PathBuf::from(DEFAULT_GEO_ASN_DB),
            dns: None,
            allow_duplicates: false,
            stop_on_error: false,
            cache_hosts: true,
            dev: false,
            oldest_first: false,
            start_at: None,
            stats_port: None,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.database, DEFAULT_DATABASE_URL);
        assert!(!config.allow_duplicates);
        assert!(!config.stop_on_error);
        assert!(config.cache_hosts);
        assert!(config.stats_port.is_none());
        assert!(config.dns.is_none());
    }
}
