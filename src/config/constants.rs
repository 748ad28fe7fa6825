//! Configuration constants.
//!
//! Operational parameters for the ingestion pipeline: worker-pool limits,
//! DNS timeouts, and the names of the persistent ledger buckets.

/// Hard cap on concurrent enrichment workers per report.
///
/// The pool scales with record count (see [`workers_for`]) but is capped so a
/// pathologically large report cannot spawn unbounded tasks.
pub const MAX_WORKERS: usize = 1000;

/// Computes the enrichment worker-pool size for a report with `records` rows.
///
/// Scales linearly with record count, capped at [`MAX_WORKERS`]. Always at
/// least 1 so empty reports still get a valid pool.
pub fn workers_for(records: usize) -> usize {
    ((records + 30) / 15).clamp(1, MAX_WORKERS)
}

// Network operation timeouts
/// DNS query timeout in seconds.
///
/// Reverse lookups against slow PTR servers are the main stall risk in the
/// enrichment path, so fail fast and degrade to an empty hostname.
pub const DNS_TIMEOUT_SECS: u64 = 3;
/// DNS retry attempts before giving up on a lookup.
pub const DNS_ATTEMPTS: usize = 2;

// Database
/// Default database connection string (the scheme selects the backend).
pub const DEFAULT_DATABASE_URL: &str = "sqlite://dmarcdb.sqlite";
/// Default path for the sled ledger (processed mail, failures, host cache).
pub const DEFAULT_LEDGER_PATH: &str = "./dmarc.db";
/// Rows per multi-row INSERT statement inside the bulk-load transaction.
///
/// SQLite limits bound variables per statement; 26 columns x 500 rows stays
/// comfortably under the default limit of 32766.
pub const INSERT_CHUNK_ROWS: usize = 500;

// GeoIP database defaults (MaxMind GeoLite2 file names)
/// Default GeoLite2-City database path.
pub const DEFAULT_GEO_CITY_DB: &str = "GeoLite2-City.mmdb";
/// Default GeoLite2-ASN database path.
pub const DEFAULT_GEO_ASN_DB: &str = "GeoLite2-ASN.mmdb";

// Ledger bucket (sled tree) names, kept stable so ledgers written by earlier
// deployments remain readable.
/// Bucket holding done markers per message ID.
pub const BUCKET_PROCESSED: &str = "processed-mail";
/// Bucket holding failure reasons per message ID.
pub const BUCKET_FAILED: &str = "processed-fail";
/// Bucket caching reverse-DNS results per IP.
pub const BUCKET_HOSTS: &str = "hosts-cache";

/// Sentinel stored for string fields absent from the source XML.
pub const NULL_SENTINEL: &str = "NULL";
