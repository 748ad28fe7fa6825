//! Persistent processing ledger.
//!
//! A sled database with three trees mirroring the persisted state layout:
//! `processed-mail` (message ID -> done marker), `processed-fail`
//! (message ID -> failure reason) and `hosts-cache` (IP -> comma-joined
//! hostnames). The ledger is opened once at startup and shared read/write by
//! all pipeline tasks; sled serializes tree access internally.
//!
//! Entries never expire. The only way to drop state is an explicit
//! [`Ledger::flush`] of a bucket.

use std::collections::BTreeMap;
use std::path::Path;

use sled::Tree;

use crate::config::{BUCKET_FAILED, BUCKET_HOSTS, BUCKET_PROCESSED};

/// One-byte marker stored for fully processed messages.
const DONE_MARKER: &[u8] = &[1];

/// Flushable ledger buckets.
///
/// The processed-mail bucket is deliberately not flushable from here;
/// dropping dedup state silently reprocesses an entire mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Recorded parse failures (`processed-fail`)
    Failures,
    /// Reverse-DNS cache (`hosts-cache`)
    HostCache,
}

/// Handle to the persistent dedup / failure-audit / host-cache store.
pub struct Ledger {
    processed: Tree,
    failed: Tree,
    hosts: Tree,
    // Keeps the database open for the lifetime of the handle
    _db: sled::Db,
}

impl Ledger {
    /// Opens (or creates) the ledger at `path` and its three buckets.
    pub fn open(path: &Path) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        let processed = db.open_tree(BUCKET_PROCESSED)?;
        let failed = db.open_tree(BUCKET_FAILED)?;
        let hosts = db.open_tree(BUCKET_HOSTS)?;
        Ok(Ledger {
            processed,
            failed,
            hosts,
            _db: db,
        })
    }

    /// True only if a done marker exists for `message_id`.
    pub fn is_processed(&self, message_id: &str) -> Result<bool, sled::Error> {
        Ok(self
            .processed
            .get(message_id.as_bytes())?
            .map(|v| v.as_ref() == DONE_MARKER)
            .unwrap_or(false))
    }

    /// Marks a message as fully processed. Idempotent.
    pub fn mark_done(&self, message_id: &str) -> Result<(), sled::Error> {
        self.processed.insert(message_id.as_bytes(), DONE_MARKER)?;
        Ok(())
    }

    /// Records a failure reason for a message, overwriting any prior reason.
    pub fn mark_failed(&self, message_id: &str, reason: &str) -> Result<(), sled::Error> {
        self.failed
            .insert(message_id.as_bytes(), reason.as_bytes())?;
        Ok(())
    }

    /// Aggregates stored failure reasons into reason -> occurrence count.
    pub fn list_failures(&self) -> Result<BTreeMap<String, u64>, sled::Error> {
        let mut summary = BTreeMap::new();
        for entry in self.failed.iter() {
            let (_, value) = entry?;
            let reason = String::from_utf8_lossy(&value).into_owned();
            *summary.entry(reason).or_insert(0) += 1;
        }
        Ok(summary)
    }

    /// Irreversibly deletes every entry in the named bucket.
    pub fn flush(&self, bucket: Bucket) -> Result<(), sled::Error> {
        match bucket {
            Bucket::Failures => self.failed.clear(),
            Bucket::HostCache => self.hosts.clear(),
        }
    }

    /// Cached reverse-DNS result for `ip`, if any.
    ///
    /// An empty string is a valid cached value meaning "no PTR record".
    pub fn cached_hosts(&self, ip: &str) -> Result<Option<String>, sled::Error> {
        Ok(self
            .hosts
            .get(ip.as_bytes())?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    /// Stores a reverse-DNS result for `ip`.
    pub fn cache_hosts(&self, ip: &str, hostnames: &str) -> Result<(), sled::Error> {
        self.hosts.insert(ip.as_bytes(), hostnames.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp_ledger() -> (TempDir, Ledger) {
        let dir = TempDir::new().expect("temp dir");
        let ledger = Ledger::open(&dir.path().join("ledger")).expect("open ledger");
        (dir, ledger)
    }

    #[test]
    fn test_unseen_message_is_not_processed() {
        let (_dir, ledger) = open_temp_ledger();
        assert!(!ledger.is_processed("msg-1").unwrap());
    }

    #[test]
    fn test_mark_done_is_idempotent() {
        let (_dir, ledger) = open_temp_ledger();
        ledger.mark_done("msg-1").unwrap();
        ledger.mark_done("msg-1").unwrap();
        assert!(ledger.is_processed("msg-1").unwrap());
    }

    #[test]
    fn test_mark_failed_overwrites_prior_reason() {
        let (_dir, ledger) = open_temp_ledger();
        ledger.mark_failed("msg-1", "first reason").unwrap();
        ledger.mark_failed("msg-1", "second reason").unwrap();

        let failures = ledger.list_failures().unwrap();
        assert_eq!(failures.get("second reason"), Some(&1));
        assert!(!failures.contains_key("first reason"));
    }

    #[test]
    fn test_list_failures_aggregates_by_reason() {
        let (_dir, ledger) = open_temp_ledger();
        ledger.mark_failed("a", "broken pct").unwrap();
        ledger.mark_failed("b", "broken pct").unwrap();
        ledger.mark_failed("c", "missing metadata").unwrap();

        let failures = ledger.list_failures().unwrap();
        assert_eq!(failures.get("broken pct"), Some(&2));
        assert_eq!(failures.get("missing metadata"), Some(&1));
    }

    #[test]
    fn test_flush_failures_leaves_processed_intact() {
        let (_dir, ledger) = open_temp_ledger();
        ledger.mark_done("msg-1").unwrap();
        ledger.mark_failed("msg-2", "broken").unwrap();

        ledger.flush(Bucket::Failures).unwrap();
        assert!(ledger.list_failures().unwrap().is_empty());
        assert!(ledger.is_processed("msg-1").unwrap());
    }

    #[test]
    fn test_host_cache_roundtrip_including_empty() {
        let (_dir, ledger) = open_temp_ledger();
        assert_eq!(ledger.cached_hosts("203.0.113.5").unwrap(), None);

        ledger
            .cache_hosts("203.0.113.5", "mail.acme.example.")
            .unwrap();
        assert_eq!(
            ledger.cached_hosts("203.0.113.5").unwrap().as_deref(),
            Some("mail.acme.example.")
        );

        // empty result ("no PTR record") is cached, not treated as a miss
        ledger.cache_hosts("198.51.100.9", "").unwrap();
        assert_eq!(
            ledger.cached_hosts("198.51.100.9").unwrap().as_deref(),
            Some("")
        );
    }

    #[test]
    fn test_flush_host_cache() {
        let (_dir, ledger) = open_temp_ledger();
        ledger.cache_hosts("203.0.113.5", "mail.acme.example.").unwrap();
        ledger.flush(Bucket::HostCache).unwrap();
        assert_eq!(ledger.cached_hosts("203.0.113.5").unwrap(), None);
    }
}
