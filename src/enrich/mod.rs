//! Per-record enrichment: reverse DNS, geography and abuse contact.
//!
//! Enrichment never fails a record. A lookup miss (no PTR record, IP not in
//! the GeoIP database) degrades to an empty value, so a report full of
//! unknown IPs still loads cleanly.

mod geoip;

pub use geoip::{GeoIp, GeoLookup};

use std::sync::Arc;

use hickory_resolver::TokioAsyncResolver;

use crate::config::NULL_SENTINEL;
use crate::error_handling::{ErrorType, ProcessingStats};
use crate::ledger::Ledger;

/// Enrichment outputs for one record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Enrichment {
    /// Comma-joined PTR names, empty when the IP has none
    pub hostname: String,
    /// Region/country string, empty on GeoIP miss
    pub location: String,
    /// ASN organization concatenated with the report's extra contact info
    pub contact: String,
}

/// Shared enrichment service.
///
/// Owns the resolver and GeoIP readers; consults the ledger's host-cache
/// bucket before hitting DNS when caching is enabled. Cheap to share across
/// the bulk loader's worker pool via `Arc`.
pub struct Enricher {
    resolver: Arc<TokioAsyncResolver>,
    ledger: Arc<Ledger>,
    geoip: Option<GeoIp>,
    cache_hosts: bool,
    stats: Arc<ProcessingStats>,
}

impl Enricher {
    pub fn new(
        resolver: Arc<TokioAsyncResolver>,
        ledger: Arc<Ledger>,
        geoip: Option<GeoIp>,
        cache_hosts: bool,
        stats: Arc<ProcessingStats>,
    ) -> Self {
        Enricher {
            resolver,
            ledger,
            geoip,
            cache_hosts,
            stats,
        }
    }

    /// Enriches one source IP.
    ///
    /// `extra_contact` is the report's `extra_contact_info`; the sentinel
    /// value is treated as absent and contributes nothing to the contact
    /// string.
    pub async fn enrich(&self, source_ip: &str, extra_contact: &str) -> Enrichment {
        let hostname = self.lookup_host(source_ip).await;

        let geo = self.geoip.as_ref().and_then(|g| g.lookup(source_ip));
        if geo.is_none() {
            self.stats.increment(ErrorType::GeoLookupMiss);
        }
        let geo = geo.unwrap_or_default();

        let mut contact = geo.asn_org.unwrap_or_default();
        if extra_contact != NULL_SENTINEL {
            contact.push_str(extra_contact);
        }

        Enrichment {
            hostname,
            location: geo.location,
            contact,
        }
    }

    /// Resolves an IP to its PTR names, comma-joined.
    ///
    /// Consults the host-cache bucket first when caching is enabled; empty
    /// results are cached too so an IP without a PTR record is resolved at
    /// most once. Concurrent callers for the same uncached IP may race and
    /// both resolve, which is tolerated: they store the same value.
    async fn lookup_host(&self, ip: &str) -> String {
        if !self.cache_hosts {
            return self.reverse_lookup(ip).await;
        }

        match self.ledger.cached_hosts(ip) {
            Ok(Some(cached)) => return cached,
            Ok(None) => {}
            Err(e) => log::warn!("Host cache read failed for {ip}: {e}"),
        }

        let resolved = self.reverse_lookup(ip).await;
        if let Err(e) = self.ledger.cache_hosts(ip, &resolved) {
            log::warn!("Host cache write failed for {ip}: {e}");
        }
        resolved
    }

    async fn reverse_lookup(&self, ip: &str) -> String {
        let addr: std::net::IpAddr = match ip.parse() {
            Ok(addr) => addr,
            Err(_) => {
                self.stats.increment(ErrorType::ReverseDnsMiss);
                return String::new();
            }
        };

        match self.resolver.reverse_lookup(addr).await {
            Ok(response) => response
                .iter()
                .map(|name| name.to_utf8())
                .collect::<Vec<_>>()
                .join(","),
            Err(e) => {
                log::debug!("Reverse DNS lookup failed for {ip}: {e}");
                self.stats.increment(ErrorType::ReverseDnsMiss);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::init_resolver;
    use tempfile::TempDir;

    fn test_enricher(cache_hosts: bool) -> (TempDir, Enricher) {
        let dir = TempDir::new().unwrap();
        let ledger = Arc::new(Ledger::open(&dir.path().join("ledger")).unwrap());
        let resolver = init_resolver(None).unwrap();
        let enricher = Enricher::new(
            resolver,
            ledger,
            None,
            cache_hosts,
            Arc::new(ProcessingStats::new()),
        );
        (dir, enricher)
    }

    #[tokio::test]
    async fn test_enrich_degrades_to_empty_values() {
        // Unparsable IP: no DNS, no GeoIP reader configured. Everything
        // degrades without an error.
        let (_dir, enricher) = test_enricher(false);
        let enrichment = enricher.enrich("not-an-ip", NULL_SENTINEL).await;
        assert_eq!(enrichment.hostname, "");
        assert_eq!(enrichment.location, "");
        assert_eq!(enrichment.contact, "");
    }

    #[tokio::test]
    async fn test_extra_contact_appended_unless_sentinel() {
        let (_dir, enricher) = test_enricher(false);
        let enrichment = enricher.enrich("not-an-ip", "abuse@acme.example").await;
        assert_eq!(enrichment.contact, "abuse@acme.example");

        let enrichment = enricher.enrich("not-an-ip", NULL_SENTINEL).await;
        assert_eq!(enrichment.contact, "");
    }

    #[tokio::test]
    async fn test_cached_host_short_circuits_resolution() {
        let (_dir, enricher) = test_enricher(true);
        enricher
            .ledger
            .cache_hosts("203.0.113.5", "mail.acme.example.")
            .unwrap();
        let enrichment = enricher.enrich("203.0.113.5", NULL_SENTINEL).await;
        assert_eq!(enrichment.hostname, "mail.acme.example.");
    }
}
