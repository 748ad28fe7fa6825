// storage/models.rs
// Database row model for the records table

use crate::enrich::Enrichment;
use crate::report::{Metadata, Policy, Record};

/// Column list of the `records` table, in insert order.
pub const COLUMNS: [&str; 26] = [
    "org_name",
    "email",
    "contact_info",
    "date_range_begin",
    "date_range_end",
    "domain",
    "adkim",
    "aspf",
    "p",
    "pct",
    "location",
    "source_ip",
    "count",
    "disposition",
    "dkim",
    "spf",
    "reason_type",
    "comment",
    "envelope_to",
    "header_from",
    "dkim_domain",
    "dkim_result",
    "dkim_hresult",
    "spf_domain",
    "spf_result",
    "hostname",
];

/// One fully-enriched row bound for the `records` table.
///
/// A [`Record`] joined with the report-level metadata/policy fields and the
/// per-IP enrichment outputs. Rows are built independently per record and
/// carry no ordering dependency.
#[derive(Debug, Clone)]
pub struct EnrichedRow {
    pub org_name: String,
    pub email: String,
    pub contact_info: String,
    pub date_range_begin: i64,
    pub date_range_end: i64,
    pub domain: String,
    pub adkim: String,
    pub aspf: String,
    pub p: String,
    pub pct: i64,
    pub location: String,
    pub source_ip: String,
    pub count: i64,
    pub disposition: String,
    pub dkim: String,
    pub spf: String,
    pub reason_type: String,
    pub comment: String,
    pub envelope_to: String,
    pub header_from: String,
    pub dkim_domain: String,
    pub dkim_result: String,
    pub dkim_hresult: String,
    pub spf_domain: String,
    pub spf_result: String,
    pub hostname: String,
}

impl EnrichedRow {
    /// Joins one record with its report's metadata/policy and its enrichment.
    pub fn build(
        metadata: &Metadata,
        policy: &Policy,
        record: Record,
        enrichment: Enrichment,
    ) -> Self {
        EnrichedRow {
            org_name: metadata.org_name.clone(),
            email: metadata.email.clone(),
            contact_info: enrichment.contact,
            date_range_begin: metadata.date_range_begin,
            date_range_end: metadata.date_range_end,
            domain: policy.domain.clone(),
            adkim: policy.adkim.clone(),
            aspf: policy.aspf.clone(),
            p: policy.p.clone(),
            pct: policy.pct,
            location: enrichment.location,
            source_ip: record.source_ip,
            count: record.count,
            disposition: record.disposition,
            dkim: record.dkim,
            spf: record.spf,
            reason_type: record.reason_type,
            comment: record.reason_comment,
            envelope_to: record.envelope_to,
            header_from: record.header_from,
            dkim_domain: record.dkim_domain,
            dkim_result: record.dkim_result,
            dkim_hresult: record.dkim_hresult,
            spf_domain: record.spf_domain,
            spf_result: record.spf_result,
            hostname: enrichment.hostname,
        }
    }
}
