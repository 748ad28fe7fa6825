//! DMARC aggregate report parsing.
//!
//! Parses the feedback XML schema receivers mail out into a canonical
//! [`Report`]. The parse is strict about the small set of required nodes
//! (`report_metadata`, `policy_published`, the date range and `pct`) and
//! lenient everywhere else: any missing per-record field resolves to the
//! [`NULL_SENTINEL`] instead of rejecting the report.

use roxmltree::{Document, Node};

use crate::config::NULL_SENTINEL;
use crate::error_handling::PipelineError;

/// Report-level metadata from `feedback/report_metadata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub org_name: String,
    pub email: String,
    pub extra_contact_info: String,
    pub report_id: String,
    pub date_range_begin: i64,
    pub date_range_end: i64,
}

/// Published policy from `feedback/policy_published`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub domain: String,
    pub adkim: String,
    pub aspf: String,
    pub p: String,
    pub pct: i64,
}

/// One `feedback/record` element.
///
/// Every string field defaults to the `"NULL"` sentinel when the source XML
/// omits it; a missing optional field is not a structural error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub source_ip: String,
    pub count: i64,
    pub disposition: String,
    pub dkim: String,
    pub spf: String,
    pub reason_type: String,
    pub reason_comment: String,
    pub envelope_to: String,
    pub header_from: String,
    pub dkim_domain: String,
    pub dkim_result: String,
    pub dkim_hresult: String,
    pub spf_domain: String,
    pub spf_result: String,
}

/// A parsed DMARC aggregate report.
///
/// Immutable once parsed; owned by the pipeline run that produced it and
/// discarded after the bulk load commits or aborts. Record order matches
/// document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub metadata: Metadata,
    pub policy: Policy,
    pub records: Vec<Record>,
}

/// Parses a DMARC aggregate report document.
///
/// Fails with [`PipelineError::StructuralParse`] naming the offending path
/// when a required node is missing or a required numeric field does not
/// parse; the report is rejected whole (no partial construction).
pub fn parse(xml: &str) -> Result<Report, PipelineError> {
    let doc = Document::parse(xml)?;
    let root = doc.root();

    let meta = require(root, "feedback/report_metadata")?;
    let policy = require(root, "feedback/policy_published")?;

    let date_begin = required_i64(meta, "date_range/begin")?;
    let date_end = required_i64(meta, "date_range/end")?;
    if date_end < date_begin {
        return Err(PipelineError::StructuralParse(
            "report_metadata/date_range (end >= begin)".into(),
        ));
    }

    let pct = required_i64(policy, "pct")?;
    if !(0..=100).contains(&pct) {
        return Err(PipelineError::StructuralParse(
            "policy_published/pct (0..=100)".into(),
        ));
    }

    let records = root
        .descendants()
        .filter(|n| n.has_tag_name("record") && parent_is(n, "feedback"))
        .map(parse_record)
        .collect();

    Ok(Report {
        metadata: Metadata {
            org_name: text_or_null(meta, "org_name"),
            email: text_or_null(meta, "email"),
            extra_contact_info: text_or_null(meta, "extra_contact_info"),
            report_id: text_or_null(meta, "report_id"),
            date_range_begin: date_begin,
            date_range_end: date_end,
        },
        policy: Policy {
            domain: text_or_null(policy, "domain"),
            adkim: text_or_null(policy, "adkim"),
            aspf: text_or_null(policy, "aspf"),
            p: text_or_null(policy, "p"),
            pct,
        },
        records,
    })
}

fn parse_record(node: Node) -> Record {
    Record {
        source_ip: text_or_null(node, "row/source_ip"),
        // count is tolerated when unparsable, matching the leniency of all
        // other per-record fields; it is clamped non-negative
        count: find(node, "row/count")
            .and_then(|n| n.text())
            .and_then(|t| t.trim().parse::<i64>().ok())
            .unwrap_or(0)
            .max(0),
        disposition: text_or_null(node, "row/policy_evaluated/disposition"),
        dkim: text_or_null(node, "row/policy_evaluated/dkim"),
        spf: text_or_null(node, "row/policy_evaluated/spf"),
        reason_type: text_or_null(node, "row/policy_evaluated/reason/type"),
        reason_comment: text_or_null(node, "row/policy_evaluated/reason/comment"),
        envelope_to: text_or_null(node, "identifiers/envelope_to"),
        header_from: text_or_null(node, "identifiers/header_from"),
        dkim_domain: text_or_null(node, "auth_results/dkim/domain"),
        dkim_result: text_or_null(node, "auth_results/dkim/result"),
        dkim_hresult: text_or_null(node, "auth_results/dkim/human_result"),
        spf_domain: text_or_null(node, "auth_results/spf/domain"),
        spf_result: text_or_null(node, "auth_results/spf/result"),
    }
}

fn parent_is(node: &Node, name: &str) -> bool {
    node.parent_element()
        .map(|p| p.has_tag_name(name))
        .unwrap_or(false)
}

/// Walks a `/`-separated element path, taking the first matching child at
/// each step.
fn find<'a, 'input>(node: Node<'a, 'input>, path: &str) -> Option<Node<'a, 'input>> {
    let mut current = node;
    for segment in path.split('/') {
        current = current
            .children()
            .find(|c| c.is_element() && c.has_tag_name(segment))?;
    }
    Some(current)
}

fn require<'a, 'input>(
    node: Node<'a, 'input>,
    path: &str,
) -> Result<Node<'a, 'input>, PipelineError> {
    find(node, path).ok_or_else(|| PipelineError::StructuralParse(path.to_string()))
}

fn required_i64(node: Node, path: &str) -> Result<i64, PipelineError> {
    let elem = require(node, path)?;
    elem.text()
        .map(str::trim)
        .and_then(|t| t.parse::<i64>().ok())
        .ok_or_else(|| PipelineError::StructuralParse(path.to_string()))
}

/// Trimmed text content at `path`, or the `"NULL"` sentinel when absent.
fn text_or_null(node: Node, path: &str) -> String {
    find(node, path)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .unwrap_or_else(|| NULL_SENTINEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"<?xml version="1.0"?>
<feedback>
  <report_metadata>
    <org_name>acme</org_name>
    <email>noreply@acme.example</email>
    <report_id>42</report_id>
    <date_range><begin>1700000000</begin><end>1700086400</end></date_range>
  </report_metadata>
  <policy_published>
    <domain>acme.example</domain>
    <adkim>r</adkim>
    <aspf>r</aspf>
    <p>none</p>
    <pct>100</pct>
  </policy_published>
  <record>
    <row>
      <source_ip>203.0.113.5</source_ip>
      <count>3</count>
      <policy_evaluated><disposition>none</disposition></policy_evaluated>
    </row>
    <identifiers><header_from>acme.example</header_from></identifiers>
  </record>
</feedback>"#;

    #[test]
    fn test_parse_minimal_report() {
        let report = parse(MINIMAL).expect("minimal report should parse");
        assert_eq!(report.metadata.org_name, "acme");
        assert_eq!(report.metadata.date_range_begin, 1_700_000_000);
        assert_eq!(report.metadata.date_range_end, 1_700_086_400);
        assert_eq!(report.policy.pct, 100);
        assert_eq!(report.records.len(), 1);

        let record = &report.records[0];
        assert_eq!(record.source_ip, "203.0.113.5");
        assert_eq!(record.count, 3);
        assert_eq!(record.disposition, "none");
        assert_eq!(record.header_from, "acme.example");
    }

    #[test]
    fn test_missing_optional_fields_map_to_sentinel() {
        let report = parse(MINIMAL).unwrap();
        let record = &report.records[0];
        assert_eq!(record.envelope_to, NULL_SENTINEL);
        assert_eq!(record.dkim_domain, NULL_SENTINEL);
        assert_eq!(record.spf_result, NULL_SENTINEL);
        assert_eq!(record.reason_comment, NULL_SENTINEL);
        assert_eq!(report.metadata.extra_contact_info, NULL_SENTINEL);
    }

    #[test]
    fn test_records_preserve_document_order() {
        let xml = MINIMAL.replace(
            "</feedback>",
            r#"<record><row><source_ip>198.51.100.7</source_ip><count>1</count></row></record>
               <record><row><source_ip>198.51.100.8</source_ip><count>2</count></row></record>
               </feedback>"#,
        );
        let report = parse(&xml).unwrap();
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.records[0].source_ip, "203.0.113.5");
        assert_eq!(report.records[1].source_ip, "198.51.100.7");
        assert_eq!(report.records[2].source_ip, "198.51.100.8");
    }

    #[test]
    fn test_missing_pct_is_structural() {
        let xml = MINIMAL.replace("<pct>100</pct>", "");
        let err = parse(&xml).unwrap_err();
        match err {
            PipelineError::StructuralParse(path) => assert_eq!(path, "pct"),
            other => panic!("expected structural error, got {other}"),
        }
    }

    #[test]
    fn test_missing_date_range_child_is_structural() {
        let xml = MINIMAL.replace("<end>1700086400</end>", "");
        let err = parse(&xml).unwrap_err();
        match err {
            PipelineError::StructuralParse(path) => assert_eq!(path, "date_range/end"),
            other => panic!("expected structural error, got {other}"),
        }
    }

    #[test]
    fn test_missing_report_metadata_is_structural() {
        let xml = r#"<feedback><policy_published><pct>100</pct></policy_published></feedback>"#;
        let err = parse(xml).unwrap_err();
        match err {
            PipelineError::StructuralParse(path) => {
                assert_eq!(path, "feedback/report_metadata")
            }
            other => panic!("expected structural error, got {other}"),
        }
    }

    #[test]
    fn test_unparsable_required_int_is_structural() {
        let xml = MINIMAL.replace("<pct>100</pct>", "<pct>lots</pct>");
        assert!(matches!(
            parse(&xml),
            Err(PipelineError::StructuralParse(_))
        ));
    }

    #[test]
    fn test_pct_out_of_range_rejected() {
        let xml = MINIMAL.replace("<pct>100</pct>", "<pct>250</pct>");
        assert!(matches!(
            parse(&xml),
            Err(PipelineError::StructuralParse(_))
        ));
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let xml = MINIMAL.replace("<end>1700086400</end>", "<end>1600000000</end>");
        assert!(matches!(
            parse(&xml),
            Err(PipelineError::StructuralParse(_))
        ));
    }

    #[test]
    fn test_whitespace_trimmed() {
        let xml = MINIMAL.replace("<org_name>acme</org_name>", "<org_name>  acme \n</org_name>");
        let report = parse(&xml).unwrap();
        assert_eq!(report.metadata.org_name, "acme");
    }

    #[test]
    fn test_unparsable_count_defaults_to_zero() {
        let xml = MINIMAL.replace("<count>3</count>", "<count>many</count>");
        let report = parse(&xml).unwrap();
        assert_eq!(report.records[0].count, 0);
    }

    #[test]
    fn test_malformed_xml_rejected() {
        assert!(parse("<feedback><unclosed>").is_err());
    }
}
