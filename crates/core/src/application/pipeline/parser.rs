// Record Parser & Deduplicator

use crate::domain::{RowAudit, RowOutcome, ShipmentRecord};
use crate::error::Result;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashSet;
use tracing::debug;

/// Minimum fields per row: origin ZIP, destination ZIP, delivery id
pub const MIN_FIELDS: usize = 3;

/// Parser output: unique records in first-occurrence order, plus audit
/// entries for the rows that were dropped.
#[derive(Debug, Default)]
pub struct ParsedInput {
    pub records: Vec<ShipmentRecord>,
    pub dropped: Vec<RowAudit>,
}

/// Parse comma-separated shipment rows.
///
/// Rows with fewer than [`MIN_FIELDS`] fields and rows repeating an earlier
/// (origin, destination, delivery id) are dropped without error.
pub fn parse_records(raw_text: &str) -> Result<ParsedInput> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::None)
        .from_reader(raw_text.as_bytes());

    let mut parsed = ParsedInput::default();
    let mut seen = HashSet::new();

    for (index, row) in reader.records().enumerate() {
        let row = row?;
        let line = row
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 1);

        if row.len() < MIN_FIELDS {
            debug!(line, fields = row.len(), "Skipping malformed row");
            parsed.dropped.push(RowAudit {
                line,
                delivery_id: None,
                outcome: RowOutcome::Malformed,
            });
            continue;
        }

        let record = to_record(line, &row);
        if !seen.insert(record.dedup_key()) {
            debug!(line, delivery_id = %record.delivery_id, "Skipping duplicate row");
            parsed.dropped.push(RowAudit {
                line,
                delivery_id: Some(record.delivery_id),
                outcome: RowOutcome::Duplicate,
            });
            continue;
        }

        parsed.records.push(record);
    }

    Ok(parsed)
}

fn to_record(line: usize, row: &StringRecord) -> ShipmentRecord {
    let field = |i: usize| row.get(i).unwrap_or_default().trim().to_string();
    let hint = |i: usize| {
        row.get(i)
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    };

    ShipmentRecord {
        line,
        origin_zip: field(0),
        dest_zip: field(1),
        delivery_id: field(2),
        origin_country_hint: hint(3),
        dest_country_hint: hint(4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_fields_and_hints() {
        let parsed = parse_records(" 95358 , 25315, 3691001 , US ,Mx\n").unwrap();

        assert_eq!(parsed.records.len(), 1);
        let record = &parsed.records[0];
        assert_eq!(record.origin_zip, "95358");
        assert_eq!(record.dest_zip, "25315");
        assert_eq!(record.delivery_id, "3691001");
        assert_eq!(record.origin_country_hint.as_deref(), Some("us"));
        assert_eq!(record.dest_country_hint.as_deref(), Some("mx"));
        assert_eq!(record.line, 1);
    }

    #[test]
    fn test_short_rows_are_dropped() {
        let parsed = parse_records("95358,25315\n95358,25315,3691001\n").unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].line, 2);
        assert_eq!(parsed.dropped.len(), 1);
        assert_eq!(parsed.dropped[0].outcome, RowOutcome::Malformed);
        assert_eq!(parsed.dropped[0].line, 1);
    }

    #[test]
    fn test_duplicates_keep_first_regardless_of_hints() {
        let input = "95358,25315,3691001,us,mx\n\"95358\", 25315 ,3691001,,\n";
        let parsed = parse_records(input).unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].origin_country_hint.as_deref(), Some("us"));
        assert_eq!(parsed.dropped[0].outcome, RowOutcome::Duplicate);
        assert_eq!(parsed.dropped[0].line, 2);
    }

    #[test]
    fn test_same_zips_different_delivery_ids_are_distinct() {
        let parsed = parse_records("95358,25315,3691001\n95358,25315,3691002\n").unwrap();
        assert_eq!(parsed.records.len(), 2);
    }

    #[test]
    fn test_order_preserved() {
        let parsed = parse_records("1,2,37\n3,4,368\n1,2,37\n5,6,369\n").unwrap();
        let ids: Vec<_> = parsed
            .records
            .iter()
            .map(|r| r.delivery_id.as_str())
            .collect();
        assert_eq!(ids, vec!["37", "368", "369"]);
    }

    #[test]
    fn test_empty_hints_are_none() {
        let parsed = parse_records("95358,25315,3691001, ,\n").unwrap();
        assert!(parsed.records[0].origin_country_hint.is_none());
        assert!(parsed.records[0].dest_country_hint.is_none());
    }

    #[test]
    fn test_quoted_field_with_comma() {
        let parsed = parse_records("\"N3S 7P8\",95358,\"34,1\"\n").unwrap();
        assert_eq!(parsed.records[0].delivery_id, "34,1");
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse_records("").unwrap();
        assert!(parsed.records.is_empty());
        assert!(parsed.dropped.is_empty());
    }
}
