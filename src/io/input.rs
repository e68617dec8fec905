use anyhow::{Context, Result};
use serde_json::Value;

use crate::models::{SegmentRecord, SourceColumns};

/// Parse a JSON array of segment rows
///
/// Every element must be an object; missing or null `onset`, `offset` and
/// `speaker` fields are accepted here and reported later by the loader.
/// The column names each row used are kept for output.
pub fn parse_segment_json(json: &str) -> Result<Vec<SegmentRecord>> {
    let rows: Vec<Value> = serde_json::from_str(json).context("Failed to parse segment JSON array")?;

    rows.into_iter()
        .enumerate()
        .map(|(row, value)| {
            let columns = value.as_object().map(SourceColumns::detect).unwrap_or_default();
            let mut record: SegmentRecord =
                serde_json::from_value(value).with_context(|| format!("Invalid segment row {}", row))?;
            record.columns = columns;
            Ok(record)
        })
        .collect()
}
