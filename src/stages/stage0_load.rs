use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::models::{RejectReason, RejectedRecord, Segment, SegmentId, SegmentRecord, SegmentStore};

/// Configuration for Stage 0 loading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage0Config {
    /// Keep only segments strictly longer than this
    pub min_duration: Option<f64>,
    /// Keep only segments strictly shorter than this
    pub max_duration: Option<f64>,
    /// Payload column holding a vocalization class; when set, only rows whose
    /// value matches `lx_pattern` are kept
    pub lx_column: Option<String>,
    /// Pattern matched at the start of the `lx_column` value. Defaults to
    /// rejecting any value that contains `J` or `Y`.
    pub lx_pattern: Option<String>,
}

/// Default linguistic pattern: no crying (`Y`) or junk (`J`) classes
pub const DEFAULT_LX_PATTERN: &str = "[^JY]*$";

/// Compiled linguistic filter over one payload column
#[derive(Debug, Clone)]
struct LinguisticFilter {
    column: String,
    regex: Regex,
}

impl LinguisticFilter {
    fn from_config(config: &Stage0Config) -> Result<Option<Self>, ConfigError> {
        let Some(column) = &config.lx_column else {
            if config.lx_pattern.is_some() {
                return Err(ConfigError::InvalidLinguisticFilter(
                    "lx_pattern is set but lx_column is not".to_string(),
                ));
            }
            return Ok(None);
        };
        if column.trim().is_empty() {
            return Err(ConfigError::InvalidLinguisticFilter(
                "lx_column must not be empty".to_string(),
            ));
        }

        let pattern = config.lx_pattern.as_deref().unwrap_or(DEFAULT_LX_PATTERN);
        let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
            ConfigError::InvalidLinguisticFilter(format!("bad lx_pattern {:?}: {}", pattern, e))
        })?;

        Ok(Some(Self {
            column: column.clone(),
            regex,
        }))
    }

    /// Missing and null values are read as the empty string
    fn check(&self, record: &SegmentRecord) -> Result<(), RejectReason> {
        let value = match record.payload.get(&self.column) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        if self.regex.is_match(&value) {
            Ok(())
        } else {
            Err(RejectReason::NotLinguistic {
                column: self.column.clone(),
                value,
            })
        }
    }
}

impl Stage0Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, bound) in [("min_duration", self.min_duration), ("max_duration", self.max_duration)] {
            if let Some(value) = bound {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::InvalidDurationFilter(format!(
                        "{} must be a non-negative number, got {}",
                        name, value
                    )));
                }
            }
        }

        if self.max_duration == Some(0.0) {
            return Err(ConfigError::InvalidDurationFilter(
                "max_duration must be positive".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_duration, self.max_duration) {
            if min >= max {
                return Err(ConfigError::InvalidDurationFilter(format!(
                    "min_duration {} must be below max_duration {}",
                    min, max
                )));
            }
        }

        LinguisticFilter::from_config(self)?;
        Ok(())
    }
}

/// Result of Stage 0 loading
#[derive(Debug)]
pub struct Stage0Result {
    /// Loaded segments, sorted by (onset, id)
    pub store: SegmentStore,
    /// Rows that were excluded, in row order
    pub rejected: Vec<RejectedRecord>,
}

impl Stage0Result {
    pub fn malformed_count(&self) -> usize {
        self.rejected.iter().filter(|r| r.reason.is_malformed()).count()
    }

    pub fn filtered_count(&self) -> usize {
        self.rejected.len() - self.malformed_count()
    }
}

/// Execute Stage 0: build the segment store from input rows
///
/// Each row gets the id of its position in the input. Malformed rows
/// (missing speaker or timestamp, offset before onset) are excluded with a
/// warning; rows outside the duration or linguistic filter are excluded
/// silently. Neither stops the load.
pub fn execute_stage0(
    records: Vec<SegmentRecord>,
    config: &Stage0Config,
) -> Result<Stage0Result, ConfigError> {
    config.validate()?;
    let lx_filter = LinguisticFilter::from_config(config)?;

    let row_count = records.len();
    let mut segments = Vec::with_capacity(row_count);
    let mut rejected = Vec::new();

    for (row, record) in records.into_iter().enumerate() {
        match to_segment(row, &record, config, lx_filter.as_ref()) {
            Ok(segment) => segments.push(segment),
            Err(reason) => {
                if reason.is_malformed() {
                    warn!("Skipping row {}: {}", row, reason);
                } else {
                    debug!("Filtered row {}: {}", row, reason);
                }
                rejected.push(RejectedRecord {
                    row,
                    reason,
                    record,
                });
            }
        }
    }

    let store = SegmentStore::new(segments, row_count);
    info!(
        "Loaded {} segments from {} rows ({} speakers, {} rejected)",
        store.len(),
        row_count,
        store.speakers().len(),
        rejected.len()
    );

    Ok(Stage0Result { store, rejected })
}

fn to_segment(
    row: usize,
    record: &SegmentRecord,
    config: &Stage0Config,
    lx_filter: Option<&LinguisticFilter>,
) -> Result<Segment, RejectReason> {
    let speaker = match record.speaker.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Err(RejectReason::MissingSpeaker),
    };
    let onset = record.onset.ok_or(RejectReason::MissingOnset)?;
    let offset = record.offset.ok_or(RejectReason::MissingOffset)?;

    if !onset.is_finite() || !offset.is_finite() {
        return Err(RejectReason::NonFiniteTimestamp { onset, offset });
    }
    if offset < onset {
        return Err(RejectReason::NegativeDuration { onset, offset });
    }

    let duration = offset - onset;
    if let Some(min) = config.min_duration {
        if duration <= min {
            return Err(RejectReason::TooShort { duration, min });
        }
    }
    if let Some(max) = config.max_duration {
        if duration >= max {
            return Err(RejectReason::TooLong { duration, max });
        }
    }
    if let Some(filter) = lx_filter {
        filter.check(record)?;
    }

    Ok(Segment {
        id: SegmentId(row),
        speaker: speaker.to_string(),
        onset,
        offset,
        payload: record.payload.clone(),
        columns: record.columns.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_rows_are_skipped_not_fatal() {
        let records = vec![
            SegmentRecord::new("A", 0.0, 1.0),
            SegmentRecord::new("B", 2.0, 1.5),
            SegmentRecord {
                speaker: None,
                ..SegmentRecord::new("A", 3.0, 4.0)
            },
            SegmentRecord {
                offset: None,
                ..SegmentRecord::new("A", 3.0, 4.0)
            },
            SegmentRecord::new("B", 5.0, 6.0).with_field("transcription", "hi"),
        ];

        let result = execute_stage0(records, &Stage0Config::default()).unwrap();

        assert_eq!(result.store.len(), 2);
        assert_eq!(result.store.row_count(), 5);
        assert_eq!(result.malformed_count(), 3);
        assert_eq!(result.rejected[0].row, 1);
        assert!(matches!(result.rejected[0].reason, RejectReason::NegativeDuration { .. }));
        assert_eq!(result.rejected[1].reason, RejectReason::MissingSpeaker);
        assert_eq!(result.rejected[2].reason, RejectReason::MissingOffset);

        let last = result.store.get(1).unwrap();
        assert_eq!(last.id, SegmentId(4));
        assert_eq!(last.payload.get("transcription").and_then(|v| v.as_str()), Some("hi"));
    }

    #[test]
    fn test_duration_filter() {
        let records = vec![
            SegmentRecord::new("A", 0.0, 100.0),
            SegmentRecord::new("A", 200.0, 400.0),
            SegmentRecord::new("A", 500.0, 1_500.0),
        ];
        let config = Stage0Config {
            min_duration: Some(100.0),
            max_duration: Some(1_000.0),
            ..Stage0Config::default()
        };

        let result = execute_stage0(records, &config).unwrap();

        assert_eq!(result.store.len(), 1);
        assert_eq!(result.filtered_count(), 2);
        assert_eq!(result.malformed_count(), 0);
    }

    #[test]
    fn test_invalid_duration_filter() {
        let config = Stage0Config {
            min_duration: Some(500.0),
            max_duration: Some(100.0),
            ..Stage0Config::default()
        };
        assert!(matches!(
            execute_stage0(vec![], &config),
            Err(ConfigError::InvalidDurationFilter(_))
        ));
    }

    fn vocalizations() -> Vec<SegmentRecord> {
        vec![
            SegmentRecord::new("CHI", 0.0, 1.0).with_field("vcm_type", "C"),
            SegmentRecord::new("CHI", 2.0, 3.0).with_field("vcm_type", "Y"),
            SegmentRecord::new("CHI", 4.0, 5.0).with_field("vcm_type", "J"),
            SegmentRecord::new("CHI", 6.0, 7.0).with_field("vcm_type", "N"),
            SegmentRecord::new("FEM", 8.0, 9.0),
        ]
    }

    #[test]
    fn test_linguistic_filter_default_pattern() {
        let config = Stage0Config {
            lx_column: Some("vcm_type".to_string()),
            ..Stage0Config::default()
        };

        let result = execute_stage0(vocalizations(), &config).unwrap();

        let kept: Vec<usize> = result.store.iter().map(|s| s.id.0).collect();
        assert_eq!(kept, vec![0, 3, 4]);
        assert_eq!(result.filtered_count(), 2);
        assert_eq!(result.malformed_count(), 0);
        assert_eq!(
            result.rejected[0].reason,
            RejectReason::NotLinguistic {
                column: "vcm_type".to_string(),
                value: "Y".to_string(),
            }
        );
    }

    #[test]
    fn test_linguistic_filter_custom_pattern_matches_at_start() {
        let config = Stage0Config {
            lx_column: Some("vcm_type".to_string()),
            lx_pattern: Some("C|N".to_string()),
            ..Stage0Config::default()
        };

        let result = execute_stage0(vocalizations(), &config).unwrap();

        // the missing column reads as "", which does not start with C or N
        let kept: Vec<usize> = result.store.iter().map(|s| s.id.0).collect();
        assert_eq!(kept, vec![0, 3]);
    }

    #[test]
    fn test_invalid_linguistic_filter() {
        let orphan_pattern = Stage0Config {
            lx_pattern: Some("C".to_string()),
            ..Stage0Config::default()
        };
        let bad_regex = Stage0Config {
            lx_column: Some("vcm_type".to_string()),
            lx_pattern: Some("(C".to_string()),
            ..Stage0Config::default()
        };

        for config in [orphan_pattern, bad_regex] {
            assert!(matches!(
                execute_stage0(vec![], &config),
                Err(ConfigError::InvalidLinguisticFilter(_))
            ));
        }
    }
}
