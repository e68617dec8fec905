use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Stable segment identifier: the row position of the segment in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub usize);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Input column names the required fields were read from, so output rows can
/// be written back under the same names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceColumns {
    pub onset: String,
    pub offset: String,
    pub speaker: String,
}

impl Default for SourceColumns {
    fn default() -> Self {
        Self {
            onset: "onset".to_string(),
            offset: "offset".to_string(),
            speaker: "speaker".to_string(),
        }
    }
}

impl SourceColumns {
    /// Pick the column name used by a raw row, falling back to the
    /// canonical name when neither spelling is present
    pub fn detect(row: &Map<String, Value>) -> Self {
        let pick = |canonical: &str, alias: &str| {
            if !row.contains_key(canonical) && row.contains_key(alias) {
                alias.to_string()
            } else {
                canonical.to_string()
            }
        };
        Self {
            onset: pick("onset", "segment_onset"),
            offset: pick("offset", "segment_offset"),
            speaker: pick("speaker", "speaker_type"),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.onset == key || self.offset == key || self.speaker == key
    }
}

/// One input row as produced by an external tabular reader.
///
/// Required fields are optional here so that malformed rows can be reported
/// instead of failing the whole parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Start timestamp
    #[serde(default, alias = "segment_onset")]
    pub onset: Option<f64>,
    /// End timestamp
    #[serde(default, alias = "segment_offset")]
    pub offset: Option<f64>,
    /// Speaker label
    #[serde(default, alias = "speaker_type")]
    pub speaker: Option<String>,
    /// Every other column, carried through unchanged
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    /// Where `onset`, `offset` and `speaker` came from
    #[serde(skip)]
    pub columns: SourceColumns,
}

impl SegmentRecord {
    pub fn new(speaker: &str, onset: f64, offset: f64) -> Self {
        Self {
            onset: Some(onset),
            offset: Some(offset),
            speaker: Some(speaker.to_string()),
            payload: Map::new(),
            columns: SourceColumns::default(),
        }
    }

    /// Attach a passthrough column
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }
}

/// A time-stamped, speaker-labeled interval. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Stable identifier (input row position)
    pub id: SegmentId,
    /// Speaker label
    pub speaker: String,
    /// Start timestamp
    pub onset: f64,
    /// End timestamp, never before `onset`
    pub offset: f64,
    /// Source columns carried through unchanged
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub columns: SourceColumns,
}

impl Segment {
    pub fn new(id: usize, speaker: &str, onset: f64, offset: f64) -> Self {
        Self {
            id: SegmentId(id),
            speaker: speaker.to_string(),
            onset,
            offset,
            payload: Map::new(),
            columns: SourceColumns::default(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.offset - self.onset
    }

    /// Signed silence between the end of `self` and the start of `next`.
    /// Negative when `next` starts before `self` ends.
    pub fn gap_to(&self, next: &Segment) -> f64 {
        next.onset - self.offset
    }

    /// Length of the shared time span, zero when disjoint
    pub fn overlap_with(&self, other: &Segment) -> f64 {
        (self.offset.min(other.offset) - self.onset.max(other.onset)).max(0.0)
    }

    pub fn same_speaker(&self, other: &Segment) -> bool {
        self.speaker == other.speaker
    }
}

/// Why an input row did not make it into the segment store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("missing speaker")]
    MissingSpeaker,
    #[error("missing onset")]
    MissingOnset,
    #[error("missing offset")]
    MissingOffset,
    #[error("non-finite timestamp ({onset}, {offset})")]
    NonFiniteTimestamp { onset: f64, offset: f64 },
    #[error("offset {offset} precedes onset {onset}")]
    NegativeDuration { onset: f64, offset: f64 },
    #[error("duration {duration} not above minimum {min}")]
    TooShort { duration: f64, min: f64 },
    #[error("duration {duration} not below maximum {max}")]
    TooLong { duration: f64, max: f64 },
    #[error("{column} value {value:?} is not linguistic")]
    NotLinguistic { column: String, value: String },
}

impl RejectReason {
    /// Malformed rows are reported as warnings; filtered rows are expected
    pub fn is_malformed(&self) -> bool {
        !matches!(
            self,
            RejectReason::TooShort { .. }
                | RejectReason::TooLong { .. }
                | RejectReason::NotLinguistic { .. }
        )
    }
}

/// An input row excluded from the store, with the original record kept for output
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    /// Row position in the input
    pub row: usize,
    pub reason: RejectReason,
    pub record: SegmentRecord,
}

/// Ordered, read-only collection of loaded segments.
///
/// Segments are kept sorted by `(onset, id)`; a segment's position in that
/// order is its node index in the interaction graph.
#[derive(Debug, Clone, Default)]
pub struct SegmentStore {
    segments: Vec<Segment>,
    positions: HashMap<SegmentId, usize>,
    row_count: usize,
    max_duration: f64,
}

impl SegmentStore {
    /// Build a store from already-validated segments. `row_count` is the
    /// number of input rows, including any that were rejected.
    pub fn new(mut segments: Vec<Segment>, row_count: usize) -> Self {
        segments.sort_by(|a, b| a.onset.total_cmp(&b.onset).then(a.id.cmp(&b.id)));

        let positions = segments
            .iter()
            .enumerate()
            .map(|(pos, s)| (s.id, pos))
            .collect();
        let max_duration = segments
            .iter()
            .map(Segment::duration)
            .fold(0.0f64, f64::max);

        Self {
            row_count: row_count.max(segments.len()),
            segments,
            positions,
            max_duration,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment at a node position
    pub fn get(&self, position: usize) -> Option<&Segment> {
        self.segments.get(position)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Node position of a segment id
    pub fn position_of(&self, id: SegmentId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Number of input rows the store was loaded from
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Longest segment duration, used to bound the builder's lookahead
    pub fn max_duration(&self) -> f64 {
        self.max_duration
    }

    /// Sorted unique speaker labels
    pub fn speakers(&self) -> Vec<String> {
        let mut speakers: Vec<String> = self.segments.iter().map(|s| s.speaker.clone()).collect();
        speakers.sort();
        speakers.dedup();
        speakers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_orders_by_onset_then_id() {
        let store = SegmentStore::new(
            vec![
                Segment::new(0, "A", 2.0, 3.0),
                Segment::new(2, "B", 1.0, 1.5),
                Segment::new(1, "C", 1.0, 2.0),
            ],
            3,
        );

        let ids: Vec<usize> = store.iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        assert_eq!(store.position_of(SegmentId(0)), Some(2));
        assert_eq!(store.max_duration(), 1.0);
        assert_eq!(store.speakers(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_gap_and_overlap() {
        let a = Segment::new(0, "A", 0.0, 1000.0);
        let b = Segment::new(1, "B", 800.0, 1500.0);
        let c = Segment::new(2, "B", 1300.0, 1400.0);

        assert_eq!(a.gap_to(&b), -200.0);
        assert_eq!(a.overlap_with(&b), 200.0);
        assert_eq!(a.gap_to(&c), 300.0);
        assert_eq!(a.overlap_with(&c), 0.0);
        assert_eq!(b.overlap_with(&c), 100.0);
    }

    #[test]
    fn test_record_accepts_alias_column_names() {
        let json = r#"{"segment_onset": 10, "segment_offset": 20, "speaker_type": "CHI", "vcm_type": "C"}"#;
        let record: SegmentRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.onset, Some(10.0));
        assert_eq!(record.offset, Some(20.0));
        assert_eq!(record.speaker.as_deref(), Some("CHI"));
        assert_eq!(record.payload.get("vcm_type"), Some(&Value::from("C")));
    }

    #[test]
    fn test_source_columns_follow_the_row() {
        let row: Map<String, Value> = serde_json::from_str(
            r#"{"segment_onset": 10, "offset": 20, "speaker_type": "CHI"}"#,
        )
        .unwrap();
        let columns = SourceColumns::detect(&row);

        assert_eq!(columns.onset, "segment_onset");
        assert_eq!(columns.offset, "offset");
        assert_eq!(columns.speaker, "speaker_type");
        assert!(columns.contains("speaker_type"));
        assert!(!columns.contains("speaker"));
    }
}
