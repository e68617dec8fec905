use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{
    BestPath, EdgeKind, InteractionGraph, InteractionalSequence, RejectedRecord, SegmentId,
    SequencePartition, SourceColumns,
};

/// Keys written by the annotator. Input columns with these names are dropped
/// from the output row.
pub const ANNOTATION_FIELDS: [&str; 11] = [
    "index",
    "inter_seq_index",
    "conv_turn_index",
    "inter_seq",
    "is_start_unit",
    "is_end_unit",
    "on_best_path",
    "is_prompt_to",
    "is_response_to",
    "is_self_prompt_to",
    "is_self_response_to",
];

/// One input row with its sequence annotations.
///
/// Rows that did not load, or whose sequence is not reported, keep their
/// original fields and carry no sequence labels. Input columns are written
/// back under the names they were read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedRow {
    /// Input row position
    pub index: usize,
    /// 1-based label of the reported sequence
    pub inter_seq_index: Option<usize>,
    /// 1-based turn index within the sequence
    pub conv_turn_index: Option<usize>,
    /// `"(index) sequence-turn"`
    pub inter_seq: Option<String>,
    pub is_start_unit: Option<bool>,
    pub is_end_unit: Option<bool>,
    pub on_best_path: bool,
    /// Rows this row prompts across a speaker change
    pub is_prompt_to: Vec<usize>,
    /// Rows this row responds to across a speaker change
    pub is_response_to: Vec<usize>,
    /// Rows this row continues into (same speaker)
    pub is_self_prompt_to: Vec<usize>,
    /// Rows this row continues from (same speaker)
    pub is_self_response_to: Vec<usize>,
    /// Input columns, including speaker and timestamps
    #[serde(flatten)]
    pub columns: Map<String, Value>,
}

impl AnnotatedRow {
    fn unlabeled(index: usize, columns: Map<String, Value>) -> Self {
        Self {
            index,
            inter_seq_index: None,
            conv_turn_index: None,
            inter_seq: None,
            is_start_unit: None,
            is_end_unit: None,
            on_best_path: false,
            is_prompt_to: Vec::new(),
            is_response_to: Vec::new(),
            is_self_prompt_to: Vec::new(),
            is_self_response_to: Vec::new(),
            columns,
        }
    }
}

/// Rebuild a row's input columns: the payload minus annotation keys, plus the
/// required fields under their source names
fn input_columns(
    index: usize,
    names: &SourceColumns,
    speaker: Option<&str>,
    onset: Option<f64>,
    offset: Option<f64>,
    payload: &Map<String, Value>,
) -> Map<String, Value> {
    let mut columns = Map::new();
    for (key, value) in payload {
        if ANNOTATION_FIELDS.contains(&key.as_str()) {
            debug!("Row {}: input column '{}' is overwritten by the annotation", index, key);
            continue;
        }
        columns.insert(key.clone(), value.clone());
    }
    if let Some(speaker) = speaker {
        columns.insert(names.speaker.clone(), Value::from(speaker));
    }
    if let Some(onset) = onset {
        columns.insert(names.onset.clone(), Value::from(onset));
    }
    if let Some(offset) = offset {
        columns.insert(names.offset.clone(), Value::from(offset));
    }
    columns
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationMetadata {
    pub total_rows: usize,
    pub loaded_segments: usize,
    pub rejected_rows: usize,
    pub edges: usize,
    pub sequences: usize,
    pub reported_sequences: usize,
    pub best_paths: usize,
}

/// Per-row output for an external table writer
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedTranscript {
    /// One entry per input row, in row order
    pub rows: Vec<AnnotatedRow>,
    pub metadata: AnnotationMetadata,
}

impl AnnotatedTranscript {
    /// Annotate every input row
    ///
    /// Prompt/response links follow the best-path edges of a sequence when
    /// one was selected, and all of the sequence's edges otherwise.
    pub fn build(
        graph: &InteractionGraph,
        partition: &SequencePartition,
        best_paths: &[BestPath],
        rejected: &[RejectedRecord],
    ) -> Self {
        let store = graph.store();
        let total_rows = store.row_count().max(rejected.iter().map(|r| r.row + 1).max().unwrap_or(0));
        let mut rows: Vec<Option<AnnotatedRow>> = vec![None; total_rows];

        for segment in store.iter() {
            let columns = input_columns(
                segment.id.0,
                &segment.columns,
                Some(&segment.speaker),
                Some(segment.onset),
                Some(segment.offset),
                &segment.payload,
            );
            let row = AnnotatedRow::unlabeled(segment.id.0, columns);
            if let Some(slot) = rows.get_mut(segment.id.0) {
                *slot = Some(row);
            }
        }
        for rejected in rejected {
            let record = &rejected.record;
            let columns = input_columns(
                rejected.row,
                &record.columns,
                record.speaker.as_deref(),
                record.onset,
                record.offset,
                &record.payload,
            );
            let row = AnnotatedRow::unlabeled(rejected.row, columns);
            if let Some(slot) = rows.get_mut(rejected.row) {
                *slot = Some(row);
            }
        }

        let mut best_by_sequence: Vec<Option<&BestPath>> = vec![None; partition.len()];
        for best in best_paths {
            if let Some(slot) = best_by_sequence.get_mut(best.sequence) {
                *slot = Some(best);
            }
        }

        for sequence in partition.reported() {
            let best = best_by_sequence.get(sequence.index).copied().flatten();
            annotate_sequence(graph, partition, sequence, best, &mut rows);
        }

        let rows: Vec<AnnotatedRow> = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                row.unwrap_or_else(|| AnnotatedRow::unlabeled(index, Map::new()))
            })
            .collect();

        let metadata = AnnotationMetadata {
            total_rows,
            loaded_segments: store.len(),
            rejected_rows: rejected.len(),
            edges: graph.edge_count(),
            sequences: partition.len(),
            reported_sequences: partition.reported().count(),
            best_paths: best_paths.len(),
        };

        Self { rows, metadata }
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize annotated transcript")
    }

    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

fn annotate_sequence(
    graph: &InteractionGraph,
    partition: &SequencePartition,
    sequence: &InteractionalSequence,
    best: Option<&BestPath>,
    rows: &mut [Option<AnnotatedRow>],
) {
    let Some(label) = sequence.label else {
        return;
    };

    for &node in &sequence.nodes {
        let Some(segment) = graph.segment(node) else {
            continue;
        };
        let Some(row) = rows.get_mut(segment.id.0).and_then(Option::as_mut) else {
            continue;
        };
        let turn = partition.turn_of(node).map(|t| t.index + 1);

        row.inter_seq_index = Some(label);
        row.conv_turn_index = turn;
        row.inter_seq = turn.map(|t| format!("({}) {}-{}", segment.id, label, t));
        row.is_start_unit = Some(sequence.is_start(node));
        row.is_end_unit = Some(sequence.is_end(node));
        row.on_best_path = best.is_some_and(|b| b.contains_node(node));
    }

    let links = match best {
        Some(best) => best.edges(),
        None => sequence.edges.clone(),
    };
    for edge in &links {
        let (Some(from), Some(to)) = (graph.segment(edge.from), graph.segment(edge.to)) else {
            continue;
        };
        let continuation = graph.edge_kind(edge) == EdgeKind::Continuation;

        if let Some(row) = rows.get_mut(from.id.0).and_then(Option::as_mut) {
            if continuation {
                row.is_self_prompt_to.push(to.id.0);
            } else {
                row.is_prompt_to.push(to.id.0);
            }
        }
        if let Some(row) = rows.get_mut(to.id.0).and_then(Option::as_mut) {
            if continuation {
                row.is_self_response_to.push(from.id.0);
            } else {
                row.is_response_to.push(from.id.0);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeExport {
    /// Node position in onset order
    pub index: usize,
    pub id: SegmentId,
    pub speaker: String,
    pub onset: f64,
    pub offset: f64,
    pub sequence: usize,
    /// Output label of the sequence, if reported
    pub label: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeExport {
    pub from: SegmentId,
    pub to: SegmentId,
    pub kind: EdgeKind,
    pub on_best_path: bool,
}

/// Graph snapshot for an external renderer, with best-path edges flagged
#[derive(Debug, Clone, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
}

impl GraphExport {
    pub fn build(graph: &InteractionGraph, partition: &SequencePartition, best_paths: &[BestPath]) -> Self {
        let nodes = graph
            .store()
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let sequence = partition.sequence_of(index);
                NodeExport {
                    index,
                    id: segment.id,
                    speaker: segment.speaker.clone(),
                    onset: segment.onset,
                    offset: segment.offset,
                    sequence: sequence.map_or(0, |s| s.index),
                    label: sequence.and_then(|s| s.label),
                }
            })
            .collect();

        let edges = graph
            .edges()
            .iter()
            .filter_map(|edge| {
                let (from, to) = (graph.segment(edge.from)?, graph.segment(edge.to)?);
                Some(EdgeExport {
                    from: from.id,
                    to: to.id,
                    kind: graph.edge_kind(edge),
                    on_best_path: best_paths.iter().any(|b| b.contains_edge(edge)),
                })
            })
            .collect();

        Self { nodes, edges }
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize graph export")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Edge, RejectReason, Segment, SegmentRecord, SegmentStore, SourceColumns};
    use crate::scoring::{PathStatistic, StatisticScorer};
    use crate::stages::{execute_stage2, execute_stage3, Stage2Config, Stage3Config};

    /// Rows 0..=3 form A-B-B-A with a 0 -> 2 shortcut, row 4 is a singleton,
    /// row 5 was rejected at load
    fn fixture() -> (InteractionGraph, SequencePartition, Vec<BestPath>, Vec<RejectedRecord>) {
        let store = SegmentStore::new(
            vec![
                Segment::new(0, "A", 0.0, 1.0),
                Segment::new(1, "B", 1.2, 2.0),
                Segment::new(2, "B", 2.2, 3.0),
                Segment::new(3, "A", 3.2, 4.0),
                Segment::new(4, "C", 10.0, 11.0),
            ],
            6,
        );
        let graph = InteractionGraph::new(
            store,
            vec![Edge::new(0, 1), Edge::new(0, 2), Edge::new(1, 2), Edge::new(2, 3)],
        )
        .unwrap();
        let partition = execute_stage2(&graph, &Stage2Config::default()).partition;
        let scorer = StatisticScorer::new(PathStatistic::NumSegments);
        let best = execute_stage3(&graph, &partition, &scorer, &Stage3Config::default())
            .unwrap()
            .best_paths;
        let rejected = vec![RejectedRecord {
            row: 5,
            reason: RejectReason::MissingSpeaker,
            record: SegmentRecord {
                speaker: None,
                ..SegmentRecord::new("", 12.0, 13.0)
            }
            .with_field("note", "x"),
        }];
        (graph, partition, best, rejected)
    }

    #[test]
    fn test_rows_cover_every_input_row() {
        let (graph, partition, best, rejected) = fixture();
        let transcript = AnnotatedTranscript::build(&graph, &partition, &best, &rejected);

        assert_eq!(transcript.rows.len(), 6);
        assert!(transcript.rows.iter().enumerate().all(|(i, r)| r.index == i));
        assert_eq!(transcript.metadata.reported_sequences, 1);

        let rejected_row = &transcript.rows[5];
        assert_eq!(rejected_row.inter_seq_index, None);
        assert_eq!(rejected_row.columns.get("note").and_then(|v| v.as_str()), Some("x"));
        assert_eq!(rejected_row.columns.get("onset"), Some(&Value::from(12.0)));
        assert!(!rejected_row.columns.contains_key("speaker"));

        let singleton = &transcript.rows[4];
        assert_eq!(singleton.inter_seq, None);
        assert_eq!(singleton.is_start_unit, None);
    }

    #[test]
    fn test_sequence_labels_and_links() {
        let (graph, partition, best, rejected) = fixture();
        let transcript = AnnotatedTranscript::build(&graph, &partition, &best, &rejected);
        let rows = &transcript.rows;

        assert_eq!(rows[2].inter_seq.as_deref(), Some("(2) 1-2"));
        assert_eq!(rows[3].conv_turn_index, Some(3));
        assert_eq!(rows[0].is_start_unit, Some(true));
        assert_eq!(rows[3].is_end_unit, Some(true));
        assert!(rows.iter().take(4).all(|r| r.on_best_path));

        // best path 0 -> 1 -> 2 -> 3; the 0 -> 2 shortcut is not a link
        assert_eq!(rows[0].is_prompt_to, vec![1]);
        assert_eq!(rows[1].is_self_prompt_to, vec![2]);
        assert_eq!(rows[2].is_self_response_to, vec![1]);
        assert_eq!(rows[3].is_response_to, vec![2]);
    }

    #[test]
    fn test_links_fall_back_to_all_edges() {
        let (graph, partition, _, rejected) = fixture();
        let transcript = AnnotatedTranscript::build(&graph, &partition, &[], &rejected);

        assert_eq!(transcript.rows[0].is_prompt_to, vec![1, 2]);
        assert!(!transcript.rows[0].on_best_path);
    }

    #[test]
    fn test_write_json() {
        let (graph, partition, best, rejected) = fixture();
        let transcript = AnnotatedTranscript::build(&graph, &partition, &best, &rejected);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotated.json");
        transcript.write_json(&path).unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["rows"][1]["inter_seq"], "(1) 1-2");
        assert_eq!(value["rows"][5]["note"], "x");
        assert_eq!(value["metadata"]["total_rows"], 6);
    }

    #[test]
    fn test_graph_export_flags_best_path_edges() {
        let (graph, partition, best, _) = fixture();
        let export = GraphExport::build(&graph, &partition, &best);

        assert_eq!(export.nodes.len(), 5);
        assert_eq!(export.nodes[4].label, None);
        let shortcut = export
            .edges
            .iter()
            .find(|e| e.from == SegmentId(0) && e.to == SegmentId(2))
            .unwrap();
        assert!(!shortcut.on_best_path);
        assert_eq!(export.edges.iter().filter(|e| e.on_best_path).count(), 3);

        let json = export.to_json_string().unwrap();
        assert!(json.contains("\"kind\": \"continuation\""));
    }

    #[test]
    fn test_rows_keep_source_column_names_without_duplicate_keys() {
        let mut segment = Segment::new(0, "CHI", 0.0, 1.0);
        segment.columns = SourceColumns {
            onset: "segment_onset".to_string(),
            offset: "segment_offset".to_string(),
            speaker: "speaker_type".to_string(),
        };
        segment.payload.insert("inter_seq".to_string(), Value::from("stale"));
        segment.payload.insert("index".to_string(), Value::from(99));
        segment.payload.insert("vcm_type".to_string(), Value::from("C"));
        let store = SegmentStore::new(vec![segment], 1);
        let graph = InteractionGraph::new(store, vec![]).unwrap();
        let partition = execute_stage2(&graph, &Stage2Config::default()).partition;

        let transcript = AnnotatedTranscript::build(&graph, &partition, &[], &[]);
        let json = transcript.to_json_string().unwrap();

        // serde_json keeps the last value on duplicate keys, so count them in the text
        assert_eq!(json.matches("\"inter_seq\"").count(), 1);
        assert_eq!(json.matches("\"index\"").count(), 1);

        let value: Value = serde_json::from_str(&json).unwrap();
        let row = &value["rows"][0];
        assert_eq!(row["index"], 0);
        assert_eq!(row["inter_seq"], Value::Null);
        assert_eq!(row["speaker_type"], "CHI");
        assert_eq!(row["segment_onset"], 0.0);
        assert_eq!(row["segment_offset"], 1.0);
        assert_eq!(row["vcm_type"], "C");
        assert!(row.get("speaker").is_none());
        assert!(row.get("onset").is_none());
    }
}
