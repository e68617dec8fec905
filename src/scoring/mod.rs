pub mod builtin;

pub use builtin::*;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{PathStats, PathView};

/// Comparable path score: finite components compared lexicographically.
/// Single-statistic scorers produce one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(Vec<f64>);

impl Score {
    pub fn new(components: Vec<f64>) -> Self {
        Self(components)
    }

    pub fn single(value: f64) -> Self {
        Self(vec![value])
    }

    pub fn components(&self) -> &[f64] {
        &self.0
    }

    /// Scores must be non-empty and finite to be ranked
    pub fn is_comparable(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|c| c.is_finite())
    }

    /// Lexicographic comparison. Only meaningful between comparable scores.
    pub fn compare(&self, other: &Score) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.partial_cmp(b).unwrap_or(Ordering::Equal) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

/// Maps a candidate path to a comparable score.
///
/// Best-path search is only guaranteed optimal for prefix-monotonic scorers:
/// extending a better-scoring prefix by one edge must never give a worse
/// result than extending a worse-scoring prefix by the same edge. Scorers that
/// cannot promise this must return `false` from `is_prefix_monotonic`.
pub trait PathScorer: fmt::Debug + Send + Sync {
    /// Identifies the scorer in errors and logs
    fn name(&self) -> &str;

    fn score(&self, path: &PathView<'_>) -> Score;

    fn is_prefix_monotonic(&self) -> bool {
        true
    }
}

/// Score a path and reject values that cannot be ranked
pub fn score_path(scorer: &dyn PathScorer, path: &PathView<'_>) -> Result<Score, ConfigError> {
    let score = scorer.score(path);
    if score.is_comparable() {
        Ok(score)
    } else {
        Err(ConfigError::NonComparableScore {
            scorer: scorer.name().to_string(),
            score: score.components().to_vec(),
            path: path.ids(),
        })
    }
}

/// A path statistic usable in built-in scorers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatistic {
    NumSegments,
    NumSpeakers,
    NumTurns,
    NumTurnTransitions,
    NumMultiUnitTransitions,
    TotalDuration,
}

impl PathStatistic {
    pub fn value(&self, stats: &PathStats) -> f64 {
        match self {
            PathStatistic::NumSegments => stats.num_segments as f64,
            PathStatistic::NumSpeakers => stats.num_speakers as f64,
            PathStatistic::NumTurns => stats.num_turns as f64,
            PathStatistic::NumTurnTransitions => stats.num_turn_transitions as f64,
            PathStatistic::NumMultiUnitTransitions => stats.num_multi_unit_transitions as f64,
            PathStatistic::TotalDuration => stats.total_duration,
        }
    }

    /// Every statistic except the distinct-speaker count grows by an amount
    /// that depends only on the last node and the appended node.
    pub fn is_prefix_monotonic(&self) -> bool {
        !matches!(self, PathStatistic::NumSpeakers)
    }
}

/// One term of a weighted combination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedTerm {
    pub statistic: PathStatistic,
    pub weight: f64,
}

/// Serializable selection of a built-in scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScorerSpec {
    SegmentCount,
    TurnCount,
    TotalDuration,
    Statistic { statistic: PathStatistic },
    Weighted { terms: Vec<WeightedTerm> },
    /// Rank by each key in turn, ties falling through to the next key
    Lexicographic { keys: Vec<PathStatistic> },
}

impl ScorerSpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ScorerSpec::Weighted { terms } => {
                if terms.is_empty() {
                    return Err(ConfigError::EmptyScorer {
                        scorer: "weighted".to_string(),
                    });
                }
                if let Some(term) = terms.iter().find(|t| !t.weight.is_finite()) {
                    return Err(ConfigError::NonFiniteThreshold {
                        rule: "weighted scorer",
                        field: "weight",
                        value: term.weight,
                    });
                }
                Ok(())
            }
            ScorerSpec::Lexicographic { keys } if keys.is_empty() => Err(ConfigError::EmptyScorer {
                scorer: "lexicographic".to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn build(&self) -> Arc<dyn PathScorer> {
        match self {
            ScorerSpec::SegmentCount => Arc::new(StatisticScorer::new(PathStatistic::NumSegments)),
            ScorerSpec::TurnCount => Arc::new(StatisticScorer::new(PathStatistic::NumTurns)),
            ScorerSpec::TotalDuration => Arc::new(StatisticScorer::new(PathStatistic::TotalDuration)),
            ScorerSpec::Statistic { statistic } => Arc::new(StatisticScorer::new(*statistic)),
            ScorerSpec::Weighted { terms } => Arc::new(WeightedScorer::new(terms.clone())),
            ScorerSpec::Lexicographic { keys } => Arc::new(LexicographicScorer::new(keys.clone())),
        }
    }
}
