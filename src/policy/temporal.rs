use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::Segment;

/// Gap and overlap thresholds between a segment and its successor.
///
/// Units are those of the input timestamps (milliseconds by convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalRule {
    /// Smallest allowed `onset(next) - offset(prev)`; negative permits overlap
    pub min_gap: f64,
    /// Largest allowed `onset(next) - offset(prev)`
    pub max_gap: f64,
    /// Largest allowed shared duration between the two segments
    pub max_overlap: f64,
}

impl TemporalRule {
    /// Default thresholds for cross-speaker transitions
    pub fn transition() -> Self {
        Self {
            min_gap: 0.0,
            max_gap: 1_000.0,
            max_overlap: 0.0,
        }
    }

    /// Default thresholds for same-speaker continuations (looser)
    pub fn continuation() -> Self {
        Self {
            min_gap: 0.0,
            max_gap: 2_000.0,
            max_overlap: 0.0,
        }
    }

    pub fn accepts(&self, prev: &Segment, next: &Segment) -> bool {
        let gap = prev.gap_to(next);
        gap >= self.min_gap && gap <= self.max_gap && prev.overlap_with(next) <= self.max_overlap
    }

    pub fn validate(&self, rule: &'static str) -> Result<(), ConfigError> {
        for (field, value) in [
            ("min_gap", self.min_gap),
            ("max_gap", self.max_gap),
            ("max_overlap", self.max_overlap),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteThreshold { rule, field, value });
            }
        }

        if self.max_gap < 0.0 {
            return Err(ConfigError::NegativeMaxGap {
                rule,
                value: self.max_gap,
            });
        }
        if self.min_gap > self.max_gap {
            return Err(ConfigError::InvertedGapBounds {
                rule,
                min: self.min_gap,
                max: self.max_gap,
            });
        }
        if self.max_overlap < 0.0 {
            return Err(ConfigError::NegativeMaxOverlap {
                rule,
                value: self.max_overlap,
            });
        }
        Ok(())
    }
}

impl Default for TemporalRule {
    fn default() -> Self {
        Self::transition()
    }
}
