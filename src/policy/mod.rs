pub mod speakers;
pub mod temporal;

pub use speakers::*;
pub use temporal::*;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::Segment;

/// Decides whether an edge may exist from `prev` to `next`.
///
/// Called only for ordered pairs with `onset(prev) <= onset(next)` and
/// `prev != next`. Implementations must be pure functions of the two
/// segments and their own static configuration.
pub trait ConnectivityPolicy: Send + Sync {
    fn can_connect(&self, prev: &Segment, next: &Segment) -> bool;

    /// Upper bound on `onset(next) - offset(prev)` over every accepted pair.
    /// The graph builder stops scanning candidates beyond it.
    fn max_reach(&self) -> f64;
}

/// Configuration of the rule-based connectivity policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Thresholds for speaker changes
    pub transition: TemporalRule,
    /// Thresholds for same-speaker continuations; `None` disables multi-unit turns
    pub continuation: Option<TemporalRule>,
    /// Allowed speaker changes
    pub speakers: SpeakerRule,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            transition: TemporalRule::transition(),
            continuation: Some(TemporalRule::continuation()),
            speakers: SpeakerRule::default(),
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transition.validate("transition")?;
        if let Some(continuation) = &self.continuation {
            continuation.validate("continuation")?;
        }
        self.speakers.validate()
    }
}

/// Conjunction of the temporal, overlap, speaker and continuation rules
#[derive(Debug, Clone)]
pub struct RulePolicy {
    config: PolicyConfig,
}

impl RulePolicy {
    /// Validate the configuration up front; an invalid policy is never built
    pub fn new(config: PolicyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }
}

impl ConnectivityPolicy for RulePolicy {
    fn can_connect(&self, prev: &Segment, next: &Segment) -> bool {
        if prev.same_speaker(next) {
            return match &self.config.continuation {
                Some(rule) => rule.accepts(prev, next),
                None => false,
            };
        }

        self.config.speakers.allows(&prev.speaker, &next.speaker)
            && self.config.transition.accepts(prev, next)
    }

    fn max_reach(&self) -> f64 {
        let continuation = self
            .config
            .continuation
            .map(|rule| rule.max_gap)
            .unwrap_or(f64::NEG_INFINITY);
        self.config.transition.max_gap.max(continuation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(continuation: Option<TemporalRule>) -> RulePolicy {
        RulePolicy::new(PolicyConfig {
            transition: TemporalRule {
                min_gap: 0.0,
                max_gap: 500.0,
                max_overlap: 0.0,
            },
            continuation,
            speakers: SpeakerRule::all_pairs(&["A"], &["A", "B"], false),
        })
        .unwrap()
    }

    #[test]
    fn test_cross_speaker_uses_transition_thresholds() {
        let policy = policy(Some(TemporalRule::continuation()));
        let a = Segment::new(0, "A", 0.0, 1_000.0);

        assert!(policy.can_connect(&a, &Segment::new(1, "B", 1_400.0, 2_000.0)));
        assert!(!policy.can_connect(&a, &Segment::new(1, "B", 1_600.0, 2_000.0)));
    }

    #[test]
    fn test_same_speaker_uses_continuation_thresholds() {
        let policy = policy(Some(TemporalRule::continuation()));
        let a = Segment::new(0, "A", 0.0, 1_000.0);

        assert!(policy.can_connect(&a, &Segment::new(1, "A", 2_500.0, 3_000.0)));
        assert!(!policy.can_connect(&a, &Segment::new(1, "A", 3_500.0, 4_000.0)));
        assert_eq!(policy.max_reach(), 2_000.0);
    }

    #[test]
    fn test_continuation_disabled() {
        let policy = policy(None);
        let a = Segment::new(0, "A", 0.0, 1_000.0);

        assert!(!policy.can_connect(&a, &Segment::new(1, "A", 1_100.0, 1_200.0)));
        assert_eq!(policy.max_reach(), 500.0);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = PolicyConfig {
            continuation: Some(TemporalRule {
                min_gap: 0.0,
                max_gap: -10.0,
                max_overlap: 0.0,
            }),
            speakers: SpeakerRule::all_pairs(&["A"], &["A", "B"], true),
            ..PolicyConfig::default()
        };

        assert_eq!(
            RulePolicy::new(config).err(),
            Some(ConfigError::NegativeMaxGap {
                rule: "continuation",
                value: -10.0
            })
        );
        assert_eq!(
            RulePolicy::new(PolicyConfig::default()).err(),
            Some(ConfigError::EmptySpeakerRelation)
        );
    }
}
