use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Ordered speaker pair: a transition from `from` to `to` is permitted
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpeakerPair {
    pub from: String,
    pub to: String,
}

impl SpeakerPair {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Which speakers may take a turn after which.
///
/// Only consulted for speaker changes; same-speaker pairs are governed by the
/// continuation rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerRule {
    /// Primary (target) speakers
    pub primary: BTreeSet<String>,
    /// Allowed ordered speaker pairs
    pub allowed_pairs: BTreeSet<SpeakerPair>,
    /// Whether two distinct non-primary speakers may transition directly,
    /// even when their pair is in `allowed_pairs`
    pub allow_interactions_between_interactants: bool,
}

impl SpeakerRule {
    /// Target participant interacting with a list of interactants: the target
    /// and each interactant may respond to one another, and interactants may
    /// respond to each other when `allow_interactions_between_interactants`
    /// is set.
    pub fn target_participant(
        target: &str,
        interactants: &[&str],
        allow_interactions_between_interactants: bool,
    ) -> Self {
        let mut allowed_pairs = BTreeSet::new();
        for &other in interactants.iter().filter(|&&s| s != target) {
            allowed_pairs.insert(SpeakerPair::new(target, other));
            allowed_pairs.insert(SpeakerPair::new(other, target));
            for &third in interactants.iter().filter(|&&s| s != target && s != other) {
                allowed_pairs.insert(SpeakerPair::new(other, third));
            }
        }

        Self {
            primary: BTreeSet::from([target.to_string()]),
            allowed_pairs,
            allow_interactions_between_interactants,
        }
    }

    /// Every ordered pair of distinct speakers from `speakers` is allowed
    pub fn all_pairs(
        primary: &[&str],
        speakers: &[&str],
        allow_interactions_between_interactants: bool,
    ) -> Self {
        let allowed_pairs = speakers
            .iter()
            .flat_map(move |&a| {
                speakers
                    .iter()
                    .filter(move |&&b| b != a)
                    .map(move |&b| SpeakerPair::new(a, b))
            })
            .collect();

        Self {
            primary: primary.iter().map(|s| s.to_string()).collect(),
            allowed_pairs,
            allow_interactions_between_interactants,
        }
    }

    pub fn is_primary(&self, speaker: &str) -> bool {
        self.primary.contains(speaker)
    }

    /// Whether a speaker change from `from` to `to` is permitted
    pub fn allows(&self, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        let pair = SpeakerPair::new(from, to);
        if !self.allowed_pairs.contains(&pair) {
            return false;
        }
        if !self.is_primary(from) && !self.is_primary(to) {
            return self.allow_interactions_between_interactants;
        }
        true
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_pairs.is_empty() {
            return Err(ConfigError::EmptySpeakerRelation);
        }
        Ok(())
    }
}
