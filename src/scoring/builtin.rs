use std::fmt;

use crate::models::PathView;

use super::{PathScorer, PathStatistic, Score, WeightedTerm};

/// Scores a path by a single statistic
#[derive(Debug, Clone, Copy)]
pub struct StatisticScorer {
    statistic: PathStatistic,
}

impl StatisticScorer {
    pub fn new(statistic: PathStatistic) -> Self {
        Self { statistic }
    }
}

impl PathScorer for StatisticScorer {
    fn name(&self) -> &str {
        match self.statistic {
            PathStatistic::NumSegments => "segment_count",
            PathStatistic::NumSpeakers => "speaker_count",
            PathStatistic::NumTurns => "turn_count",
            PathStatistic::NumTurnTransitions => "turn_transition_count",
            PathStatistic::NumMultiUnitTransitions => "multi_unit_transition_count",
            PathStatistic::TotalDuration => "total_duration",
        }
    }

    fn score(&self, path: &PathView<'_>) -> Score {
        Score::single(self.statistic.value(&path.stats()))
    }

    fn is_prefix_monotonic(&self) -> bool {
        self.statistic.is_prefix_monotonic()
    }
}

/// Weighted sum of path statistics
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    terms: Vec<WeightedTerm>,
}

impl WeightedScorer {
    pub fn new(terms: Vec<WeightedTerm>) -> Self {
        Self { terms }
    }
}

impl PathScorer for WeightedScorer {
    fn name(&self) -> &str {
        "weighted"
    }

    fn score(&self, path: &PathView<'_>) -> Score {
        let stats = path.stats();
        let total = self
            .terms
            .iter()
            .map(|t| t.weight * t.statistic.value(&stats))
            .sum();
        Score::single(total)
    }

    fn is_prefix_monotonic(&self) -> bool {
        self.terms.iter().all(|t| t.statistic.is_prefix_monotonic())
    }
}

/// Ranks by several statistics in priority order
#[derive(Debug, Clone)]
pub struct LexicographicScorer {
    keys: Vec<PathStatistic>,
}

impl LexicographicScorer {
    pub fn new(keys: Vec<PathStatistic>) -> Self {
        Self { keys }
    }
}

impl PathScorer for LexicographicScorer {
    fn name(&self) -> &str {
        "lexicographic"
    }

    fn score(&self, path: &PathView<'_>) -> Score {
        let stats = path.stats();
        Score::new(self.keys.iter().map(|k| k.value(&stats)).collect())
    }

    fn is_prefix_monotonic(&self) -> bool {
        self.keys.iter().all(PathStatistic::is_prefix_monotonic)
    }
}

/// Caller-supplied scoring closure
pub struct FnScorer<F> {
    name: String,
    monotonic: bool,
    func: F,
}

impl<F> FnScorer<F>
where
    F: Fn(&PathView<'_>) -> Score + Send + Sync,
{
    /// Wrap a closure, assumed prefix-monotonic
    pub fn new(name: &str, func: F) -> Self {
        Self {
            name: name.to_string(),
            monotonic: true,
            func,
        }
    }

    /// Mark the closure as not prefix-monotonic so small sequences are
    /// searched exhaustively
    pub fn non_monotonic(mut self) -> Self {
        self.monotonic = false;
        self
    }
}

impl<F> fmt::Debug for FnScorer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnScorer")
            .field("name", &self.name)
            .field("monotonic", &self.monotonic)
            .finish()
    }
}

impl<F> PathScorer for FnScorer<F>
where
    F: Fn(&PathView<'_>) -> Score + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, path: &PathView<'_>) -> Score {
        (self.func)(path)
    }

    fn is_prefix_monotonic(&self) -> bool {
        self.monotonic
    }
}
