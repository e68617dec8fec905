#![allow(dead_code)]

use interseq::{PipelineConfig, PolicyConfig, SegmentRecord, SpeakerRule, TemporalRule};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Small deterministic generator so synthetic inputs are reproducible
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    /// Uniform in `0..bound`
    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

/// `count` segments over speakers A, B, C with timestamps on a 50 ms grid
pub fn synthetic_records(rng: &mut Lcg, count: usize) -> Vec<SegmentRecord> {
    let speakers = ["A", "B", "C"];
    let mut onset = 0.0;
    (0..count)
        .map(|_| {
            onset += (rng.below(16) * 50) as f64;
            let duration = (2 + rng.below(19)) as f64 * 50.0;
            let speaker = speakers[rng.below(3) as usize];
            SegmentRecord::new(speaker, onset, onset + duration)
        })
        .collect()
}

pub fn permissive_policy(allow_interactions_between_interactants: bool) -> PolicyConfig {
    PolicyConfig {
        transition: TemporalRule {
            min_gap: -300.0,
            max_gap: 600.0,
            max_overlap: 300.0,
        },
        continuation: Some(TemporalRule {
            min_gap: 0.0,
            max_gap: 900.0,
            max_overlap: 0.0,
        }),
        speakers: SpeakerRule::all_pairs(
            &["A"],
            &["A", "B", "C"],
            allow_interactions_between_interactants,
        ),
    }
}

pub fn permissive_config() -> PipelineConfig {
    PipelineConfig {
        policy: permissive_policy(true),
        ..PipelineConfig::default()
    }
}
