use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, EngineError};
use crate::io::{AnnotatedTranscript, GraphExport};
use crate::models::{BestPath, InteractionGraph, RejectedRecord, SegmentRecord, SequencePartition};
use crate::policy::{ConnectivityPolicy, PolicyConfig, RulePolicy};
use crate::scoring::{PathScorer, ScorerSpec};
use crate::stages::{
    execute_stage0, execute_stage1, execute_stage2, execute_stage3, Stage0Config, Stage1Config,
    Stage2Config, Stage3Config,
};

/// Full engine configuration, loadable from JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub load: Stage0Config,
    pub policy: PolicyConfig,
    pub graph: Stage1Config,
    pub sequences: Stage2Config,
    pub search: Stage3Config,
    /// Select a best path per sequence; requires a scorer
    pub select_best_path: bool,
    pub scorer: Option<ScorerSpec>,
    /// Caller-supplied scorer, takes precedence over `scorer`
    #[serde(skip)]
    pub custom_scorer: Option<Arc<dyn PathScorer>>,
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse pipeline configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_json(&content)
    }

    /// Inject a custom scorer and enable best-path selection
    pub fn with_scorer(mut self, scorer: Arc<dyn PathScorer>) -> Self {
        self.custom_scorer = Some(scorer);
        self.select_best_path = true;
        self
    }

    /// Check every setting before any construction begins
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate()?;
        self.validate_stages()
    }

    fn validate_stages(&self) -> Result<(), ConfigError> {
        self.load.validate()?;
        if let Some(spec) = &self.scorer {
            spec.validate()?;
        }
        if self.select_best_path && self.custom_scorer.is_none() && self.scorer.is_none() {
            return Err(ConfigError::MissingScorer);
        }
        Ok(())
    }

    fn resolve_scorer(&self) -> Option<Arc<dyn PathScorer>> {
        if !self.select_best_path {
            return None;
        }
        self.custom_scorer
            .clone()
            .or_else(|| self.scorer.as_ref().map(ScorerSpec::build))
    }
}

/// Load, build, extract and search, in that order
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    policy: Arc<dyn ConnectivityPolicy>,
    scorer: Option<Arc<dyn PathScorer>>,
}

impl Pipeline {
    /// Validate the configuration and build the rule-based policy
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let policy = Arc::new(RulePolicy::new(config.policy.clone())?);
        let scorer = config.resolve_scorer();
        Ok(Self {
            config,
            policy,
            scorer,
        })
    }

    /// Use a caller-supplied connectivity policy; `config.policy` is ignored
    pub fn with_policy(
        config: PipelineConfig,
        policy: Arc<dyn ConnectivityPolicy>,
    ) -> Result<Self, ConfigError> {
        config.validate_stages()?;
        let scorer = config.resolve_scorer();
        Ok(Self {
            config,
            policy,
            scorer,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, records: Vec<SegmentRecord>) -> Result<PipelineOutput, EngineError> {
        info!("Stage 0: Loading {} rows...", records.len());
        let loaded = execute_stage0(records, &self.config.load)?;

        info!("Stage 1: Building interaction graph...");
        let built = execute_stage1(loaded.store, self.policy.as_ref(), &self.config.graph)?;

        info!("Stage 2: Extracting interactional sequences...");
        let extracted = execute_stage2(&built.graph, &self.config.sequences);

        let best_paths = match &self.scorer {
            Some(scorer) => {
                info!("Stage 3: Selecting best paths...");
                execute_stage3(
                    &built.graph,
                    &extracted.partition,
                    scorer.as_ref(),
                    &self.config.search,
                )?
                .best_paths
            }
            None => {
                info!("Skipping best-path selection (not requested)");
                Vec::new()
            }
        };

        Ok(PipelineOutput {
            graph: built.graph,
            partition: extracted.partition,
            best_paths,
            rejected: loaded.rejected,
        })
    }
}

/// Everything derived from one run
#[derive(Debug)]
pub struct PipelineOutput {
    pub graph: InteractionGraph,
    pub partition: SequencePartition,
    /// One per sequence when best-path selection ran, empty otherwise
    pub best_paths: Vec<BestPath>,
    pub rejected: Vec<RejectedRecord>,
}

impl PipelineOutput {
    pub fn best_path(&self, sequence: usize) -> Option<&BestPath> {
        self.best_paths.iter().find(|b| b.sequence == sequence)
    }

    pub fn annotate(&self) -> AnnotatedTranscript {
        AnnotatedTranscript::build(&self.graph, &self.partition, &self.best_paths, &self.rejected)
    }

    pub fn export_graph(&self) -> GraphExport {
        GraphExport::build(&self.graph, &self.partition, &self.best_paths)
    }
}
