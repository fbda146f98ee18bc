//! Stage sequencing.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s; a stage is an ordered
//! list of agents plus the state it owns. Stages run strictly in order and
//! the first agent error aborts the run.

use tracing::{info, info_span};

use crate::agent::{AgentKind, StageKind};
use crate::config::PipelineConfig;
use crate::error::EngineError;
use crate::repository::{DataRepository, ModelStates, PreprocessingData};
use crate::text_state::TextState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    kind: StageKind,
    agents: Vec<AgentKind>,
}

impl Stage {
    /// A stage running `agents` in the given order. Agents registered for
    /// another stage are dropped.
    pub fn new(kind: StageKind, agents: impl IntoIterator<Item = AgentKind>) -> Self {
        Self {
            kind,
            agents: agents.into_iter().filter(|a| a.stage() == kind).collect(),
        }
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn agents(&self) -> &[AgentKind] {
        &self.agents
    }

    /// Initialize the stage's state (unless already present), then run
    /// every agent in order.
    pub fn run(&self, repo: &mut DataRepository, config: &PipelineConfig) -> Result<(), EngineError> {
        let _span = info_span!("stage", stage = self.kind.name()).entered();
        let created = self.kind.initialize_state(repo, config)?;
        if !created {
            info!("state already present, reusing it");
        }
        for agent in &self.agents {
            agent.execute(repo, config)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Standard four-stage pipeline with the agents the config enables.
    pub fn new(config: PipelineConfig) -> Self {
        let stages = StageKind::ALL
            .into_iter()
            .map(|kind| {
                Stage::new(
                    kind,
                    AgentKind::for_stage(kind).filter(|a| config.agents.is_enabled(*a)),
                )
            })
            .collect();
        Self { config, stages }
    }

    pub fn with_stages(config: PipelineConfig, stages: Vec<Stage>) -> Self {
        Self { config, stages }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn run(&self, repo: &mut DataRepository) -> Result<(), EngineError> {
        self.run_stages(repo, &self.stages)
    }

    /// Run from `first` on, e.g. after seeding the repository with a
    /// precomputed text state.
    pub fn run_from(&self, first: StageKind, repo: &mut DataRepository) -> Result<(), EngineError> {
        let start = self
            .stages
            .iter()
            .position(|s| s.kind >= first)
            .unwrap_or(self.stages.len());
        self.run_stages(repo, &self.stages[start..])
    }

    fn run_stages(&self, repo: &mut DataRepository, stages: &[Stage]) -> Result<(), EngineError> {
        repo.require::<PreprocessingData>()?;
        repo.require::<ModelStates>()?;
        for stage in stages {
            stage.run(repo, &self.config)?;
        }
        if let Some(text) = repo.get::<TextState>() {
            info!(
                noun_mappings = text.noun_mapping_count(),
                phrase_mappings = text.phrase_mapping_count(),
                "pipeline finished"
            );
        }
        Ok(())
    }
}
