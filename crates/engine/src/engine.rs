use std::sync::Arc;

use tracelink_core::{Model, Text};
use tracing::info;

use crate::agent::StageKind;
use crate::config::PipelineConfig;
use crate::connection::{ConnectionState, ConnectionStates};
use crate::error::EngineError;
use crate::inconsistency::{InconsistencyState, InconsistencyStates};
use crate::pipeline::Pipeline;
use crate::recommendation::{RecommendationState, RecommendationStates};
use crate::report::{self, RunMeta, TraceReport};
use crate::repository::{seed_repository, DataRepository, ModelStates, PipelineState};
use crate::text_state::TextState;

/// Run the full pipeline over one text and any number of models.
pub fn run(config: &PipelineConfig, text: Arc<Text>, models: &[Model]) -> Result<TraceResult, EngineError> {
    info!(words = text.len(), models = models.len(), "starting trace-link run");
    let mut repo = seed_repository(text, models.iter().cloned());
    Pipeline::new(config.clone()).run(&mut repo)?;
    TraceResult::from_repository(config.clone(), repo)
}

/// Run from the recommendation stage on, reusing a text state computed
/// by an earlier run over the same text.
pub fn run_with_text_state(
    config: &PipelineConfig,
    text: Arc<Text>,
    models: &[Model],
    text_state: TextState,
) -> Result<TraceResult, EngineError> {
    let mut repo = seed_repository(text, models.iter().cloned());
    repo.insert(text_state);
    Pipeline::new(config.clone()).run_from(StageKind::Recommendation, &mut repo)?;
    TraceResult::from_repository(config.clone(), repo)
}

/// Final states of a run, detached from the repository.
#[derive(Debug, Clone)]
pub struct TraceResult {
    config: PipelineConfig,
    model_ids: Vec<String>,
    text: TextState,
    recommendations: RecommendationStates,
    connections: ConnectionStates,
    inconsistencies: InconsistencyStates,
}

fn take<T: PipelineState>(repo: &mut DataRepository) -> Result<T, EngineError> {
    repo.take::<T>().ok_or(EngineError::MissingState(T::KEY))
}

impl TraceResult {
    pub fn from_repository(config: PipelineConfig, mut repo: DataRepository) -> Result<Self, EngineError> {
        let model_ids = repo.require::<ModelStates>()?.ids();
        let text = take::<TextState>(&mut repo)?;
        let mut recommendations = take::<RecommendationStates>(&mut repo)?;
        let mut connections = take::<ConnectionStates>(&mut repo)?;
        let mut inconsistencies = take::<InconsistencyStates>(&mut repo)?;
        // Every model gets an (possibly empty) entry in each per-model state
        for id in &model_ids {
            recommendations.state_mut(id);
            connections.state_mut(id);
            inconsistencies.state_mut(id);
        }
        Ok(Self {
            config,
            model_ids,
            text,
            recommendations,
            connections,
            inconsistencies,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Model ids, sorted.
    pub fn model_ids(&self) -> &[String] {
        &self.model_ids
    }

    pub fn text_state(&self) -> &TextState {
        &self.text
    }

    /// Hand the text state over, e.g. to seed further runs.
    pub fn into_text_state(self) -> TextState {
        self.text
    }

    pub fn recommendations(&self, model_id: &str) -> Result<&RecommendationState, EngineError> {
        self.recommendations
            .get(model_id)
            .ok_or_else(|| EngineError::UnknownModel(model_id.to_string()))
    }

    pub fn connections(&self, model_id: &str) -> Result<&ConnectionState, EngineError> {
        self.connections
            .get(model_id)
            .ok_or_else(|| EngineError::UnknownModel(model_id.to_string()))
    }

    pub fn inconsistencies(&self, model_id: &str) -> Result<&InconsistencyState, EngineError> {
        self.inconsistencies
            .get(model_id)
            .ok_or_else(|| EngineError::UnknownModel(model_id.to_string()))
    }

    pub fn report(&self) -> TraceReport {
        let acceptance = self.config.connection.acceptance_threshold;
        let models: Vec<_> = self
            .model_ids
            .iter()
            .filter_map(|id| {
                Some(report::model_report(
                    id,
                    self.recommendations.get(id)?,
                    self.connections.get(id)?,
                    self.inconsistencies.get(id)?,
                    acceptance,
                ))
            })
            .collect();
        TraceReport {
            meta: RunMeta {
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                run_at: chrono::Utc::now().to_rfc3339(),
                aggregation: self.config.evidence.aggregation,
                acceptance_threshold: acceptance,
            },
            summary: report::compute_summary(&self.text, &models),
            noun_mappings: report::noun_mapping_records(&self.text),
            models,
        }
    }
}
