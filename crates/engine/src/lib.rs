//! `tracelink-engine`: recovers trace links between an annotated text and
//! structural models, and reports where the two disagree.
//!
//! A run seeds a [`DataRepository`] with the text and the models, then
//! four stages add evidence in order:
//!
//! 1. text extraction: noun mappings and phrase mappings ([`TextState`])
//! 2. recommendation: recommended instances per model
//! 3. connection: instance links per model
//! 4. inconsistency: missing model elements and unmatched text references
//!
//! Every piece of evidence carries a [`Confidence`] that remembers which
//! agent claimed what. All iteration orders derive from input order or
//! sorted keys, so identical inputs give identical output.

pub mod agent;
pub mod confidence;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod holdback;
pub mod inconsistency;
pub mod pipeline;
pub mod recommendation;
pub mod report;
pub mod repository;
pub mod similarity;
pub mod text_state;

mod text_agents;

pub use agent::{AgentKind, StageKind};
pub use confidence::{Aggregation, Claim, Claimant, Confidence};
pub use config::PipelineConfig;
pub use connection::{ConnectionState, ConnectionStates, InstanceLink};
pub use engine::{run, run_with_text_state, TraceResult};
pub use error::EngineError;
pub use evaluation::{evaluate_links, EvaluationResult, GoldStandard};
pub use holdback::{evaluate_holdback, run_holdback, HoldBackEvaluation, HoldBackRun};
pub use inconsistency::{Inconsistency, InconsistencyKind, InconsistencyState, InconsistencyStates};
pub use pipeline::{Pipeline, Stage};
pub use recommendation::{
    RecommendationProposal, RecommendationState, RecommendationStates, RecommendedInstance,
    RecommendedInstanceId,
};
pub use report::TraceReport;
pub use repository::{seed_repository, DataRepository, ModelStates, PipelineState, PreprocessingData};
pub use text_state::{MappingKind, NounMapping, NounMappingId, PhraseMapping, PhraseMappingId, TextState};
