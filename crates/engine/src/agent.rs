//! Agent registry.
//!
//! Every heuristic the pipeline knows is one [`AgentKind`] variant. The
//! variant doubles as the claimant tag on the evidence it produces, and
//! dispatch is a plain `match` so the set of agents is closed and
//! checked at compile time.

use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::config::PipelineConfig;
use crate::connection::{self, ConnectionStates};
use crate::error::EngineError;
use crate::inconsistency::{self, InconsistencyStates};
use crate::recommendation::{self, RecommendationStates};
use crate::repository::DataRepository;
use crate::text_agents;
use crate::text_state::TextState;

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    TextExtraction,
    Recommendation,
    Connection,
    Inconsistency,
}

impl StageKind {
    /// Execution order.
    pub const ALL: [StageKind; 4] = [
        StageKind::TextExtraction,
        StageKind::Recommendation,
        StageKind::Connection,
        StageKind::Inconsistency,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TextExtraction => "text-extraction",
            Self::Recommendation => "recommendation",
            Self::Connection => "connection",
            Self::Inconsistency => "inconsistency",
        }
    }

    /// Create this stage's output state unless the repository already
    /// holds one. Returns `true` when a fresh state was inserted.
    pub fn initialize_state(
        self,
        repo: &mut DataRepository,
        config: &PipelineConfig,
    ) -> Result<bool, EngineError> {
        let aggregation = config.evidence.aggregation;
        match self {
            Self::TextExtraction => {
                if repo.contains::<TextState>() {
                    return Ok(false);
                }
                repo.insert(
                    TextState::new(aggregation).with_merge_tolerance(config.text.merge_tolerance),
                );
            }
            Self::Recommendation => {
                if repo.contains::<RecommendationStates>() {
                    return Ok(false);
                }
                repo.insert(RecommendationStates::new(aggregation));
            }
            Self::Connection => {
                if repo.contains::<ConnectionStates>() {
                    return Ok(false);
                }
                repo.insert(ConnectionStates::new(aggregation));
            }
            Self::Inconsistency => {
                if repo.contains::<InconsistencyStates>() {
                    return Ok(false);
                }
                repo.insert(InconsistencyStates::default());
            }
        }
        Ok(true)
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    // Text extraction
    NounExtraction,
    ArticleTypeName,
    DependencyArcs,
    Compound,
    PhraseGrouping,
    // Recommendation
    NameType,
    InstanceName,
    // Connection
    InstantConnection,
    // Inconsistency
    MissingModelInstance,
    UnmatchedTextReference,
    UntracedSentence,
}

impl AgentKind {
    /// Registration order. Within a stage, agents run in this order.
    pub const ALL: [AgentKind; 11] = [
        AgentKind::NounExtraction,
        AgentKind::ArticleTypeName,
        AgentKind::DependencyArcs,
        AgentKind::Compound,
        AgentKind::PhraseGrouping,
        AgentKind::NameType,
        AgentKind::InstanceName,
        AgentKind::InstantConnection,
        AgentKind::MissingModelInstance,
        AgentKind::UnmatchedTextReference,
        AgentKind::UntracedSentence,
    ];

    pub fn stage(self) -> StageKind {
        match self {
            Self::NounExtraction
            | Self::ArticleTypeName
            | Self::DependencyArcs
            | Self::Compound
            | Self::PhraseGrouping => StageKind::TextExtraction,
            Self::NameType | Self::InstanceName => StageKind::Recommendation,
            Self::InstantConnection => StageKind::Connection,
            Self::MissingModelInstance | Self::UnmatchedTextReference | Self::UntracedSentence => {
                StageKind::Inconsistency
            }
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::NounExtraction => "noun-extraction",
            Self::ArticleTypeName => "article-type-name",
            Self::DependencyArcs => "dependency-arcs",
            Self::Compound => "compound",
            Self::PhraseGrouping => "phrase-grouping",
            Self::NameType => "name-type",
            Self::InstanceName => "instance-name",
            Self::InstantConnection => "instant-connection",
            Self::MissingModelInstance => "missing-model-instance",
            Self::UnmatchedTextReference => "unmatched-text-reference",
            Self::UntracedSentence => "untraced-sentence",
        }
    }

    /// Whether the agent runs when no allow-list is configured. The
    /// untraced-sentence baseline only runs when asked for.
    pub fn is_default(self) -> bool {
        !matches!(self, Self::UntracedSentence)
    }

    /// Registered agents of one stage, in execution order.
    pub fn for_stage(stage: StageKind) -> impl Iterator<Item = AgentKind> {
        Self::ALL.into_iter().filter(move |a| a.stage() == stage)
    }

    /// Run this agent against the repository. Agents only read what
    /// earlier stages produced and only write their own stage's state.
    pub fn execute(
        self,
        repo: &mut DataRepository,
        config: &PipelineConfig,
    ) -> Result<(), EngineError> {
        let _span = debug_span!("agent", agent = self.tag()).entered();
        match self {
            Self::NounExtraction => text_agents::extract_nouns(repo, config),
            Self::ArticleTypeName => text_agents::article_type_name(repo, config),
            Self::DependencyArcs => text_agents::dependency_arcs(repo, config),
            Self::Compound => text_agents::compounds(repo, config),
            Self::PhraseGrouping => text_agents::group_phrases(repo, config),
            Self::NameType => recommendation::recommend_by_name_type(repo, config),
            Self::InstanceName => recommendation::recommend_by_instance_name(repo, config),
            Self::InstantConnection => connection::connect_instances(repo, config),
            Self::MissingModelInstance => inconsistency::find_missing_model_instances(repo, config),
            Self::UnmatchedTextReference => {
                inconsistency::find_unmatched_text_references(repo, config)
            }
            Self::UntracedSentence => inconsistency::find_untraced_sentences(repo, config),
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stage_has_agents() {
        for stage in StageKind::ALL {
            assert!(AgentKind::for_stage(stage).count() > 0, "{stage}");
        }
    }

    #[test]
    fn registration_order_follows_stage_order() {
        let stages: Vec<_> = AgentKind::ALL.iter().map(|a| a.stage()).collect();
        let mut sorted = stages.clone();
        sorted.sort();
        assert_eq!(stages, sorted);
    }

    #[test]
    fn tags_round_trip_through_serde() {
        for agent in AgentKind::ALL {
            let json = serde_json::to_string(&agent).unwrap();
            assert_eq!(json, format!("\"{}\"", agent.tag()));
        }
    }

    #[test]
    fn initialize_skips_populated_state() {
        let config = PipelineConfig::default();
        let mut repo = DataRepository::new();
        assert!(StageKind::TextExtraction.initialize_state(&mut repo, &config).unwrap());
        assert!(!StageKind::TextExtraction.initialize_state(&mut repo, &config).unwrap());
        assert!(repo.contains::<TextState>());
    }
}
