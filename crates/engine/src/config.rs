use serde::{Deserialize, Serialize};

use crate::agent::{AgentKind, StageKind};
use crate::confidence::Aggregation;
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Every tunable of a pipeline run. All sections are optional in TOML;
/// missing values fall back to the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub evidence: EvidenceConfig,
    pub text: TextConfig,
    pub recommendation: RecommendationConfig,
    pub connection: ConnectionConfig,
    pub similarity: SimilarityConfig,
    pub inconsistency: InconsistencyConfig,
    pub agents: AgentsConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvidenceConfig {
    /// Aggregation used for every confidence created during the run.
    pub aggregation: Aggregation,
}

/// Claim probabilities of the text-extraction heuristics.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    pub name_probability: f64,
    pub type_probability: f64,
    pub name_or_type_probability: f64,
    pub compound_probability: f64,
    pub dependency_probability: f64,
    pub phrase_probability: f64,
    /// Extra superset candidates a merge may choose between before it
    /// fails as ambiguous. `0` demands a unique candidate.
    pub merge_tolerance: usize,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            name_probability: 0.9,
            type_probability: 0.8,
            name_or_type_probability: 0.4,
            compound_probability: 0.9,
            dependency_probability: 0.5,
            phrase_probability: 0.6,
            merge_tolerance: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecommendationConfig {
    /// Claim added when a name is seen next to a known model type.
    pub name_type_probability: f64,
    /// Claim added when a mapping resembles a model instance name.
    pub instance_name_probability: f64,
    /// Similarity a text word needs to count as a model type.
    pub type_similarity_threshold: f64,
    /// Proposals below this confidence are not recorded.
    pub min_confidence: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            name_type_probability: 1.0,
            instance_name_probability: 0.9,
            type_similarity_threshold: 0.85,
            min_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Link confidence for a type-compatible match.
    pub probability: f64,
    /// Link confidence for a name-only match. Must stay below `probability`.
    pub probability_without_type: f64,
    /// Links strictly above this value count as accepted.
    pub acceptance_threshold: f64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            probability: 1.0,
            probability_without_type: 0.8,
            acceptance_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimilarityConfig {
    /// Normalized Levenshtein similarity two names need to be "similar".
    pub threshold: f64,
    /// Similarity two identifier parts need when names are compared part-wise.
    pub part_threshold: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            part_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InconsistencyConfig {
    /// Similarity a noun mapping needs to make a sentence a plausible
    /// location for an unlinked model element.
    pub plausibility_threshold: f64,
    /// Unlinked recommendations below this confidence are not reported.
    pub min_recommendation_confidence: f64,
}

impl Default for InconsistencyConfig {
    fn default() -> Self {
        Self {
            plausibility_threshold: 0.6,
            min_recommendation_confidence: 0.5,
        }
    }
}

/// Agent allow-list. `None` enables every agent that runs by default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentsConfig {
    pub enabled: Option<Vec<AgentKind>>,
}

impl AgentsConfig {
    pub fn is_enabled(&self, agent: AgentKind) -> bool {
        match &self.enabled {
            Some(list) => list.contains(&agent),
            None => agent.is_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let probabilities = [
            ("text.name_probability", self.text.name_probability),
            ("text.type_probability", self.text.type_probability),
            ("text.name_or_type_probability", self.text.name_or_type_probability),
            ("text.compound_probability", self.text.compound_probability),
            ("text.dependency_probability", self.text.dependency_probability),
            ("text.phrase_probability", self.text.phrase_probability),
            ("recommendation.name_type_probability", self.recommendation.name_type_probability),
            (
                "recommendation.instance_name_probability",
                self.recommendation.instance_name_probability,
            ),
            (
                "recommendation.type_similarity_threshold",
                self.recommendation.type_similarity_threshold,
            ),
            ("recommendation.min_confidence", self.recommendation.min_confidence),
            ("connection.probability", self.connection.probability),
            (
                "connection.probability_without_type",
                self.connection.probability_without_type,
            ),
            ("connection.acceptance_threshold", self.connection.acceptance_threshold),
            ("similarity.threshold", self.similarity.threshold),
            ("similarity.part_threshold", self.similarity.part_threshold),
            (
                "inconsistency.plausibility_threshold",
                self.inconsistency.plausibility_threshold,
            ),
            (
                "inconsistency.min_recommendation_confidence",
                self.inconsistency.min_recommendation_confidence,
            ),
        ];
        for (key, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::ConfigValidation(format!(
                    "{key} must be within [0, 1], got {value}"
                )));
            }
        }

        // Typed matches must always outrank name-only matches
        if self.connection.probability_without_type >= self.connection.probability {
            return Err(EngineError::ConfigValidation(format!(
                "connection.probability_without_type ({}) must be below connection.probability ({})",
                self.connection.probability_without_type, self.connection.probability
            )));
        }

        if let Some(enabled) = &self.agents.enabled {
            for stage in [StageKind::TextExtraction, StageKind::Connection] {
                if !enabled.iter().any(|a| a.stage() == stage) {
                    return Err(EngineError::ConfigValidation(format!(
                        "agents.enabled leaves the {stage} stage without agents"
                    )));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
