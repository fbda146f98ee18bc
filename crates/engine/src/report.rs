use serde::Serialize;

use crate::agent::AgentKind;
use crate::confidence::Aggregation;
use crate::connection::ConnectionState;
use crate::inconsistency::{Inconsistency, InconsistencyKind, InconsistencyState};
use crate::recommendation::{RecommendationState, RecommendedInstanceId};
use crate::text_state::{MappingKind, NounMappingId, TextState};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Serializable view of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    pub meta: RunMeta,
    pub summary: TraceSummary,
    pub noun_mappings: Vec<NounMappingRecord>,
    pub models: Vec<ModelReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub engine_version: String,
    pub run_at: String,
    pub aggregation: Aggregation,
    pub acceptance_threshold: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceSummary {
    pub models: usize,
    pub noun_mappings: usize,
    pub phrase_mappings: usize,
    pub recommended_instances: usize,
    pub links: usize,
    pub accepted_links: usize,
    pub inconsistencies: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NounMappingRecord {
    pub id: NounMappingId,
    pub reference: String,
    pub kind: MappingKind,
    pub surface_forms: Vec<String>,
    pub sentences: Vec<u32>,
    pub name_probability: f64,
    pub type_probability: f64,
    pub name_or_type_probability: f64,
    pub claimants: Vec<AgentKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelReport {
    pub model_id: String,
    pub summary: ModelSummary,
    pub recommended_instances: Vec<RecommendationRecord>,
    pub links: Vec<LinkRecord>,
    pub inconsistencies: Vec<Inconsistency>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub recommended_instances: usize,
    pub links: usize,
    pub accepted_links: usize,
    pub missing_model_instances: usize,
    pub unmatched_text_references: usize,
    pub untraced_sentences: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationRecord {
    pub id: RecommendedInstanceId,
    pub name: String,
    pub types: Vec<String>,
    pub sentences: Vec<u32>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkRecord {
    pub model_element_id: String,
    pub model_element_name: String,
    pub model_element_type: String,
    pub sentence_no: u32,
    pub references: Vec<String>,
    pub confidence: f64,
    pub accepted: bool,
    pub claimants: Vec<AgentKind>,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub(crate) fn noun_mapping_records(text: &TextState) -> Vec<NounMappingRecord> {
    text.noun_mappings()
        .map(|(id, m)| NounMappingRecord {
            id,
            reference: m.reference().to_string(),
            kind: m.kind(),
            surface_forms: m.surface_forms().map(str::to_string).collect(),
            sentences: m.sentences().into_iter().collect(),
            name_probability: m.probability(MappingKind::Name),
            type_probability: m.probability(MappingKind::Type),
            name_or_type_probability: m.probability(MappingKind::NameOrType),
            claimants: m.claimants().iter().copied().collect(),
        })
        .collect()
}

pub(crate) fn model_report(
    model_id: &str,
    recommendations: &RecommendationState,
    connections: &ConnectionState,
    inconsistencies: &InconsistencyState,
    acceptance_threshold: f64,
) -> ModelReport {
    let recommended_instances: Vec<RecommendationRecord> = recommendations
        .iter()
        .map(|(id, ri)| RecommendationRecord {
            id,
            name: ri.name().to_string(),
            types: ri.types().iter().cloned().collect(),
            sentences: ri.sentences().iter().copied().collect(),
            confidence: ri.confidence().value_or_zero(),
        })
        .collect();

    let links: Vec<LinkRecord> = connections
        .links()
        .map(|l| LinkRecord {
            model_element_id: l.model_element_id().to_string(),
            model_element_name: l.model_element_name().to_string(),
            model_element_type: l.model_element_type().to_string(),
            sentence_no: l.sentence_no(),
            references: l.references().iter().cloned().collect(),
            confidence: l.value(),
            accepted: l.value() > acceptance_threshold,
            claimants: l.confidence().claimants().into_iter().collect(),
        })
        .collect();

    let summary = ModelSummary {
        recommended_instances: recommended_instances.len(),
        links: links.len(),
        accepted_links: links.iter().filter(|l| l.accepted).count(),
        missing_model_instances: inconsistencies
            .of_kind(InconsistencyKind::MissingModelInstance)
            .count(),
        unmatched_text_references: inconsistencies
            .of_kind(InconsistencyKind::UnmatchedTextReference)
            .count(),
        untraced_sentences: inconsistencies
            .of_kind(InconsistencyKind::UntracedSentence)
            .count(),
    };

    ModelReport {
        model_id: model_id.to_string(),
        summary,
        recommended_instances,
        links,
        inconsistencies: inconsistencies.all().cloned().collect(),
    }
}

pub(crate) fn compute_summary(text: &TextState, models: &[ModelReport]) -> TraceSummary {
    TraceSummary {
        models: models.len(),
        noun_mappings: text.noun_mapping_count(),
        phrase_mappings: text.phrase_mapping_count(),
        recommended_instances: models.iter().map(|m| m.summary.recommended_instances).sum(),
        links: models.iter().map(|m| m.summary.links).sum(),
        accepted_links: models.iter().map(|m| m.summary.accepted_links).sum(),
        inconsistencies: models.iter().map(|m| m.inconsistencies.len()).sum(),
    }
}
