//! Recommended instances: text references the pipeline believes denote a
//! model element, kept per model.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::agent::AgentKind;
use crate::confidence::{Aggregation, Confidence};
use crate::config::PipelineConfig;
use crate::error::EngineError;
use crate::repository::{DataRepository, ModelStates, PipelineState, PreprocessingData};
use crate::similarity;
use crate::text_state::{MappingKind, NounMapping, NounMappingId, TextState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecommendedInstanceId(u32);

impl RecommendedInstanceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for RecommendedInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ri#{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendedInstance {
    name: String,
    types: BTreeSet<String>,
    name_mappings: BTreeSet<NounMappingId>,
    type_mappings: BTreeSet<NounMappingId>,
    sentences: BTreeSet<u32>,
    surface_forms: BTreeSet<String>,
    confidence: Confidence,
}

impl RecommendedInstance {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model types this reference is believed to instantiate. Empty when
    /// no type evidence was found.
    pub fn types(&self) -> &BTreeSet<String> {
        &self.types
    }

    pub fn has_type(&self, element_type: &str) -> bool {
        self.types.contains(element_type)
    }

    pub fn name_mappings(&self) -> &BTreeSet<NounMappingId> {
        &self.name_mappings
    }

    pub fn type_mappings(&self) -> &BTreeSet<NounMappingId> {
        &self.type_mappings
    }

    pub fn sentences(&self) -> &BTreeSet<u32> {
        &self.sentences
    }

    /// Every spelling seen in the text, plus the name itself.
    pub fn surface_forms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(
            self.surface_forms
                .iter()
                .map(String::as_str)
                .filter(move |f| *f != self.name),
        )
    }

    pub fn confidence(&self) -> &Confidence {
        &self.confidence
    }

    fn absorb(&mut self, proposal: RecommendationProposal) {
        self.types.extend(proposal.types);
        self.name_mappings.extend(proposal.name_mappings);
        self.type_mappings.extend(proposal.type_mappings);
        self.sentences.extend(proposal.sentences);
        self.surface_forms.extend(proposal.surface_forms);
        self.confidence.combine(&proposal.confidence);
    }
}

/// Evidence for one recommended instance, as produced by an agent.
#[derive(Debug, Clone)]
pub struct RecommendationProposal {
    pub name: String,
    pub types: BTreeSet<String>,
    pub name_mappings: BTreeSet<NounMappingId>,
    pub type_mappings: BTreeSet<NounMappingId>,
    pub sentences: BTreeSet<u32>,
    pub surface_forms: BTreeSet<String>,
    pub confidence: Confidence,
}

impl RecommendationProposal {
    /// Untyped proposal seeded with the mapping's name evidence.
    pub fn from_mapping(id: NounMappingId, mapping: &NounMapping, aggregation: Aggregation) -> Self {
        Self {
            name: mapping.reference().to_string(),
            types: BTreeSet::new(),
            name_mappings: BTreeSet::from([id]),
            type_mappings: BTreeSet::new(),
            sentences: mapping.sentences(),
            surface_forms: mapping.surface_forms().map(str::to_string).collect(),
            confidence: mapping.name_confidence(aggregation),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Recommended instances of one model, keyed by normalized name.
#[derive(Debug, Clone)]
pub struct RecommendationState {
    aggregation: Aggregation,
    instances: Vec<RecommendedInstance>,
    by_key: BTreeMap<String, RecommendedInstanceId>,
}

impl RecommendationState {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            instances: Vec::new(),
            by_key: BTreeMap::new(),
        }
    }

    /// Record a proposal. Proposals with the same normalized name fold
    /// into one instance. A proposal without any evidence, or with a name
    /// that normalizes to nothing, is dropped and `None` returned.
    pub fn add_recommended_instance(
        &mut self,
        proposal: RecommendationProposal,
    ) -> Option<RecommendedInstanceId> {
        if !proposal.confidence.has_value() {
            debug!(name = %proposal.name, "proposal without evidence dropped");
            return None;
        }
        let key = similarity::normalize(&proposal.name);
        if key.is_empty() {
            return None;
        }
        if let Some(&id) = self.by_key.get(&key) {
            self.instances[id.index()].absorb(proposal);
            return Some(id);
        }

        let id = RecommendedInstanceId(self.instances.len() as u32);
        let mut instance = RecommendedInstance {
            name: proposal.name.clone(),
            types: BTreeSet::new(),
            name_mappings: BTreeSet::new(),
            type_mappings: BTreeSet::new(),
            sentences: BTreeSet::new(),
            surface_forms: BTreeSet::new(),
            confidence: Confidence::new(self.aggregation),
        };
        instance.absorb(proposal);
        self.instances.push(instance);
        self.by_key.insert(key, id);
        Some(id)
    }

    pub fn get(&self, id: RecommendedInstanceId) -> Option<&RecommendedInstance> {
        self.instances.get(id.index())
    }

    pub fn find_by_name(&self, name: &str) -> Option<(RecommendedInstanceId, &RecommendedInstance)> {
        let id = *self.by_key.get(&similarity::normalize(name))?;
        Some((id, &self.instances[id.index()]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecommendedInstanceId, &RecommendedInstance)> {
        self.instances
            .iter()
            .enumerate()
            .map(|(i, ri)| (RecommendedInstanceId(i as u32), ri))
    }

    pub fn in_sentence(&self, sentence_no: u32) -> Vec<RecommendedInstanceId> {
        self.iter()
            .filter(|(_, ri)| ri.sentences.contains(&sentence_no))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RecommendationStates {
    aggregation: Aggregation,
    by_model: BTreeMap<String, RecommendationState>,
}

impl PipelineState for RecommendationStates {
    const KEY: &'static str = "recommendation";
}

impl RecommendationStates {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            by_model: BTreeMap::new(),
        }
    }

    pub fn get(&self, model_id: &str) -> Option<&RecommendationState> {
        self.by_model.get(model_id)
    }

    pub fn state_mut(&mut self, model_id: &str) -> &mut RecommendationState {
        let aggregation = self.aggregation;
        self.by_model
            .entry(model_id.to_string())
            .or_insert_with(|| RecommendationState::new(aggregation))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecommendationState)> {
        self.by_model.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

fn commit(
    repo: &mut DataRepository,
    config: &PipelineConfig,
    proposals: Vec<(String, RecommendationProposal)>,
) -> Result<(), EngineError> {
    let min = config.recommendation.min_confidence;
    let states = repo.require_mut::<RecommendationStates>()?;
    let mut recorded = 0usize;
    for (model_id, proposal) in proposals {
        if proposal.confidence.value_or_zero() < min {
            debug!(name = %proposal.name, "proposal below min_confidence");
            continue;
        }
        if states.state_mut(&model_id).add_recommended_instance(proposal).is_some() {
            recorded += 1;
        }
    }
    debug!(recorded, "recommendations recorded");
    Ok(())
}

/// Text-directed: a name mapping next to a word resembling a model type
/// becomes a typed recommendation; a name mapping without such a
/// neighbour becomes an untyped one.
pub(crate) fn recommend_by_name_type(
    repo: &mut DataRepository,
    config: &PipelineConfig,
) -> Result<(), EngineError> {
    let text = repo.require::<PreprocessingData>()?.text.clone();
    let models = repo.require::<ModelStates>()?.snapshot();
    let text_state = repo.require::<TextState>()?;
    let aggregation = config.evidence.aggregation;
    let threshold = config.recommendation.type_similarity_threshold;

    let mut proposals = Vec::new();
    for model in &models {
        let vocabulary = model.types();
        for (id, mapping) in text_state.noun_mappings() {
            if mapping.kind() == MappingKind::Type {
                continue;
            }
            let mut typed = false;
            for position in mapping.positions() {
                let neighbours = [text.previous_word(position), text.next_word(position)];
                for neighbour in neighbours.into_iter().flatten() {
                    let Some(type_id) = text_state.mapping_for_word(neighbour.position) else {
                        continue;
                    };
                    if type_id == id {
                        continue;
                    }
                    let Some(type_mapping) = text_state.noun_mapping(type_id) else {
                        continue;
                    };
                    if !type_mapping.has_evidence(MappingKind::Type)
                        && !type_mapping.has_evidence(MappingKind::NameOrType)
                    {
                        continue;
                    }
                    let matched: BTreeSet<String> = vocabulary
                        .iter()
                        .filter(|t| similarity::matches_any_part(type_mapping.reference(), t, threshold))
                        .cloned()
                        .collect();
                    if matched.is_empty() {
                        continue;
                    }
                    let mut proposal = RecommendationProposal::from_mapping(id, mapping, aggregation);
                    proposal.types = matched;
                    proposal.type_mappings.insert(type_id);
                    proposal
                        .confidence
                        .add(AgentKind::NameType, config.recommendation.name_type_probability);
                    proposals.push((model.id.clone(), proposal));
                    typed = true;
                }
            }
            if !typed && mapping.kind() == MappingKind::Name {
                proposals.push((
                    model.id.clone(),
                    RecommendationProposal::from_mapping(id, mapping, aggregation),
                ));
            }
        }
    }
    commit(repo, config, proposals)
}

/// Model-directed: any mapping whose spelling resembles a model instance
/// name is recommended with that instance's type.
pub(crate) fn recommend_by_instance_name(
    repo: &mut DataRepository,
    config: &PipelineConfig,
) -> Result<(), EngineError> {
    let models = repo.require::<ModelStates>()?.snapshot();
    let text_state = repo.require::<TextState>()?;
    let aggregation = config.evidence.aggregation;

    let mut proposals = Vec::new();
    for model in &models {
        for instance in &model.instances {
            for (id, mapping) in text_state.noun_mappings() {
                let similar = mapping
                    .surface_forms()
                    .any(|form| similarity::are_similar(form, &instance.name, &config.similarity));
                if !similar {
                    continue;
                }
                let mut proposal = RecommendationProposal::from_mapping(id, mapping, aggregation);
                proposal.types.insert(instance.element_type.clone());
                proposal.confidence.add(
                    AgentKind::InstanceName,
                    config.recommendation.instance_name_probability,
                );
                proposals.push((model.id.clone(), proposal));
            }
        }
    }
    commit(repo, config, proposals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::seed_repository;
    use std::sync::Arc;
    use tracelink_core::{Model, ModelInstance, ModelKind, PosTag, Sentence, Text, Word};

    /// "The AuthService component checks the Token."
    fn text() -> Text {
        let words = vec![
            Word::new(0, 1, "The", "the", PosTag::Determiner),
            Word::new(1, 1, "AuthService", "AuthService", PosTag::ProperNoun),
            Word::new(2, 1, "component", "component", PosTag::Noun),
            Word::new(3, 1, "checks", "check", PosTag::Verb),
            Word::new(4, 1, "the", "the", PosTag::Determiner),
            Word::new(5, 1, "Token", "token", PosTag::Noun),
        ];
        Text::new(words, vec![Sentence { number: 1, words: (0..6).collect(), phrases: vec![] }])
    }

    fn model() -> Model {
        Model::new(
            "arch",
            ModelKind::Architecture,
            vec![ModelInstance::new("c1", "AuthService", "BasicComponent")],
        )
    }

    /// Repository after text extraction with noun + article heuristics.
    fn repo() -> DataRepository {
        let config = PipelineConfig::default();
        let mut repo = seed_repository(Arc::new(text()), vec![model()]);
        repo.insert(TextState::new(Aggregation::Max));
        repo.insert(RecommendationStates::new(Aggregation::Max));
        crate::text_agents::extract_nouns(&mut repo, &config).unwrap();
        crate::text_agents::article_type_name(&mut repo, &config).unwrap();
        repo
    }

    fn arch(repo: &DataRepository) -> &RecommendationState {
        repo.get::<RecommendationStates>().unwrap().get("arch").unwrap()
    }

    #[test]
    fn name_next_to_type_word_is_typed() {
        let mut repo = repo();
        recommend_by_name_type(&mut repo, &PipelineConfig::default()).unwrap();
        let (_, ri) = arch(&repo).find_by_name("AuthService").unwrap();
        assert!(ri.has_type("BasicComponent"));
        assert_eq!(ri.type_mappings().len(), 1);
        assert_eq!(ri.confidence().value(), Some(1.0));
        assert_eq!(ri.sentences(), &BTreeSet::from([1]));
    }

    #[test]
    fn instance_name_recommends_with_instance_type() {
        let mut repo = repo();
        recommend_by_instance_name(&mut repo, &PipelineConfig::default()).unwrap();
        let state = arch(&repo);
        assert_eq!(state.len(), 1);
        let (_, ri) = state.find_by_name("auth service").unwrap();
        assert!(ri.has_type("BasicComponent"));
        assert!(ri.confidence().value().unwrap() >= 0.9);
    }

    #[test]
    fn proposals_with_same_name_fold() {
        let mut repo = repo();
        let config = PipelineConfig::default();
        recommend_by_name_type(&mut repo, &config).unwrap();
        recommend_by_instance_name(&mut repo, &config).unwrap();
        let state = arch(&repo);
        let (_, ri) = state.find_by_name("AuthService").unwrap();
        let claimants = ri.confidence().claimants();
        assert!(claimants.contains(&AgentKind::NameType));
        assert!(claimants.contains(&AgentKind::InstanceName));
        assert_eq!(state.iter().filter(|(_, r)| r.name() == "AuthService").count(), 1);
    }

    #[test]
    fn empty_proposal_is_never_recorded() {
        let mut state = RecommendationState::new(Aggregation::Max);
        let proposal = RecommendationProposal {
            name: "Ghost".into(),
            types: BTreeSet::new(),
            name_mappings: BTreeSet::new(),
            type_mappings: BTreeSet::new(),
            sentences: BTreeSet::new(),
            surface_forms: BTreeSet::new(),
            confidence: Confidence::new(Aggregation::Max),
        };
        assert_eq!(state.add_recommended_instance(proposal), None);
        assert!(state.is_empty());
    }

    #[test]
    fn min_confidence_filters_weak_proposals() {
        let mut repo = repo();
        let mut config = PipelineConfig::default();
        config.recommendation.min_confidence = 0.95;
        recommend_by_instance_name(&mut repo, &config).unwrap();
        assert!(repo
            .get::<RecommendationStates>()
            .unwrap()
            .get("arch")
            .is_none());
    }
}
