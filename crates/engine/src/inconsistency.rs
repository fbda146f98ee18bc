//! Inconsistencies between text and model.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::connection::{ConnectionState, ConnectionStates};
use crate::error::EngineError;
use crate::recommendation::RecommendationStates;
use crate::repository::{DataRepository, ModelStates, PipelineState, PreprocessingData};
use crate::similarity;
use crate::text_state::TextState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// A model element the text never (confidently) mentions.
    MissingModelInstance,
    /// A confident text reference with no model element behind it.
    UnmatchedTextReference,
    /// A sentence no accepted link traces to the model.
    UntracedSentence,
}

impl std::fmt::Display for InconsistencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingModelInstance => write!(f, "missing_model_instance"),
            Self::UnmatchedTextReference => write!(f, "unmatched_text_reference"),
            Self::UntracedSentence => write!(f, "untraced_sentence"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Inconsistency {
    /// `None` when no sentence is a plausible location.
    pub sentence_no: Option<u32>,
    pub model_element_id: Option<String>,
    pub kind: InconsistencyKind,
    pub name: String,
    pub reason: String,
}

/// Findings for one model, kept sorted by (sentence, element, kind, name).
/// Sentence-less findings sort first.
#[derive(Debug, Clone, Default)]
pub struct InconsistencyState {
    items: BTreeSet<Inconsistency>,
}

impl InconsistencyState {
    /// Returns `false` if an identical finding was already recorded.
    pub fn add(&mut self, inconsistency: Inconsistency) -> bool {
        self.items.insert(inconsistency)
    }

    pub fn all(&self) -> impl Iterator<Item = &Inconsistency> {
        self.items.iter()
    }

    pub fn of_kind(&self, kind: InconsistencyKind) -> impl Iterator<Item = &Inconsistency> {
        self.items.iter().filter(move |i| i.kind == kind)
    }

    pub fn for_element<'a>(&'a self, element_id: &'a str) -> impl Iterator<Item = &'a Inconsistency> {
        self.items
            .iter()
            .filter(move |i| i.model_element_id.as_deref() == Some(element_id))
    }

    pub fn in_sentence(&self, sentence_no: u32) -> impl Iterator<Item = &Inconsistency> {
        self.items
            .iter()
            .filter(move |i| i.sentence_no == Some(sentence_no))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InconsistencyStates {
    by_model: BTreeMap<String, InconsistencyState>,
}

impl PipelineState for InconsistencyStates {
    const KEY: &'static str = "inconsistency";
}

impl InconsistencyStates {
    pub fn get(&self, model_id: &str) -> Option<&InconsistencyState> {
        self.by_model.get(model_id)
    }

    pub fn state_mut(&mut self, model_id: &str) -> &mut InconsistencyState {
        self.by_model.entry(model_id.to_string()).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InconsistencyState)> {
        self.by_model.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

fn commit(
    repo: &mut DataRepository,
    findings: Vec<(String, Inconsistency)>,
) -> Result<(), EngineError> {
    let states = repo.require_mut::<InconsistencyStates>()?;
    let mut added = 0usize;
    for (model_id, finding) in findings {
        if states.state_mut(&model_id).add(finding) {
            added += 1;
        }
    }
    info!(added, "inconsistencies recorded");
    Ok(())
}

/// Every model element without an accepted link is reported once per
/// sentence that plausibly mentions it, or once without a sentence when
/// no sentence does.
pub(crate) fn find_missing_model_instances(
    repo: &mut DataRepository,
    config: &PipelineConfig,
) -> Result<(), EngineError> {
    let models = repo.require::<ModelStates>()?.snapshot();
    let text_state = repo.require::<TextState>()?;
    let connections = repo.require::<ConnectionStates>()?;
    let empty = ConnectionState::new(config.evidence.aggregation);
    let acceptance = config.connection.acceptance_threshold;
    let plausibility = config.inconsistency.plausibility_threshold;

    let mut findings = Vec::new();
    for model in &models {
        let links = connections.get(&model.id).unwrap_or(&empty);
        for instance in &model.instances {
            if links.is_element_linked(&instance.id, acceptance) {
                continue;
            }
            let plausible: BTreeSet<u32> = text_state
                .noun_mappings()
                .filter(|(_, m)| {
                    similarity::max_similarity(m.surface_forms(), &instance.name) >= plausibility
                })
                .flat_map(|(_, m)| m.sentences())
                .collect();
            debug!(element = %instance.id, sentences = plausible.len(), "unlinked model element");

            let finding = |sentence_no: Option<u32>| Inconsistency {
                sentence_no,
                model_element_id: Some(instance.id.clone()),
                kind: InconsistencyKind::MissingModelInstance,
                name: instance.name.clone(),
                reason: match sentence_no {
                    Some(_) => format!(
                        "{} '{}' is not linked, but this sentence mentions a similar name",
                        instance.element_type, instance.name
                    ),
                    None => format!(
                        "{} '{}' is not mentioned in the text",
                        instance.element_type, instance.name
                    ),
                },
            };
            if plausible.is_empty() {
                findings.push((model.id.clone(), finding(None)));
            } else {
                for sentence_no in plausible {
                    findings.push((model.id.clone(), finding(Some(sentence_no))));
                }
            }
        }
    }
    commit(repo, findings)
}

/// Confident recommendations that no link uses point at text the model
/// does not cover. Reported once per sentence the reference occurs in.
pub(crate) fn find_unmatched_text_references(
    repo: &mut DataRepository,
    config: &PipelineConfig,
) -> Result<(), EngineError> {
    let models = repo.require::<ModelStates>()?.snapshot();
    let recommendations = repo.require::<RecommendationStates>()?;
    let connections = repo.require::<ConnectionStates>()?;
    let empty = ConnectionState::new(config.evidence.aggregation);
    let min = config.inconsistency.min_recommendation_confidence;

    let mut findings = Vec::new();
    for model in &models {
        let Some(state) = recommendations.get(&model.id) else {
            continue;
        };
        let links = connections.get(&model.id).unwrap_or(&empty);
        for (id, ri) in state.iter() {
            if ri.confidence().value_or_zero() < min || links.is_recommendation_linked(id) {
                continue;
            }
            for &sentence_no in ri.sentences() {
                findings.push((
                    model.id.clone(),
                    Inconsistency {
                        sentence_no: Some(sentence_no),
                        model_element_id: None,
                        kind: InconsistencyKind::UnmatchedTextReference,
                        name: ri.name().to_string(),
                        reason: format!("'{}' has no counterpart in model '{}'", ri.name(), model.id),
                    },
                ));
            }
        }
    }
    commit(repo, findings)
}

/// Baseline: every sentence without an accepted link to the model is
/// reported. Off unless named in the agent allow-list.
pub(crate) fn find_untraced_sentences(
    repo: &mut DataRepository,
    config: &PipelineConfig,
) -> Result<(), EngineError> {
    let text = repo.require::<PreprocessingData>()?.text.clone();
    let models = repo.require::<ModelStates>()?.snapshot();
    let connections = repo.require::<ConnectionStates>()?;
    let empty = ConnectionState::new(config.evidence.aggregation);
    let acceptance = config.connection.acceptance_threshold;

    let mut findings = Vec::new();
    for model in &models {
        let links = connections.get(&model.id).unwrap_or(&empty);
        let traced: BTreeSet<u32> = links
            .accepted_links(acceptance)
            .into_iter()
            .map(|l| l.sentence_no())
            .collect();
        for sentence in text.sentences() {
            if traced.contains(&sentence.number) {
                continue;
            }
            let name = text
                .words_in_sentence(sentence.number)
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            findings.push((
                model.id.clone(),
                Inconsistency {
                    sentence_no: Some(sentence.number),
                    model_element_id: None,
                    kind: InconsistencyKind::UntracedSentence,
                    name,
                    reason: format!("sentence {} is not traced to model '{}'", sentence.number, model.id),
                },
            ));
        }
    }
    commit(repo, findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentKind;
    use crate::confidence::{Aggregation, Confidence};
    use crate::recommendation::RecommendationProposal;
    use crate::repository::seed_repository;
    use crate::text_state::MappingKind;
    use std::sync::Arc;
    use tracelink_core::{Model, ModelInstance, ModelKind, PosTag, Sentence, Text, Word};

    /// Sentence 1: "AuthService checks tokens."  Sentence 2: "The gateway pays."
    fn text() -> Text {
        let words = vec![
            Word::new(0, 1, "AuthService", "AuthService", PosTag::ProperNoun),
            Word::new(1, 1, "checks", "check", PosTag::Verb),
            Word::new(2, 1, "tokens", "token", PosTag::NounPlural),
            Word::new(3, 2, "The", "the", PosTag::Determiner),
            Word::new(4, 2, "gateway", "gateway", PosTag::Noun),
            Word::new(5, 2, "pays", "pay", PosTag::Verb),
        ];
        Text::new(
            words,
            vec![
                Sentence { number: 1, words: vec![0, 1, 2], phrases: vec![] },
                Sentence { number: 2, words: vec![3, 4, 5], phrases: vec![] },
            ],
        )
    }

    fn seeded(model: Model) -> DataRepository {
        let text = Arc::new(text());
        let mut repo = seed_repository(text.clone(), vec![model]);
        let mut state = TextState::new(Aggregation::Max);
        for w in text.words().iter().filter(|w| w.pos.is_noun()) {
            state
                .add_or_extend(&[w], MappingKind::Name, AgentKind::NounExtraction, 0.9)
                .unwrap();
        }
        repo.insert(state);
        repo.insert(RecommendationStates::new(Aggregation::Max));
        repo.insert(ConnectionStates::new(Aggregation::Max));
        repo.insert(InconsistencyStates::default());
        repo
    }

    fn findings(repo: &DataRepository) -> Vec<Inconsistency> {
        repo.get::<InconsistencyStates>()
            .unwrap()
            .get("arch")
            .map(|s| s.all().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn unlinked_element_without_plausible_sentence() {
        let model = Model::new(
            "arch",
            ModelKind::Architecture,
            vec![ModelInstance::new("db", "UserDatabase", "Component")],
        );
        let mut repo = seeded(model);
        find_missing_model_instances(&mut repo, &PipelineConfig::default()).unwrap();
        let found = findings(&repo);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sentence_no, None);
        assert_eq!(found[0].model_element_id.as_deref(), Some("db"));
        assert_eq!(found[0].kind, InconsistencyKind::MissingModelInstance);
    }

    #[test]
    fn unlinked_element_reported_in_plausible_sentence() {
        let model = Model::new(
            "arch",
            ModelKind::Architecture,
            vec![ModelInstance::new("gw", "Gateways", "Component")],
        );
        let mut repo = seeded(model);
        find_missing_model_instances(&mut repo, &PipelineConfig::default()).unwrap();
        let found = findings(&repo);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sentence_no, Some(2));
    }

    #[test]
    fn accepted_link_suppresses_finding() {
        let instance = ModelInstance::new("c1", "AuthService", "Component");
        let model = Model::new("arch", ModelKind::Architecture, vec![instance.clone()]);
        let mut repo = seeded(model);
        let mut recs = crate::recommendation::RecommendationState::new(Aggregation::Max);
        let id = recs
            .add_recommended_instance(RecommendationProposal {
                name: "AuthService".into(),
                types: BTreeSet::new(),
                name_mappings: BTreeSet::new(),
                type_mappings: BTreeSet::new(),
                sentences: BTreeSet::from([1]),
                surface_forms: BTreeSet::new(),
                confidence: Confidence::with_claim(Aggregation::Max, AgentKind::NameType, 0.9),
            })
            .unwrap();
        let ri = recs.get(id).unwrap().clone();
        repo.get_mut::<ConnectionStates>()
            .unwrap()
            .state_mut("arch")
            .add_to_links(id, &ri, &instance, AgentKind::InstantConnection, 0.8);
        *repo.get_mut::<RecommendationStates>().unwrap().state_mut("arch") = recs;

        let config = PipelineConfig::default();
        find_missing_model_instances(&mut repo, &config).unwrap();
        find_unmatched_text_references(&mut repo, &config).unwrap();
        assert!(findings(&repo).is_empty());
    }

    #[test]
    fn unlinked_recommendation_is_unmatched_reference() {
        let model = Model::new("arch", ModelKind::Architecture, vec![]);
        let mut repo = seeded(model);
        repo.get_mut::<RecommendationStates>()
            .unwrap()
            .state_mut("arch")
            .add_recommended_instance(RecommendationProposal {
                name: "Scheduler".into(),
                types: BTreeSet::new(),
                name_mappings: BTreeSet::new(),
                type_mappings: BTreeSet::new(),
                sentences: BTreeSet::from([2, 1]),
                surface_forms: BTreeSet::new(),
                confidence: Confidence::with_claim(Aggregation::Max, AgentKind::NameType, 0.7),
            });
        find_unmatched_text_references(&mut repo, &PipelineConfig::default()).unwrap();
        let found = findings(&repo);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].sentence_no, Some(1));
        assert_eq!(found[1].sentence_no, Some(2));
        assert!(found.iter().all(|f| f.model_element_id.is_none()));
    }

    #[test]
    fn sentences_without_accepted_link_are_untraced() {
        let instance = ModelInstance::new("c1", "AuthService", "Component");
        let model = Model::new("arch", ModelKind::Architecture, vec![instance.clone()]);
        let mut repo = seeded(model);
        let mut recs = crate::recommendation::RecommendationState::new(Aggregation::Max);
        let id = recs
            .add_recommended_instance(RecommendationProposal {
                name: "AuthService".into(),
                types: BTreeSet::new(),
                name_mappings: BTreeSet::new(),
                type_mappings: BTreeSet::new(),
                sentences: BTreeSet::from([1]),
                surface_forms: BTreeSet::new(),
                confidence: Confidence::with_claim(Aggregation::Max, AgentKind::NameType, 0.9),
            })
            .unwrap();
        let ri = recs.get(id).unwrap().clone();
        repo.get_mut::<ConnectionStates>()
            .unwrap()
            .state_mut("arch")
            .add_to_links(id, &ri, &instance, AgentKind::InstantConnection, 1.0);

        find_untraced_sentences(&mut repo, &PipelineConfig::default()).unwrap();
        let found = findings(&repo);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, InconsistencyKind::UntracedSentence);
        assert_eq!(found[0].sentence_no, Some(2));
        assert_eq!(found[0].name, "The gateway pays");
        assert_eq!(found[0].model_element_id, None);
    }

    #[test]
    fn weak_link_leaves_sentence_untraced() {
        let instance = ModelInstance::new("c1", "AuthService", "Component");
        let model = Model::new("arch", ModelKind::Architecture, vec![instance.clone()]);
        let mut repo = seeded(model);
        let mut recs = crate::recommendation::RecommendationState::new(Aggregation::Max);
        let id = recs
            .add_recommended_instance(RecommendationProposal {
                name: "AuthService".into(),
                types: BTreeSet::new(),
                name_mappings: BTreeSet::new(),
                type_mappings: BTreeSet::new(),
                sentences: BTreeSet::from([1]),
                surface_forms: BTreeSet::new(),
                confidence: Confidence::with_claim(Aggregation::Max, AgentKind::NameType, 0.9),
            })
            .unwrap();
        let ri = recs.get(id).unwrap().clone();
        let config = PipelineConfig::default();
        repo.get_mut::<ConnectionStates>().unwrap().state_mut("arch").add_to_links(
            id,
            &ri,
            &instance,
            AgentKind::InstantConnection,
            config.connection.acceptance_threshold,
        );

        find_untraced_sentences(&mut repo, &config).unwrap();
        let sentences: Vec<_> = findings(&repo).iter().map(|f| f.sentence_no).collect();
        assert_eq!(sentences, vec![Some(1), Some(2)]);
    }

    #[test]
    fn findings_are_deduplicated_and_ordered() {
        let mut state = InconsistencyState::default();
        let make = |s: Option<u32>, id: &str| Inconsistency {
            sentence_no: s,
            model_element_id: Some(id.to_string()),
            kind: InconsistencyKind::MissingModelInstance,
            name: id.to_string(),
            reason: String::new(),
        };
        assert!(state.add(make(Some(3), "b")));
        assert!(state.add(make(None, "z")));
        assert!(state.add(make(Some(3), "a")));
        assert!(!state.add(make(Some(3), "a")));
        let order: Vec<_> = state
            .all()
            .map(|i| (i.sentence_no, i.model_element_id.clone().unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![(None, "z".into()), (Some(3), "a".into()), (Some(3), "b".into())]
        );
        assert_eq!(state.for_element("a").count(), 1);
        assert_eq!(state.in_sentence(3).count(), 2);
    }
}
