//! Trace links between model elements and sentences.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracelink_core::ModelInstance;
use tracing::{debug, warn};

use crate::agent::AgentKind;
use crate::confidence::{Aggregation, Claimant, Confidence};
use crate::config::PipelineConfig;
use crate::error::EngineError;
use crate::recommendation::{RecommendationStates, RecommendedInstance, RecommendedInstanceId};
use crate::repository::{DataRepository, ModelStates, PipelineState};
use crate::similarity;

/// One (model element, sentence) pair. Repeated evidence for the same
/// pair is folded into the same link.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceLink {
    model_element_id: String,
    model_element_name: String,
    model_element_type: String,
    sentence_no: u32,
    recommended_instances: BTreeSet<RecommendedInstanceId>,
    references: BTreeSet<String>,
    confidence: Confidence,
}

impl InstanceLink {
    pub fn model_element_id(&self) -> &str {
        &self.model_element_id
    }

    pub fn model_element_name(&self) -> &str {
        &self.model_element_name
    }

    pub fn model_element_type(&self) -> &str {
        &self.model_element_type
    }

    pub fn sentence_no(&self) -> u32 {
        self.sentence_no
    }

    pub fn recommended_instances(&self) -> &BTreeSet<RecommendedInstanceId> {
        &self.recommended_instances
    }

    /// Names of the recommended instances behind this link.
    pub fn references(&self) -> &BTreeSet<String> {
        &self.references
    }

    pub fn confidence(&self) -> &Confidence {
        &self.confidence
    }

    pub fn value(&self) -> f64 {
        self.confidence.value_or_zero()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionState {
    aggregation: Aggregation,
    links: BTreeMap<(String, u32), InstanceLink>,
}

impl ConnectionState {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            links: BTreeMap::new(),
        }
    }

    /// Link `instance` to every sentence `recommended` occurs in. Returns
    /// the number of links touched.
    pub fn add_to_links(
        &mut self,
        id: RecommendedInstanceId,
        recommended: &RecommendedInstance,
        instance: &ModelInstance,
        claimant: Claimant,
        probability: f64,
    ) -> usize {
        let aggregation = self.aggregation;
        for &sentence_no in recommended.sentences() {
            let link = self
                .links
                .entry((instance.id.clone(), sentence_no))
                .or_insert_with(|| InstanceLink {
                    model_element_id: instance.id.clone(),
                    model_element_name: instance.name.clone(),
                    model_element_type: instance.element_type.clone(),
                    sentence_no,
                    recommended_instances: BTreeSet::new(),
                    references: BTreeSet::new(),
                    confidence: Confidence::new(aggregation),
                });
            link.recommended_instances.insert(id);
            link.references.insert(recommended.name().to_string());
            link.confidence.add(claimant, probability);
        }
        recommended.sentences().len()
    }

    /// All links, ordered by (element id, sentence).
    pub fn links(&self) -> impl Iterator<Item = &InstanceLink> {
        self.links.values()
    }

    pub fn link(&self, element_id: &str, sentence_no: u32) -> Option<&InstanceLink> {
        self.links.get(&(element_id.to_string(), sentence_no))
    }

    pub fn links_for_element<'a>(&'a self, element_id: &'a str) -> impl Iterator<Item = &'a InstanceLink> {
        self.links
            .range((element_id.to_string(), 0)..=(element_id.to_string(), u32::MAX))
            .map(|(_, link)| link)
    }

    pub fn links_in_sentence(&self, sentence_no: u32) -> Vec<&InstanceLink> {
        self.links
            .values()
            .filter(|l| l.sentence_no == sentence_no)
            .collect()
    }

    /// Links whose confidence is strictly above `threshold`.
    pub fn accepted_links(&self, threshold: f64) -> Vec<&InstanceLink> {
        self.links.values().filter(|l| l.value() > threshold).collect()
    }

    pub fn is_element_linked(&self, element_id: &str, threshold: f64) -> bool {
        self.links_for_element(element_id).any(|l| l.value() > threshold)
    }

    pub fn is_recommendation_linked(&self, id: RecommendedInstanceId) -> bool {
        self.links
            .values()
            .any(|l| l.recommended_instances.contains(&id))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionStates {
    aggregation: Aggregation,
    by_model: BTreeMap<String, ConnectionState>,
}

impl PipelineState for ConnectionStates {
    const KEY: &'static str = "connection";
}

impl ConnectionStates {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            by_model: BTreeMap::new(),
        }
    }

    pub fn get(&self, model_id: &str) -> Option<&ConnectionState> {
        self.by_model.get(model_id)
    }

    pub fn state_mut(&mut self, model_id: &str) -> &mut ConnectionState {
        let aggregation = self.aggregation;
        self.by_model
            .entry(model_id.to_string())
            .or_insert_with(|| ConnectionState::new(aggregation))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConnectionState)> {
        self.by_model.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

struct LinkProposal {
    model_id: String,
    id: RecommendedInstanceId,
    recommended: RecommendedInstance,
    instance: ModelInstance,
    probability: f64,
}

/// Two strategies, run in order for every model:
///
/// 1. direct name: each model element is linked to the recommended
///    instances whose spelling is most similar to its name (ties are all
///    kept). Type-compatible matches get `probability`, the others
///    `probability_without_type`.
/// 2. similarity: every recommended instance similar to an element by
///    name is linked with `probability`, whatever its types. Under `max`
///    aggregation this lifts untyped direct matches, so
///    `probability_without_type` only shows in the link's claims or under
///    other aggregations.
pub(crate) fn connect_instances(
    repo: &mut DataRepository,
    config: &PipelineConfig,
) -> Result<(), EngineError> {
    let models = repo.require::<ModelStates>()?.snapshot();
    let recommendations = repo.require::<RecommendationStates>()?;
    let typed = config.connection.probability;
    let untyped = config.connection.probability_without_type;

    let mut proposals = Vec::new();
    for model in &models {
        let Some(state) = recommendations.get(&model.id) else {
            debug!(model = %model.id, "no recommendations, nothing to connect");
            continue;
        };
        let candidates: Vec<(RecommendedInstanceId, &RecommendedInstance)> = state.iter().collect();

        for instance in &model.instances {
            let scores = candidates
                .iter()
                .map(|(_, ri)| similarity::max_similarity(ri.surface_forms(), &instance.name));
            for index in similarity::best_matches(scores, config.similarity.threshold) {
                let (id, ri) = candidates[index];
                let probability = if ri.has_type(&instance.element_type) { typed } else { untyped };
                proposals.push(LinkProposal {
                    model_id: model.id.clone(),
                    id,
                    recommended: ri.clone(),
                    instance: instance.clone(),
                    probability,
                });
            }
        }

        for (id, ri) in &candidates {
            for instance in &model.instances {
                let similar = ri
                    .surface_forms()
                    .any(|f| similarity::are_similar(f, &instance.name, &config.similarity));
                if similar {
                    proposals.push(LinkProposal {
                        model_id: model.id.clone(),
                        id: *id,
                        recommended: (*ri).clone(),
                        instance: instance.clone(),
                        probability: typed,
                    });
                }
            }
        }
    }

    let states = repo.require_mut::<ConnectionStates>()?;
    let mut touched = 0usize;
    for p in proposals {
        if !p.recommended.confidence().has_value() {
            warn!(
                recommendation = %p.recommended.name(),
                element = %p.instance.id,
                "recommendation without evidence, link skipped"
            );
            continue;
        }
        touched += states.state_mut(&p.model_id).add_to_links(
            p.id,
            &p.recommended,
            &p.instance,
            AgentKind::InstantConnection,
            p.probability,
        );
    }
    debug!(touched, "links recorded");
    Ok(())
}
