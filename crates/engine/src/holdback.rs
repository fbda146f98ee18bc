//! Hold-back evaluation: rerun the pipeline once per model element with
//! that element removed and check whether its text mentions surface as
//! unmatched text references where the gold standard says it is mentioned.
//!
//! Runs are independent: each builds its own repository from the shared
//! read-only [`Text`] and the text state of the baseline run, so they
//! execute in parallel.

use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracelink_core::{Model, ModelInstance, Text};
use tracing::info;

use crate::config::PipelineConfig;
use crate::engine::{self, TraceResult};
use crate::error::EngineError;
use crate::evaluation::{EvaluationResult, GoldStandard};
use crate::inconsistency::InconsistencyKind;
use crate::similarity;

#[derive(Debug, Clone)]
pub struct HoldBackRun {
    /// `None` for the baseline run over the complete model.
    pub held_back: Option<ModelInstance>,
    pub result: TraceResult,
}

/// Baseline run first, then one run per instance in model order.
pub fn run_holdback(
    config: &PipelineConfig,
    text: Arc<Text>,
    model: &Model,
) -> Result<Vec<HoldBackRun>, EngineError> {
    info!(model = %model.id, runs = model.instances.len() + 1, "hold-back evaluation");
    let baseline = engine::run(config, text.clone(), std::slice::from_ref(model))?;
    let text_state = baseline.text_state();

    let held: Vec<HoldBackRun> = model
        .instances
        .par_iter()
        .map(|instance| -> Result<HoldBackRun, EngineError> {
            let reduced = model.without(&instance.id);
            let result =
                engine::run_with_text_state(config, text.clone(), &[reduced], text_state.clone())?;
            Ok(HoldBackRun {
                held_back: Some(instance.clone()),
                result,
            })
        })
        .collect::<Result<_, _>>()?;

    let mut runs = Vec::with_capacity(held.len() + 1);
    runs.push(HoldBackRun {
        held_back: None,
        result: baseline,
    });
    runs.extend(held);
    Ok(runs)
}

#[derive(Debug, Clone, Serialize)]
pub struct HeldBackScore {
    pub element_id: String,
    pub element_name: String,
    pub expected_sentences: usize,
    pub result: EvaluationResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldBackEvaluation {
    pub runs: Vec<HeldBackScore>,
    /// Summed confusion counts over all runs.
    pub total: EvaluationResult,
    /// Per-run scores averaged with the number of expected sentences as
    /// weight.
    pub weighted_precision: f64,
    pub weighted_recall: f64,
    pub weighted_f1: f64,
}

/// Score each hold-back run: the sentences where a text reference similar
/// to the held-back element is left unmatched, plus every untraced
/// sentence when that baseline agent ran, against the sentences the gold
/// standard links the element to.
/// `sentence_count` lets the true negatives be derived.
pub fn evaluate_holdback(
    runs: &[HoldBackRun],
    model_id: &str,
    gold: &GoldStandard,
    sentence_count: usize,
) -> Result<HoldBackEvaluation, EngineError> {
    let mut scores = Vec::new();
    for run in runs {
        let Some(instance) = &run.held_back else {
            continue;
        };
        let sim_config = &run.result.config().similarity;
        let findings = run.result.inconsistencies(model_id)?;
        let found: BTreeSet<u32> = findings
            .of_kind(InconsistencyKind::UnmatchedTextReference)
            .filter(|i| similarity::are_similar(&i.name, &instance.name, sim_config))
            .chain(findings.of_kind(InconsistencyKind::UntracedSentence))
            .filter_map(|i| i.sentence_no)
            .collect();
        let expected = gold.sentences_for(&instance.id);
        scores.push(HeldBackScore {
            element_id: instance.id.clone(),
            element_name: instance.name.clone(),
            expected_sentences: expected.len(),
            result: EvaluationResult::compare(&found, &expected).with_universe(sentence_count),
        });
    }

    let total = scores
        .iter()
        .map(|s| s.result)
        .fold(EvaluationResult::default().with_universe(0), |acc, r| acc + r);
    let weight: f64 = scores.iter().map(|s| s.expected_sentences as f64).sum();
    let weighted = |metric: fn(&EvaluationResult) -> f64| {
        if weight == 0.0 {
            return 0.0;
        }
        scores
            .iter()
            .map(|s| metric(&s.result) * s.expected_sentences as f64)
            .sum::<f64>()
            / weight
    };

    Ok(HoldBackEvaluation {
        weighted_precision: weighted(EvaluationResult::precision),
        weighted_recall: weighted(EvaluationResult::recall),
        weighted_f1: weighted(EvaluationResult::f1),
        total,
        runs: scores,
    })
}
