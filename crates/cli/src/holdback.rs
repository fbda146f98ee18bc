//! `tlr holdback`: hold-back evaluation of inconsistency detection.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracelink_engine::{evaluate_holdback, run_holdback, HoldBackEvaluation};
use tracelink_io::gold::load_gold_standard;
use tracelink_io::model::load_model;
use tracelink_io::text::load_text;

use crate::exit_codes::EXIT_BELOW_MINIMUM;
use crate::{load_config, CliError};

#[derive(Serialize)]
struct HoldBackOutput<'a> {
    model_id: &'a str,
    sentences: usize,
    #[serde(flatten)]
    evaluation: &'a HoldBackEvaluation,
}

pub fn cmd_holdback(
    text_path: PathBuf,
    model_path: PathBuf,
    gold_path: PathBuf,
    config_path: Option<PathBuf>,
    json: bool,
    min_f1: Option<f64>,
) -> Result<(), CliError> {
    if let Some(min) = min_f1 {
        if !(0.0..=1.0).contains(&min) {
            return Err(CliError::usage(format!("--min-f1 must be in [0, 1], got {min}")));
        }
    }
    let config = load_config(config_path.as_deref())?;
    let text = Arc::new(load_text(&text_path)?);
    let model = load_model(&model_path)?;
    let gold = load_gold_standard(&gold_path)?;

    let sentences = text.sentences().len();
    let runs = run_holdback(&config, text, &model)?;
    let evaluation = evaluate_holdback(&runs, &model.id, &gold, sentences)?;

    if json {
        let out = HoldBackOutput {
            model_id: &model.id,
            sentences,
            evaluation: &evaluation,
        };
        let json = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json}");
    }

    for score in &evaluation.runs {
        let r = &score.result;
        eprintln!(
            "  without {} ({}): {} expected, tp {} fp {} fn {}, F1 {:.3}",
            score.element_name,
            score.element_id,
            score.expected_sentences,
            r.true_positives,
            r.false_positives,
            r.false_negatives,
            r.f1(),
        );
    }
    eprintln!(
        "hold-back over {} element(s): weighted precision {:.3}, recall {:.3}, F1 {:.3}",
        evaluation.runs.len(),
        evaluation.weighted_precision,
        evaluation.weighted_recall,
        evaluation.weighted_f1,
    );

    if let Some(min) = min_f1 {
        if evaluation.weighted_f1 < min {
            return Err(CliError::new(
                EXIT_BELOW_MINIMUM,
                format!("weighted F1 {:.3} is below --min-f1 {min}", evaluation.weighted_f1),
            ));
        }
    }
    Ok(())
}
