//! `tlr run` and `tlr validate`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracelink_engine::{evaluate_links, run};
use tracelink_io::gold::load_gold_standard;
use tracelink_io::model::load_models;
use tracelink_io::report::{write_inconsistencies_csv, write_links_csv, write_report_json};
use tracelink_io::text::load_text;
use tracing::info;

use crate::{load_config, CliError};

#[derive(Args)]
pub struct RunArgs {
    /// Annotated text document (JSON)
    #[arg(long)]
    pub text: PathBuf,

    /// Model document (JSON); repeat for several models
    #[arg(long = "model", required = true)]
    pub models: Vec<PathBuf>,

    /// Pipeline configuration (TOML); defaults apply when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the JSON report to stdout
    #[arg(long)]
    pub json: bool,

    /// Write the JSON report to a file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write all links as CSV
    #[arg(long)]
    pub links_csv: Option<PathBuf>,

    /// Write all inconsistencies as CSV
    #[arg(long)]
    pub inconsistencies_csv: Option<PathBuf>,

    /// Score accepted links against a gold standard (summary on stderr)
    #[arg(long)]
    pub gold: Option<PathBuf>,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let text = load_text(&args.text)?;
    let models = load_models(&args.models)?;
    let gold = args.gold.as_deref().map(load_gold_standard).transpose()?;
    info!(
        sentences = text.sentences().len(),
        models = models.len(),
        aggregation = %config.evidence.aggregation,
        "inputs loaded"
    );

    let result = run(&config, Arc::new(text), &models)?;
    let report = result.report();

    if let Some(path) = &args.output {
        write_report_json(&report, path)?;
        eprintln!("wrote {}", path.display());
    }
    if let Some(path) = &args.links_csv {
        write_links_csv(&report, path)?;
        eprintln!("wrote {}", path.display());
    }
    if let Some(path) = &args.inconsistencies_csv {
        write_inconsistencies_csv(&report, path)?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json}");
    }

    // Human summary to stderr
    let s = &report.summary;
    eprintln!(
        "{} model(s): {} noun mappings, {} recommended instances, {} links ({} accepted), {} inconsistencies",
        s.models, s.noun_mappings, s.recommended_instances, s.links, s.accepted_links, s.inconsistencies,
    );
    for model in &report.models {
        let m = &model.summary;
        eprintln!(
            "  {}: {} accepted links, {} missing model elements, {} unmatched text references",
            model.model_id, m.accepted_links, m.missing_model_instances, m.unmatched_text_references,
        );
        if m.untraced_sentences > 0 {
            eprintln!("  {}: {} untraced sentences", model.model_id, m.untraced_sentences);
        }
    }

    if let Some(gold) = &gold {
        let threshold = config.connection.acceptance_threshold;
        for model_id in result.model_ids() {
            let score = evaluate_links(result.connections(model_id)?, gold, threshold);
            eprintln!(
                "  {}: precision {:.3}, recall {:.3}, F1 {:.3}",
                model_id,
                score.precision(),
                score.recall(),
                score.f1(),
            );
        }
    }

    Ok(())
}

pub fn cmd_validate(config_path: PathBuf, json: bool) -> Result<(), CliError> {
    let config = load_config(Some(&config_path))?;

    if json {
        let out = serde_json::to_string_pretty(&config)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{out}");
    }

    let enabled = match &config.agents.enabled {
        Some(list) => list.len().to_string(),
        None => "all".to_string(),
    };
    eprintln!(
        "{}: valid (aggregation {}, acceptance threshold {}, agents {})",
        config_path.display(),
        config.evidence.aggregation,
        config.connection.acceptance_threshold,
        enabled,
    );
    Ok(())
}
