// Result export: JSON report, links CSV, inconsistencies CSV

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracelink_engine::report::TraceReport;

use crate::error::IoError;

/// Pretty-printed JSON report.
pub fn write_report_json(report: &TraceReport, path: &Path) -> Result<(), IoError> {
    let file = File::create(path).map_err(|e| IoError::write(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report).map_err(|e| IoError::json(path, e))?;
    writer.flush().map_err(|e| IoError::write(path, e))
}

#[derive(Debug, Serialize)]
struct LinkRow<'a> {
    model_id: &'a str,
    model_element_id: &'a str,
    model_element_name: &'a str,
    model_element_type: &'a str,
    sentence: u32,
    confidence: f64,
    accepted: bool,
    references: String,
}

#[derive(Debug, Serialize)]
struct InconsistencyRow<'a> {
    model_id: &'a str,
    kind: String,
    sentence: Option<u32>,
    model_element_id: Option<&'a str>,
    name: &'a str,
    reason: &'a str,
}

/// One row per link, across all models, in report order.
pub fn write_links_csv(report: &TraceReport, path: &Path) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| IoError::csv(path, e))?;
    for model in &report.models {
        for link in &model.links {
            let refs: Vec<&str> = link.references.iter().map(String::as_str).collect();
            writer
                .serialize(LinkRow {
                    model_id: &model.model_id,
                    model_element_id: &link.model_element_id,
                    model_element_name: &link.model_element_name,
                    model_element_type: &link.model_element_type,
                    sentence: link.sentence_no,
                    confidence: link.confidence,
                    accepted: link.accepted,
                    references: refs.join("|"),
                })
                .map_err(|e| IoError::csv(path, e))?;
        }
    }
    writer.flush().map_err(|e| IoError::write(path, e))
}

/// One row per inconsistency, across all models, in report order.
pub fn write_inconsistencies_csv(report: &TraceReport, path: &Path) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| IoError::csv(path, e))?;
    for model in &report.models {
        for finding in &model.inconsistencies {
            writer
                .serialize(InconsistencyRow {
                    model_id: &model.model_id,
                    kind: finding.kind.to_string(),
                    sentence: finding.sentence_no,
                    model_element_id: finding.model_element_id.as_deref(),
                    name: &finding.name,
                    reason: &finding.reason,
                })
                .map_err(|e| IoError::csv(path, e))?;
        }
    }
    writer.flush().map_err(|e| IoError::write(path, e))
}
