// Gold standard import (CSV/TSV)
//
// One expected trace link per row, with a header naming the columns:
//
//   modelElementID,sentence
//   _xyz123,4
//
// `model_element_id` is accepted as well. Sentences are 1-based.

use std::path::Path;

use tracelink_engine::GoldStandard;
use tracing::info;

use crate::error::IoError;
use crate::read_file_as_utf8;

const ELEMENT_COLUMNS: &[&str] = &["modelelementid", "model_element_id", "element_id"];
const SENTENCE_COLUMNS: &[&str] = &["sentence", "sentence_no"];

pub fn load_gold_standard(path: &Path) -> Result<GoldStandard, IoError> {
    let content = read_file_as_utf8(path)?;
    parse_gold_standard(&content, path)
}

pub fn parse_gold_standard(content: &str, path: &Path) -> Result<GoldStandard, IoError> {
    let delimiter = sniff_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(|e| IoError::csv(path, e))?.clone();
    let column = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.contains(&h.to_ascii_lowercase().as_str()))
    };
    let element_col = column(ELEMENT_COLUMNS)
        .ok_or_else(|| IoError::invalid(path, "missing model element id column"))?;
    let sentence_col =
        column(SENTENCE_COLUMNS).ok_or_else(|| IoError::invalid(path, "missing sentence column"))?;

    let mut links = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(|e| IoError::csv(path, e))?;
        // Header is line 1
        let line = row + 2;
        let element = record.get(element_col).unwrap_or_default();
        let sentence = record.get(sentence_col).unwrap_or_default();
        if element.is_empty() && sentence.is_empty() {
            continue;
        }
        if element.is_empty() {
            return Err(IoError::invalid(path, format!("line {line}: empty model element id")));
        }
        let sentence_no: u32 = sentence.parse().map_err(|_| {
            IoError::invalid(path, format!("line {line}: invalid sentence number '{sentence}'"))
        })?;
        if sentence_no == 0 {
            return Err(IoError::invalid(path, format!("line {line}: sentences are numbered from 1")));
        }
        links.push((element.to_string(), sentence_no));
    }

    let gold = GoldStandard::new(links);
    info!(links = gold.len(), path = %path.display(), "gold standard loaded");
    Ok(gold)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b','];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map_or(1, |r| r.len())
            })
            .collect();

        let Some(&target) = counts.first() else {
            continue;
        };
        if target <= 1 {
            continue;
        }
        let score = counts.iter().filter(|&&c| c == target).count() * target;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}
