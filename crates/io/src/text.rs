// Annotated text import (JSON)
//
// The pre-processor writes one document per text:
//
//   { "sentences": [ { "words": [ { "text": "AuthService", "lemma": "AuthService",
//                                   "pos": "NNP", "head": 2, "relation": "nsubj" }, ... ],
//                      "phrases": [ { "type": "NP", "words": [0, 1], "children": [] } ] } ] }
//
// `head` and phrase `words` are 0-based indices into the sentence's own
// word list. Sentences are numbered from 1 in document order; word
// positions are assigned globally.

use std::path::Path;

use serde::Deserialize;
use tracelink_core::{DependencyEdge, DependencyTag, Phrase, PhraseType, PosTag, Sentence, Text, Word};
use tracing::info;

use crate::error::IoError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TextDocument {
    sentences: Vec<SentenceDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SentenceDocument {
    words: Vec<WordDocument>,
    #[serde(default)]
    phrases: Vec<PhraseDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WordDocument {
    text: String,
    #[serde(default)]
    lemma: Option<String>,
    pos: String,
    #[serde(default)]
    head: Option<usize>,
    #[serde(default)]
    relation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PhraseDocument {
    #[serde(rename = "type")]
    phrase_type: PhraseType,
    words: Vec<usize>,
    #[serde(default)]
    children: Vec<PhraseDocument>,
}

pub fn load_text(path: &Path) -> Result<Text, IoError> {
    let content = std::fs::read_to_string(path).map_err(|e| IoError::read(path, e))?;
    parse_text(&content, path)
}

/// Parse a text document. `path` is only used in error messages.
pub fn parse_text(content: &str, path: &Path) -> Result<Text, IoError> {
    let doc: TextDocument = serde_json::from_str(content).map_err(|e| IoError::json(path, e))?;

    let mut words: Vec<Word> = Vec::new();
    let mut sentences = Vec::with_capacity(doc.sentences.len());

    for (index, sentence) in doc.sentences.iter().enumerate() {
        let number = index as u32 + 1;
        let offset = words.len();
        let len = sentence.words.len();
        if len == 0 {
            return Err(IoError::invalid(path, format!("sentence {number} has no words")));
        }

        for (i, w) in sentence.words.iter().enumerate() {
            if w.text.trim().is_empty() {
                return Err(IoError::invalid(
                    path,
                    format!("sentence {number}, word {i}: empty text"),
                ));
            }
            let lemma = w.lemma.clone().unwrap_or_else(|| w.text.to_lowercase());
            words.push(Word::new(
                offset + i,
                number,
                &w.text,
                &lemma,
                PosTag::from(w.pos.as_str()),
            ));
        }

        for (i, w) in sentence.words.iter().enumerate() {
            let Some(head) = w.head else {
                continue;
            };
            if head >= len || head == i {
                return Err(IoError::invalid(
                    path,
                    format!("sentence {number}, word {i}: invalid head {head}"),
                ));
            }
            let Some(relation) = &w.relation else {
                return Err(IoError::invalid(
                    path,
                    format!("sentence {number}, word {i}: head without relation"),
                ));
            };
            let tag = DependencyTag::from(relation.clone());
            words[offset + head].outgoing.push(DependencyEdge {
                tag: tag.clone(),
                word: offset + i,
            });
            words[offset + i].incoming.push(DependencyEdge {
                tag,
                word: offset + head,
            });
        }

        let phrases = sentence
            .phrases
            .iter()
            .map(|p| build_phrase(p, number, offset, len, path))
            .collect::<Result<Vec<_>, _>>()?;

        sentences.push(Sentence {
            number,
            words: (offset..offset + len).collect(),
            phrases,
        });
    }

    info!(sentences = sentences.len(), words = words.len(), path = %path.display(), "text loaded");
    Ok(Text::new(words, sentences))
}

fn build_phrase(
    doc: &PhraseDocument,
    sentence_no: u32,
    offset: usize,
    len: usize,
    path: &Path,
) -> Result<Phrase, IoError> {
    if doc.words.is_empty() {
        return Err(IoError::invalid(
            path,
            format!("sentence {sentence_no}: empty {:?} phrase", doc.phrase_type),
        ));
    }
    if let Some(bad) = doc.words.iter().find(|w| **w >= len) {
        return Err(IoError::invalid(
            path,
            format!("sentence {sentence_no}: phrase word {bad} out of range"),
        ));
    }
    let mut words: Vec<usize> = doc.words.iter().map(|w| offset + w).collect();
    words.sort_unstable();
    words.dedup();
    let sub_phrases = doc
        .children
        .iter()
        .map(|c| build_phrase(c, sentence_no, offset, len, path))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Phrase {
        phrase_type: doc.phrase_type,
        sentence_no,
        words,
        sub_phrases,
    })
}
