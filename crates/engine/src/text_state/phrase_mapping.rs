use std::collections::BTreeSet;

use serde::Serialize;
use tracelink_core::{Phrase, PhraseType};

use super::NounMappingId;
use crate::confidence::{Claimant, Confidence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PhraseMappingId(pub(crate) u32);

impl PhraseMappingId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for PhraseMappingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pm#{}", self.0)
    }
}

/// One occurrence of a grouped phrase in the text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PhraseOccurrence {
    pub sentence_no: u32,
    pub words: Vec<usize>,
}

impl From<&Phrase> for PhraseOccurrence {
    fn from(phrase: &Phrase) -> Self {
        let mut words = phrase.words.clone();
        words.sort_unstable();
        Self {
            sentence_no: phrase.sentence_no,
            words,
        }
    }
}

/// Noun mappings that co-occur in phrases of one type.
///
/// Two live phrase mappings never share both phrase type and noun-mapping
/// set; [`TextState`](super::TextState) folds such pairs together.
#[derive(Debug, Clone, Serialize)]
pub struct PhraseMapping {
    phrase_type: PhraseType,
    occurrences: BTreeSet<PhraseOccurrence>,
    noun_mappings: BTreeSet<NounMappingId>,
    confidence: Confidence,
}

impl PhraseMapping {
    pub(crate) fn new(
        phrase: &Phrase,
        noun_mappings: BTreeSet<NounMappingId>,
        confidence: Confidence,
    ) -> Self {
        Self {
            phrase_type: phrase.phrase_type,
            occurrences: BTreeSet::from([PhraseOccurrence::from(phrase)]),
            noun_mappings,
            confidence,
        }
    }

    pub(crate) fn add_occurrence(&mut self, phrase: &Phrase, claimant: Claimant, score: f64) {
        self.occurrences.insert(PhraseOccurrence::from(phrase));
        self.confidence.add(claimant, score);
    }

    pub(crate) fn merged(&self, other: &PhraseMapping) -> PhraseMapping {
        let mut out = self.clone();
        out.occurrences.extend(other.occurrences.iter().cloned());
        out.noun_mappings.extend(other.noun_mappings.iter().copied());
        out.confidence.combine(&other.confidence);
        out
    }

    pub(crate) fn noun_mappings_mut(&mut self) -> &mut BTreeSet<NounMappingId> {
        &mut self.noun_mappings
    }

    pub fn phrase_type(&self) -> PhraseType {
        self.phrase_type
    }

    pub fn occurrences(&self) -> impl Iterator<Item = &PhraseOccurrence> {
        self.occurrences.iter()
    }

    pub fn noun_mappings(&self) -> &BTreeSet<NounMappingId> {
        &self.noun_mappings
    }

    pub fn confidence(&self) -> &Confidence {
        &self.confidence
    }

    pub fn sentences(&self) -> BTreeSet<u32> {
        self.occurrences.iter().map(|o| o.sentence_no).collect()
    }
}
