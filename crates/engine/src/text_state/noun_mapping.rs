use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;
use serde::Serialize;
use tracelink_core::Word;

use crate::confidence::{Aggregation, Claimant, Confidence};

/// Arena index of a noun mapping. Stays valid after the mapping is
/// retired; [`TextState`](super::TextState) resolves it to its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NounMappingId(pub(crate) u32);

impl NounMappingId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NounMappingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "nm#{}", self.0)
    }
}

/// What a mapping's words are believed to denote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    Name,
    Type,
    NameOrType,
}

impl std::fmt::Display for MappingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Type => write!(f, "type"),
            Self::NameOrType => write!(f, "name_or_type"),
        }
    }
}

/// Lemma-based key used to recognise repeated mentions of the same
/// reference across the text.
pub(crate) fn reference_key(words: &[&Word]) -> String {
    words
        .iter()
        .map(|w| w.lemma.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn surface_form(words: &[&Word]) -> String {
    words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One occurrence of a reference: the words spelling it, as written and
/// as a lemma key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
struct Mention {
    positions: BTreeSet<usize>,
    form: String,
    key: String,
}

impl Mention {
    fn new(words: &[&Word]) -> Self {
        Self {
            positions: words.iter().map(|w| w.position).collect(),
            form: surface_form(words),
            key: reference_key(words),
        }
    }
}

/// A cluster of words believed to refer to the same thing.
#[derive(Debug, Clone, Serialize)]
pub struct NounMapping {
    /// position -> sentence number
    words: BTreeMap<usize, u32>,
    mentions: BTreeSet<Mention>,
    kinds: BTreeMap<MappingKind, Confidence>,
    claimants: BTreeSet<Claimant>,
}

impl NounMapping {
    pub(crate) fn new(
        words: &[&Word],
        kind: MappingKind,
        aggregation: Aggregation,
        claimant: Claimant,
        score: f64,
    ) -> Self {
        let mut mapping = Self {
            words: BTreeMap::new(),
            mentions: BTreeSet::new(),
            kinds: BTreeMap::new(),
            claimants: BTreeSet::new(),
        };
        mapping.extend(words);
        mapping
            .kinds
            .insert(kind, Confidence::with_claim(aggregation, claimant, score));
        mapping.claimants.insert(claimant);
        mapping
    }

    /// Add another mention. The words must not belong to any other mapping.
    pub(crate) fn extend(&mut self, words: &[&Word]) {
        for w in words {
            self.words.insert(w.position, w.sentence_no);
        }
        self.mentions.insert(Mention::new(words));
    }

    pub(crate) fn add_claim(
        &mut self,
        kind: MappingKind,
        aggregation: Aggregation,
        claimant: Claimant,
        score: f64,
    ) {
        self.kinds
            .entry(kind)
            .or_insert_with(|| Confidence::new(aggregation))
            .add(claimant, score);
        self.claimants.insert(claimant);
    }

    /// Union of both mappings; `claimant` is recorded as a contributor.
    pub(crate) fn merged(&self, other: &NounMapping, claimant: Claimant) -> NounMapping {
        let mut out = self.clone();
        out.words.extend(other.words.iter().map(|(p, s)| (*p, *s)));
        out.mentions.extend(other.mentions.iter().cloned());
        for (kind, confidence) in &other.kinds {
            match out.kinds.get_mut(kind) {
                Some(existing) => existing.combine(confidence),
                None => {
                    out.kinds.insert(*kind, confidence.clone());
                }
            }
        }
        out.claimants.extend(other.claimants.iter().copied());
        out.claimants.insert(claimant);
        out
    }

    /// Split off the mentions touching `positions`, together with every
    /// mention sharing a word with them. Returns `(touching, rest)`, or
    /// `None` when nothing would be left over. Both parts keep the
    /// mapping's evidence.
    pub(crate) fn split(&self, positions: &BTreeSet<usize>) -> Option<(NounMapping, NounMapping)> {
        let mut touched: BTreeSet<usize> = positions
            .iter()
            .copied()
            .filter(|p| self.words.contains_key(p))
            .collect();
        loop {
            let before = touched.len();
            for mention in &self.mentions {
                if !mention.positions.is_disjoint(&touched) {
                    touched.extend(mention.positions.iter().copied());
                }
            }
            if touched.len() == before {
                break;
            }
        }
        if touched.is_empty() || touched.len() == self.words.len() {
            return None;
        }
        let (inside, outside): (BTreeSet<Mention>, BTreeSet<Mention>) = self
            .mentions
            .iter()
            .cloned()
            .partition(|m| !m.positions.is_disjoint(&touched));
        Some((self.part(inside), self.part(outside)))
    }

    fn part(&self, mentions: BTreeSet<Mention>) -> NounMapping {
        let words = self
            .words
            .iter()
            .filter(|(p, _)| mentions.iter().any(|m| m.positions.contains(*p)))
            .map(|(p, s)| (*p, *s))
            .collect();
        NounMapping {
            words,
            mentions,
            kinds: self.kinds.clone(),
            claimants: self.claimants.clone(),
        }
    }

    /// Mentions not contained in a longer mention of this mapping.
    fn maximal_mentions(&self) -> impl Iterator<Item = &Mention> {
        self.mentions.iter().filter(move |m| {
            !self.mentions.iter().any(|other| {
                other.positions.len() > m.positions.len() && other.positions.is_superset(&m.positions)
            })
        })
    }

    pub(crate) fn has_mention(&self, positions: &BTreeSet<usize>) -> bool {
        self.mentions.iter().any(|m| m.positions == *positions)
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.keys().copied()
    }

    pub fn word_set(&self) -> BTreeSet<usize> {
        self.words.keys().copied().collect()
    }

    pub fn contains_word(&self, position: usize) -> bool {
        self.words.contains_key(&position)
    }

    pub fn overlaps(&self, positions: &BTreeSet<usize>) -> bool {
        positions.iter().any(|p| self.words.contains_key(p))
    }

    pub fn covers(&self, positions: &BTreeSet<usize>) -> bool {
        positions.iter().all(|p| self.words.contains_key(p))
    }

    pub fn has_word_set(&self, positions: &BTreeSet<usize>) -> bool {
        self.words.len() == positions.len() && self.covers(positions)
    }

    pub fn sentences(&self) -> BTreeSet<u32> {
        self.words.values().copied().collect()
    }

    pub fn in_sentence(&self, sentence_no: u32) -> bool {
        self.words.values().any(|s| *s == sentence_no)
    }

    /// Distinct spellings, sorted. A word run that only occurs inside a
    /// longer mention ("payment" in "payment gateway") is not a form of
    /// its own.
    pub fn surface_forms(&self) -> impl Iterator<Item = &str> {
        self.maximal_mentions()
            .map(|m| m.form.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
    }

    pub(crate) fn has_reference_key(&self, key: &str) -> bool {
        self.maximal_mentions().any(|m| m.key == key)
    }

    /// The most frequently mentioned surface form. Ties prefer the form
    /// with more words, then the lexically smallest.
    pub fn reference(&self) -> &str {
        let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for mention in self.maximal_mentions() {
            counts
                .entry(mention.form.as_str())
                .or_insert((0, mention.positions.len()))
                .0 += 1;
        }
        counts
            .into_iter()
            .max_by(|(fa, a), (fb, b)| a.cmp(b).then_with(|| fb.cmp(fa)))
            .map(|(form, _)| form)
            .unwrap_or_default()
    }

    pub fn confidence(&self, kind: MappingKind) -> Option<&Confidence> {
        self.kinds.get(&kind)
    }

    /// Value of one kind's confidence, `0.0` when there is no evidence.
    pub fn probability(&self, kind: MappingKind) -> f64 {
        self.kinds.get(&kind).map_or(0.0, Confidence::value_or_zero)
    }

    pub fn has_evidence(&self, kind: MappingKind) -> bool {
        self.kinds.get(&kind).is_some_and(Confidence::has_value)
    }

    /// Kind with the highest confidence. Ties prefer `Name`, then `Type`.
    pub fn kind(&self) -> MappingKind {
        let mut best = (MappingKind::NameOrType, OrderedFloat(f64::NEG_INFINITY));
        for (kind, confidence) in &self.kinds {
            let value = OrderedFloat(confidence.value_or_zero());
            if value > best.1 {
                best = (*kind, value);
            }
        }
        best.0
    }

    /// Name-ish evidence: the `Name` and `NameOrType` confidences combined.
    pub fn name_confidence(&self, aggregation: Aggregation) -> Confidence {
        let mut out = Confidence::new(aggregation);
        for kind in [MappingKind::Name, MappingKind::NameOrType] {
            if let Some(c) = self.kinds.get(&kind) {
                out.combine(c);
            }
        }
        out
    }

    pub fn claimants(&self) -> &BTreeSet<Claimant> {
        &self.claimants
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
