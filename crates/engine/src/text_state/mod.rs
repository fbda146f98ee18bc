//! Text-level evidence: noun mappings and the phrase mappings that group
//! them.
//!
//! Mappings live in append-only arenas. Merging never edits a mapping in
//! place: it appends the union and retires both operands, leaving a
//! tombstone that points at the successor. Ids held by other states stay
//! meaningful and resolve through [`TextState::current`].
//!
//! Invariants:
//! - every word belongs to at most one live noun mapping (checked by
//!   [`TextState::is_disjoint`])
//! - a retired slot is never revived
//! - no two live phrase mappings share phrase type and member set

mod noun_mapping;
mod phrase_mapping;

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;
use tracelink_core::{Phrase, PhraseType, Word};
use tracing::debug;

pub use noun_mapping::{MappingKind, NounMapping, NounMappingId};
pub use phrase_mapping::{PhraseMapping, PhraseMappingId, PhraseOccurrence};

use crate::confidence::{Aggregation, Claimant, Confidence};
use crate::error::EngineError;
use crate::repository::PipelineState;

#[derive(Debug, Clone)]
struct Slot<T, Id> {
    value: T,
    retired: bool,
    successor: Option<Id>,
}

impl<T, Id> Slot<T, Id> {
    fn live(value: T) -> Self {
        Self {
            value,
            retired: false,
            successor: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextState {
    aggregation: Aggregation,
    merge_tolerance: usize,
    nouns: Vec<Slot<NounMapping, NounMappingId>>,
    phrases: Vec<Slot<PhraseMapping, PhraseMappingId>>,
}

impl PipelineState for TextState {
    const KEY: &'static str = "text";
}

impl TextState {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            merge_tolerance: 0,
            nouns: Vec::new(),
            phrases: Vec::new(),
        }
    }

    /// Let a retired merge operand resolve to one of up to
    /// `1 + tolerance` covering mappings, the one with the fewest words.
    pub fn with_merge_tolerance(mut self, tolerance: usize) -> Self {
        self.merge_tolerance = tolerance;
        self
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    // -----------------------------------------------------------------------
    // Noun mapping queries
    // -----------------------------------------------------------------------

    /// A live mapping. Retired ids yield `None`; resolve them first.
    pub fn noun_mapping(&self, id: NounMappingId) -> Option<&NounMapping> {
        self.nouns
            .get(id.index())
            .filter(|s| !s.retired)
            .map(|s| &s.value)
    }

    pub fn is_live(&self, id: NounMappingId) -> bool {
        self.noun_mapping(id).is_some()
    }

    pub fn successor(&self, id: NounMappingId) -> Option<NounMappingId> {
        self.nouns.get(id.index())?.successor
    }

    /// Follow the successor chain to the live mapping that absorbed `id`.
    pub fn current(&self, id: NounMappingId) -> Option<NounMappingId> {
        let mut id = id;
        loop {
            let slot = self.nouns.get(id.index())?;
            if !slot.retired {
                return Some(id);
            }
            id = slot.successor?;
        }
    }

    /// Live mappings in creation order.
    pub fn noun_mappings(&self) -> impl Iterator<Item = (NounMappingId, &NounMapping)> {
        self.nouns
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.retired)
            .map(|(i, s)| (NounMappingId(i as u32), &s.value))
    }

    pub fn noun_mapping_count(&self) -> usize {
        self.nouns.iter().filter(|s| !s.retired).count()
    }

    /// Arena size including retired slots.
    pub fn noun_slot_count(&self) -> usize {
        self.nouns.len()
    }

    pub fn mapping_for_word(&self, position: usize) -> Option<NounMappingId> {
        self.noun_mappings()
            .find(|(_, m)| m.contains_word(position))
            .map(|(id, _)| id)
    }

    pub fn mappings_in_sentence(&self, sentence_no: u32) -> Vec<NounMappingId> {
        self.noun_mappings()
            .filter(|(_, m)| m.in_sentence(sentence_no))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn mappings_of_kind(&self, kind: MappingKind) -> Vec<NounMappingId> {
        self.noun_mappings()
            .filter(|(_, m)| m.kind() == kind)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn is_disjoint(&self) -> bool {
        let mut seen = FxHashSet::default();
        self.noun_mappings()
            .flat_map(|(_, m)| m.positions())
            .all(|p| seen.insert(p))
    }

    // -----------------------------------------------------------------------
    // Noun mapping updates
    // -----------------------------------------------------------------------

    /// Record that `words` denote a `kind`.
    ///
    /// - same word set as a live mapping, or as one of its mentions: the
    ///   claim is added to it
    /// - no overlap, but a mapping already holds the same reference:
    ///   the mention extends that mapping
    /// - no overlap at all: a new mapping is created
    /// - partial overlap: each overlapped mapping gives up the mentions
    ///   that do not touch `words`, then a new mapping is created and
    ///   merged with what is left of them
    pub fn add_or_extend(
        &mut self,
        words: &[&Word],
        kind: MappingKind,
        claimant: Claimant,
        score: f64,
    ) -> Result<NounMappingId, EngineError> {
        if words.is_empty() {
            return Err(EngineError::EmptyReference);
        }
        let aggregation = self.aggregation;
        let positions: BTreeSet<usize> = words.iter().map(|w| w.position).collect();

        let exact = self
            .live_ids()
            .find(|id| self.noun_value(*id).has_word_set(&positions))
            .or_else(|| {
                self.live_ids()
                    .find(|id| self.noun_value(*id).has_mention(&positions))
            });
        if let Some(id) = exact {
            self.noun_value_mut(id).add_claim(kind, aggregation, claimant, score);
            return Ok(id);
        }

        let key = noun_mapping::reference_key(words);
        let overlapping: Vec<NounMappingId> = self
            .live_ids()
            .filter(|id| self.noun_value(*id).overlaps(&positions))
            .collect();

        if overlapping.is_empty() {
            let same_reference = self
                .live_ids()
                .find(|id| self.noun_value(*id).has_reference_key(&key));
            if let Some(id) = same_reference {
                let mapping = self.noun_value_mut(id);
                mapping.extend(words);
                mapping.add_claim(kind, aggregation, claimant, score);
                return Ok(id);
            }
            return Ok(self.push_noun(NounMapping::new(words, kind, aggregation, claimant, score)));
        }

        let mut to_merge: Vec<NounMappingId> = overlapping
            .into_iter()
            .map(|id| self.split_off(id, &positions))
            .collect();
        let same_reference = self
            .live_ids()
            .find(|id| self.noun_value(*id).has_reference_key(&key));
        if let Some(id) = same_reference {
            if !to_merge.contains(&id) {
                to_merge.push(id);
            }
        }
        let fresh = self.push_noun(NounMapping::new(words, kind, aggregation, claimant, score));
        debug!(
            mapping = %fresh,
            overlapping = to_merge.len(),
            "partial overlap, merging"
        );
        self.merge(fresh, &to_merge, claimant)
    }

    /// Move the mentions of `id` unrelated to `positions` into a mapping of
    /// their own. Returns the mapping holding the related part.
    fn split_off(&mut self, id: NounMappingId, positions: &BTreeSet<usize>) -> NounMappingId {
        let Some((inside, outside)) = self.noun_value(id).split(positions) else {
            return id;
        };
        let inside = self.push_noun(inside);
        let outside = self.push_noun(outside);
        self.retire_noun(id, inside);
        debug!(mapping = %id, %inside, %outside, "split unrelated mentions");
        inside
    }

    /// Add a claim to a mapping, following its successor chain if it was
    /// merged away since the caller saw it.
    pub fn add_claim(
        &mut self,
        id: NounMappingId,
        kind: MappingKind,
        claimant: Claimant,
        score: f64,
    ) -> Result<NounMappingId, EngineError> {
        let id = self.current(id).ok_or(EngineError::UnknownNounMapping(id))?;
        let aggregation = self.aggregation;
        self.noun_value_mut(id).add_claim(kind, aggregation, claimant, score);
        Ok(id)
    }

    /// Fold `to_merge` into `target`, left to right. Each step appends the
    /// union of the running result and the next operand and retires both.
    ///
    /// An operand retired by an earlier step (or by anyone else) is
    /// replaced by the live mapping covering its words. No such mapping,
    /// or more candidates than the merge tolerance allows, aborts the
    /// merge with an error.
    pub fn merge(
        &mut self,
        target: NounMappingId,
        to_merge: &[NounMappingId],
        claimant: Claimant,
    ) -> Result<NounMappingId, EngineError> {
        let mut current = self.resolve_for_merge(target)?;
        for &id in to_merge {
            let operand = self.resolve_for_merge(id)?;
            if operand == current {
                continue;
            }
            let merged = self
                .noun_value(current)
                .merged(self.noun_value(operand), claimant);
            let next = self.push_noun(merged);
            self.retire_noun(current, next);
            self.retire_noun(operand, next);
            current = next;
        }
        self.redirect_phrase_members();
        Ok(current)
    }

    fn resolve_for_merge(&self, id: NounMappingId) -> Result<NounMappingId, EngineError> {
        let slot = self
            .nouns
            .get(id.index())
            .ok_or(EngineError::UnknownNounMapping(id))?;
        if !slot.retired {
            return Ok(id);
        }
        let words = slot.value.word_set();
        let candidates: Vec<NounMappingId> = self
            .live_ids()
            .filter(|c| self.noun_value(*c).covers(&words))
            .collect();
        if candidates.len() > 1 + self.merge_tolerance {
            return Err(EngineError::AmbiguousMerge {
                mapping: id,
                candidates: candidates.len(),
            });
        }
        candidates
            .into_iter()
            .min_by_key(|c| (self.noun_value(*c).len(), *c))
            .ok_or(EngineError::LostMergeTarget { mapping: id })
    }

    fn live_ids(&self) -> impl Iterator<Item = NounMappingId> + '_ {
        self.nouns
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.retired)
            .map(|(i, _)| NounMappingId(i as u32))
    }

    fn noun_value(&self, id: NounMappingId) -> &NounMapping {
        &self.nouns[id.index()].value
    }

    fn noun_value_mut(&mut self, id: NounMappingId) -> &mut NounMapping {
        &mut self.nouns[id.index()].value
    }

    fn push_noun(&mut self, mapping: NounMapping) -> NounMappingId {
        let id = NounMappingId(self.nouns.len() as u32);
        self.nouns.push(Slot::live(mapping));
        id
    }

    fn retire_noun(&mut self, id: NounMappingId, successor: NounMappingId) {
        let slot = &mut self.nouns[id.index()];
        slot.retired = true;
        slot.successor = Some(successor);
    }

    // -----------------------------------------------------------------------
    // Phrase mappings
    // -----------------------------------------------------------------------

    pub fn phrase_mapping(&self, id: PhraseMappingId) -> Option<&PhraseMapping> {
        self.phrases
            .get(id.index())
            .filter(|s| !s.retired)
            .map(|s| &s.value)
    }

    pub fn current_phrase(&self, id: PhraseMappingId) -> Option<PhraseMappingId> {
        let mut id = id;
        loop {
            let slot = self.phrases.get(id.index())?;
            if !slot.retired {
                return Some(id);
            }
            id = slot.successor?;
        }
    }

    pub fn phrase_mappings(&self) -> impl Iterator<Item = (PhraseMappingId, &PhraseMapping)> {
        self.phrases
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.retired)
            .map(|(i, s)| (PhraseMappingId(i as u32), &s.value))
    }

    pub fn phrase_mapping_count(&self) -> usize {
        self.phrases.iter().filter(|s| !s.retired).count()
    }

    pub fn phrase_mappings_for(&self, noun: NounMappingId) -> Vec<PhraseMappingId> {
        self.phrase_mappings()
            .filter(|(_, p)| p.noun_mappings().contains(&noun))
            .map(|(id, _)| id)
            .collect()
    }

    /// Group the noun mappings found in `phrase`. An identical live group
    /// (same phrase type, same members) absorbs the occurrence instead.
    pub fn add_phrase_mapping(
        &mut self,
        phrase: &Phrase,
        noun_mappings: &BTreeSet<NounMappingId>,
        claimant: Claimant,
        score: f64,
    ) -> Result<PhraseMappingId, EngineError> {
        if noun_mappings.is_empty() {
            return Err(EngineError::EmptyReference);
        }
        let members = noun_mappings
            .iter()
            .map(|id| self.current(*id).ok_or(EngineError::UnknownNounMapping(*id)))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let existing = self.phrase_mappings().find(|(_, p)| {
            p.phrase_type() == phrase.phrase_type && *p.noun_mappings() == members
        });
        if let Some((id, _)) = existing {
            self.phrases[id.index()]
                .value
                .add_occurrence(phrase, claimant, score);
            return Ok(id);
        }

        let confidence = Confidence::with_claim(self.aggregation, claimant, score);
        let id = PhraseMappingId(self.phrases.len() as u32);
        self.phrases
            .push(Slot::live(PhraseMapping::new(phrase, members, confidence)));
        Ok(id)
    }

    /// Add a member. Returns the id the phrase mapping lives on afterwards,
    /// which differs from `id` if the change made it a duplicate.
    pub fn add_noun_mapping_to_phrase(
        &mut self,
        id: PhraseMappingId,
        noun: NounMappingId,
    ) -> Result<PhraseMappingId, EngineError> {
        let noun = self
            .current(noun)
            .ok_or(EngineError::UnknownNounMapping(noun))?;
        self.live_phrase_mut(id)?.noun_mappings_mut().insert(noun);
        self.consolidate_phrases();
        self.current_phrase(id)
            .ok_or(EngineError::UnknownPhraseMapping(id))
    }

    /// Remove a member. A phrase mapping left without members is retired
    /// and `None` is returned.
    pub fn remove_noun_mapping_from_phrase(
        &mut self,
        id: PhraseMappingId,
        noun: NounMappingId,
    ) -> Result<Option<PhraseMappingId>, EngineError> {
        let noun = self.current(noun).unwrap_or(noun);
        let members = self.live_phrase_mut(id)?.noun_mappings_mut();
        members.remove(&noun);
        if members.is_empty() {
            self.phrases[id.index()].retired = true;
            return Ok(None);
        }
        self.consolidate_phrases();
        Ok(self.current_phrase(id))
    }

    pub fn merge_phrase_mappings(
        &mut self,
        a: PhraseMappingId,
        b: PhraseMappingId,
    ) -> Result<PhraseMappingId, EngineError> {
        let left = self.phrase_mapping(a).ok_or(EngineError::UnknownPhraseMapping(a))?;
        let right = self.phrase_mapping(b).ok_or(EngineError::UnknownPhraseMapping(b))?;
        if a == b {
            return Ok(a);
        }
        let merged = left.merged(right);
        let id = PhraseMappingId(self.phrases.len() as u32);
        self.phrases.push(Slot::live(merged));
        for old in [a, b] {
            let slot = &mut self.phrases[old.index()];
            slot.retired = true;
            slot.successor = Some(id);
        }
        Ok(id)
    }

    fn live_phrase_mut(&mut self, id: PhraseMappingId) -> Result<&mut PhraseMapping, EngineError> {
        self.phrases
            .get_mut(id.index())
            .filter(|s| !s.retired)
            .map(|s| &mut s.value)
            .ok_or(EngineError::UnknownPhraseMapping(id))
    }

    /// Point phrase members at the live successors of merged noun
    /// mappings, then fold phrase mappings that became identical.
    fn redirect_phrase_members(&mut self) {
        for index in 0..self.phrases.len() {
            if self.phrases[index].retired {
                continue;
            }
            let members: BTreeSet<NounMappingId> = self.phrases[index]
                .value
                .noun_mappings()
                .iter()
                .map(|id| self.current(*id).unwrap_or(*id))
                .collect();
            *self.phrases[index].value.noun_mappings_mut() = members;
        }
        self.consolidate_phrases();
    }

    fn consolidate_phrases(&mut self) {
        let mut seen: BTreeMap<(PhraseType, BTreeSet<NounMappingId>), PhraseMappingId> =
            BTreeMap::new();
        let len = self.phrases.len();
        for index in 0..len {
            if self.phrases[index].retired {
                continue;
            }
            let id = PhraseMappingId(index as u32);
            let value = &self.phrases[index].value;
            let key = (value.phrase_type(), value.noun_mappings().clone());
            match seen.get(&key).copied() {
                Some(first) => {
                    if let Ok(merged) = self.merge_phrase_mappings(first, id) {
                        debug!(%first, %id, %merged, "folded identical phrase mappings");
                        seen.insert(key, merged);
                    }
                }
                None => {
                    seen.insert(key, id);
                }
            }
        }
    }
}
