//! Text-extraction heuristics. Each reads the shared [`Text`] and records
//! evidence in the [`TextState`].

use std::collections::BTreeSet;

use tracelink_core::{DependencyTag, PhraseType, PosTag, Text, Word};
use tracing::debug;

use crate::agent::AgentKind;
use crate::config::PipelineConfig;
use crate::error::EngineError;
use crate::repository::{DataRepository, PreprocessingData};
use crate::text_state::{MappingKind, TextState};

fn is_name_like(word: &Word) -> bool {
    word.pos.is_proper_noun() || (word.pos.is_noun() && word.is_camel_case())
}

fn inputs(repo: &mut DataRepository) -> Result<(std::sync::Arc<Text>, &mut TextState), EngineError> {
    let text = repo.require::<PreprocessingData>()?.text.clone();
    let state = repo.require_mut::<TextState>()?;
    Ok((text, state))
}

/// Proper nouns and camel-case identifiers are names; other nouns could
/// be either a name or a type.
pub(crate) fn extract_nouns(repo: &mut DataRepository, config: &PipelineConfig) -> Result<(), EngineError> {
    let (text, state) = inputs(repo)?;
    let probs = &config.text;
    let claimant = AgentKind::NounExtraction;
    for word in text.words() {
        if is_name_like(word) {
            state.add_or_extend(&[word], MappingKind::Name, claimant, probs.name_probability)?;
        } else if word.pos.is_noun() {
            state.add_or_extend(
                &[word],
                MappingKind::NameOrType,
                claimant,
                probs.name_or_type_probability,
            )?;
        }
    }
    debug!(mappings = state.noun_mapping_count(), "nouns extracted");
    Ok(())
}

/// `<determiner> X Y` with both X and Y nouns: X names an instance of the
/// type Y ("the AuthService component").
pub(crate) fn article_type_name(
    repo: &mut DataRepository,
    config: &PipelineConfig,
) -> Result<(), EngineError> {
    let (text, state) = inputs(repo)?;
    let probs = &config.text;
    let claimant = AgentKind::ArticleTypeName;
    let mut pairs = 0usize;
    for article in text.words().iter().filter(|w| w.pos == PosTag::Determiner) {
        let Some(name) = text.next_word(article.position) else {
            continue;
        };
        let Some(kind) = text.next_word(name.position) else {
            continue;
        };
        if !name.pos.is_noun() || !kind.pos.is_noun() || kind.pos.is_proper_noun() {
            continue;
        }
        state.add_or_extend(&[name], MappingKind::Name, claimant, probs.name_probability)?;
        state.add_or_extend(&[kind], MappingKind::Type, claimant, probs.type_probability)?;
        pairs += 1;
    }
    debug!(pairs, "article-name-type patterns");
    Ok(())
}

/// Subjects and objects of a predicate are likely to denote something in
/// the model.
pub(crate) fn dependency_arcs(
    repo: &mut DataRepository,
    config: &PipelineConfig,
) -> Result<(), EngineError> {
    let (text, state) = inputs(repo)?;
    let claimant = AgentKind::DependencyArcs;
    for word in text.words() {
        if word.pos.is_noun() && word.has_incoming(DependencyTag::is_argument) {
            state.add_or_extend(
                &[word],
                MappingKind::NameOrType,
                claimant,
                config.text.dependency_probability,
            )?;
        }
    }
    Ok(())
}

/// Nouns joined by `compound` arcs form one multi-word name
/// ("payment gateway").
pub(crate) fn compounds(repo: &mut DataRepository, config: &PipelineConfig) -> Result<(), EngineError> {
    let (text, state) = inputs(repo)?;
    let claimant = AgentKind::Compound;
    for head in text.words().iter().filter(|w| w.pos.is_noun()) {
        let mut parts: Vec<&Word> = head
            .outgoing
            .iter()
            .filter(|e| e.tag == DependencyTag::Compound)
            .filter_map(|e| text.word(e.word))
            .filter(|w| w.pos.is_noun() && w.sentence_no == head.sentence_no)
            .collect();
        if parts.is_empty() {
            continue;
        }
        parts.push(head);
        parts.sort_by_key(|w| w.position);
        parts.dedup_by_key(|w| w.position);
        let id = state.add_or_extend(&parts, MappingKind::Name, claimant, config.text.compound_probability)?;
        debug!(head = %head.text, mapping = %id, words = parts.len(), "compound");
    }
    Ok(())
}

/// Noun phrases group the noun mappings of the words they span.
pub(crate) fn group_phrases(
    repo: &mut DataRepository,
    config: &PipelineConfig,
) -> Result<(), EngineError> {
    let (text, state) = inputs(repo)?;
    let claimant = AgentKind::PhraseGrouping;
    for phrase in text.phrases() {
        if phrase.phrase_type != PhraseType::NounPhrase {
            continue;
        }
        let members: BTreeSet<_> = phrase
            .words
            .iter()
            .filter_map(|p| state.mapping_for_word(*p))
            .collect();
        if members.is_empty() {
            continue;
        }
        state.add_phrase_mapping(phrase, &members, claimant, config.text.phrase_probability)?;
    }
    debug!(phrase_mappings = state.phrase_mapping_count(), "phrases grouped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::seed_repository;
    use std::sync::Arc;
    use tracelink_core::{DependencyEdge, Phrase, Sentence};

    /// "The AuthService component uses the payment gateway."
    fn text() -> Text {
        let mut words = vec![
            Word::new(0, 1, "The", "the", PosTag::Determiner),
            Word::new(1, 1, "AuthService", "AuthService", PosTag::ProperNoun),
            Word::new(2, 1, "component", "component", PosTag::Noun),
            Word::new(3, 1, "uses", "use", PosTag::Verb),
            Word::new(4, 1, "the", "the", PosTag::Determiner),
            Word::new(5, 1, "payment", "payment", PosTag::Noun),
            Word::new(6, 1, "gateway", "gateway", PosTag::Noun),
        ];
        words[6].outgoing.push(DependencyEdge { tag: DependencyTag::Compound, word: 5 });
        words[5].incoming.push(DependencyEdge { tag: DependencyTag::Compound, word: 6 });
        words[6].incoming.push(DependencyEdge { tag: DependencyTag::Object, word: 3 });
        let phrases = vec![
            Phrase {
                phrase_type: PhraseType::NounPhrase,
                sentence_no: 1,
                words: vec![0, 1, 2],
                sub_phrases: vec![],
            },
            Phrase {
                phrase_type: PhraseType::NounPhrase,
                sentence_no: 1,
                words: vec![4, 5, 6],
                sub_phrases: vec![],
            },
        ];
        Text::new(words, vec![Sentence { number: 1, words: (0..7).collect(), phrases }])
    }

    fn repo() -> DataRepository {
        let mut repo = seed_repository(Arc::new(text()), Vec::new());
        repo.insert(TextState::new(Default::default()));
        repo
    }

    fn state(repo: &DataRepository) -> &TextState {
        repo.get::<TextState>().unwrap()
    }

    #[test]
    fn nouns_become_mappings() {
        let mut repo = repo();
        extract_nouns(&mut repo, &PipelineConfig::default()).unwrap();
        let s = state(&repo);
        assert_eq!(s.noun_mapping_count(), 4);
        let auth = s.noun_mapping(s.mapping_for_word(1).unwrap()).unwrap();
        assert_eq!(auth.kind(), MappingKind::Name);
        let comp = s.noun_mapping(s.mapping_for_word(2).unwrap()).unwrap();
        assert_eq!(comp.kind(), MappingKind::NameOrType);
    }

    #[test]
    fn article_pattern_marks_name_and_type() {
        let mut repo = repo();
        let config = PipelineConfig::default();
        extract_nouns(&mut repo, &config).unwrap();
        article_type_name(&mut repo, &config).unwrap();
        let s = state(&repo);
        let comp = s.noun_mapping(s.mapping_for_word(2).unwrap()).unwrap();
        assert_eq!(comp.kind(), MappingKind::Type);
        assert!(comp.claimants().contains(&AgentKind::ArticleTypeName));
        let payment = s.noun_mapping(s.mapping_for_word(5).unwrap()).unwrap();
        assert!(payment.has_evidence(MappingKind::Name));
    }

    #[test]
    fn compound_merges_words() {
        let mut repo = repo();
        let config = PipelineConfig::default();
        extract_nouns(&mut repo, &config).unwrap();
        compounds(&mut repo, &config).unwrap();
        let s = state(&repo);
        assert!(s.is_disjoint());
        let id = s.mapping_for_word(5).unwrap();
        assert_eq!(s.mapping_for_word(6), Some(id));
        assert_eq!(s.noun_mapping(id).unwrap().reference(), "payment gateway");
    }

    #[test]
    fn dependency_arcs_bump_arguments() {
        let mut repo = repo();
        dependency_arcs(&mut repo, &PipelineConfig::default()).unwrap();
        let s = state(&repo);
        assert_eq!(s.noun_mapping_count(), 1);
        let m = s.noun_mapping(s.mapping_for_word(6).unwrap()).unwrap();
        assert_eq!(m.probability(MappingKind::NameOrType), 0.5);
    }

    #[test]
    fn noun_phrases_group_mappings() {
        let mut repo = repo();
        let config = PipelineConfig::default();
        extract_nouns(&mut repo, &config).unwrap();
        compounds(&mut repo, &config).unwrap();
        group_phrases(&mut repo, &config).unwrap();
        let s = state(&repo);
        assert_eq!(s.phrase_mapping_count(), 2);
        let (_, first) = s.phrase_mappings().next().unwrap();
        assert_eq!(first.noun_mappings().len(), 2);
    }

    #[test]
    fn missing_text_state_is_reported() {
        let mut repo = seed_repository(Arc::new(text()), Vec::new());
        let err = extract_nouns(&mut repo, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::MissingState("text")));
    }
}
