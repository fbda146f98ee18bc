//! End-to-end runs over small hand-annotated texts.

use std::sync::Arc;

use tracelink_core::{
    DependencyEdge, DependencyTag, Model, ModelInstance, ModelKind, Phrase, PhraseType, PosTag,
    Sentence, Text, Word,
};
use tracelink_engine::{
    evaluate_holdback, run, run_holdback, run_with_text_state, AgentKind, GoldStandard,
    InconsistencyKind, MappingKind, PipelineConfig, TextState,
};

fn word(position: usize, sentence_no: u32, text: &str, pos: PosTag) -> Word {
    Word::new(position, sentence_no, text, &text.to_lowercase(), pos)
}

fn np(sentence_no: u32, words: &[usize]) -> Phrase {
    Phrase {
        phrase_type: PhraseType::NounPhrase,
        sentence_no,
        words: words.to_vec(),
        sub_phrases: vec![],
    }
}

/// "The AuthService checks the Token."
fn auth_text() -> Text {
    let words = vec![
        word(0, 1, "The", PosTag::Determiner),
        word(1, 1, "AuthService", PosTag::ProperNoun),
        word(2, 1, "checks", PosTag::Verb),
        word(3, 1, "the", PosTag::Determiner),
        word(4, 1, "Token", PosTag::Noun),
    ];
    Text::new(
        words,
        vec![Sentence {
            number: 1,
            words: vec![0, 1, 2, 3, 4],
            phrases: vec![np(1, &[0, 1]), np(1, &[3, 4])],
        }],
    )
}

/// Sentence 1 as in [`auth_text`], sentence 2: "The PaymentGateway charges cards."
fn two_sentence_text() -> Text {
    let mut words = auth_text().words().to_vec();
    words.extend([
        word(5, 2, "The", PosTag::Determiner),
        word(6, 2, "PaymentGateway", PosTag::ProperNoun),
        word(7, 2, "charges", PosTag::Verb),
        word(8, 2, "cards", PosTag::NounPlural),
    ]);
    Text::new(
        words,
        vec![
            Sentence {
                number: 1,
                words: vec![0, 1, 2, 3, 4],
                phrases: vec![np(1, &[0, 1]), np(1, &[3, 4])],
            },
            Sentence {
                number: 2,
                words: vec![5, 6, 7, 8],
                phrases: vec![np(2, &[5, 6]), np(2, &[8])],
            },
        ],
    )
}

fn model(instances: Vec<ModelInstance>) -> Model {
    Model::new("arch", ModelKind::Architecture, instances)
}

fn auth_service() -> ModelInstance {
    ModelInstance::new("c1", "AuthService", "Component")
}

fn payment_gateway() -> ModelInstance {
    ModelInstance::new("c2", "PaymentGateway", "Component")
}

#[test]
fn mentioned_component_is_linked() {
    let config = PipelineConfig::default();
    let result = run(&config, Arc::new(auth_text()), &[model(vec![auth_service()])]).unwrap();

    let recommendations = result.recommendations("arch").unwrap();
    let (_, ri) = recommendations.find_by_name("AuthService").unwrap();
    assert!(ri.confidence().value_or_zero() >= 0.9);
    assert!(ri.has_type("Component"));

    let connections = result.connections("arch").unwrap();
    let link = connections.link("c1", 1).unwrap();
    assert_eq!(link.value(), config.connection.probability);
    assert_eq!(connections.len(), 1);

    let inconsistencies = result.inconsistencies("arch").unwrap();
    assert_eq!(
        inconsistencies
            .for_element("c1")
            .filter(|i| i.kind == InconsistencyKind::MissingModelInstance)
            .count(),
        0
    );
}

#[test]
fn unmentioned_component_is_reported_once_without_sentence() {
    let config = PipelineConfig::default();
    let result = run(
        &config,
        Arc::new(auth_text()),
        &[model(vec![auth_service(), payment_gateway()])],
    )
    .unwrap();

    let missing: Vec<_> = result
        .inconsistencies("arch")
        .unwrap()
        .of_kind(InconsistencyKind::MissingModelInstance)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].model_element_id.as_deref(), Some("c2"));
    assert_eq!(missing[0].name, "PaymentGateway");
    assert_eq!(missing[0].sentence_no, None);
}

#[test]
fn retokenized_reference_merges_into_one_mapping() {
    let words = [
        word(0, 1, "the", PosTag::Determiner),
        word(1, 1, "service", PosTag::Noun),
        word(2, 1, "AuthService", PosTag::ProperNoun),
    ];
    let mut state = TextState::new(Default::default());
    let auth = state
        .add_or_extend(&[&words[2]], MappingKind::Name, AgentKind::NounExtraction, 0.9)
        .unwrap();
    let service = state
        .add_or_extend(
            &[&words[0], &words[1]],
            MappingKind::NameOrType,
            AgentKind::DependencyArcs,
            0.5,
        )
        .unwrap();

    let merged = state.merge(auth, &[service], AgentKind::Compound).unwrap();
    let mapping = state.noun_mapping(merged).unwrap();
    assert_eq!(mapping.word_set().into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(mapping.claimants().contains(&AgentKind::NounExtraction));
    assert!(mapping.claimants().contains(&AgentKind::DependencyArcs));
    assert!(!state.is_live(auth));
    assert!(!state.is_live(service));
    assert_eq!(state.current(auth), Some(merged));
    assert_eq!(state.current(service), Some(merged));
    assert_eq!(state.noun_mapping_count(), 1);
}

#[test]
fn identical_inputs_give_identical_reports() {
    let config = PipelineConfig::default();
    let text = Arc::new(two_sentence_text());
    let models = [model(vec![auth_service(), payment_gateway()])];

    let first = run(&config, text.clone(), &models).unwrap().report();
    let second = run(&config, text, &models).unwrap().report();
    assert_eq!(
        serde_json::to_string(&first.models).unwrap(),
        serde_json::to_string(&second.models).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.noun_mappings).unwrap(),
        serde_json::to_string(&second.noun_mappings).unwrap()
    );
    assert_eq!(first.summary, second.summary);
}

#[test]
fn finished_run_keeps_invariants() {
    let config = PipelineConfig::default();
    let result = run(
        &config,
        Arc::new(two_sentence_text()),
        &[model(vec![auth_service(), payment_gateway()])],
    )
    .unwrap();

    assert!(result.text_state().is_disjoint());

    let connections = result.connections("arch").unwrap();
    let mut pairs: Vec<(&str, u32)> = connections
        .links()
        .map(|l| (l.model_element_id(), l.sentence_no()))
        .collect();
    let total = pairs.len();
    pairs.sort();
    pairs.dedup();
    assert_eq!(pairs.len(), total);
    assert!(connections.links().all(|l| l.confidence().has_value()));
    assert!(connections.link("c2", 2).is_some());
}

#[test]
fn reused_text_state_matches_full_run() {
    let config = PipelineConfig::default();
    let text = Arc::new(two_sentence_text());
    let models = [model(vec![auth_service(), payment_gateway()])];

    let full = run(&config, text.clone(), &models).unwrap();
    let reused = run_with_text_state(&config, text, &models, full.text_state().clone()).unwrap();
    assert_eq!(
        serde_json::to_string(&full.report().models).unwrap(),
        serde_json::to_string(&reused.report().models).unwrap()
    );
}

#[test]
fn unknown_model_is_an_error() {
    let result = run(
        &PipelineConfig::default(),
        Arc::new(auth_text()),
        &[model(vec![auth_service()])],
    )
    .unwrap();
    assert!(result.connections("code").is_err());
}

#[test]
fn holding_back_each_component_recovers_its_mentions() {
    let config = PipelineConfig::default();
    let text = Arc::new(two_sentence_text());
    let full = model(vec![auth_service(), payment_gateway()]);

    let runs = run_holdback(&config, text.clone(), &full).unwrap();
    assert_eq!(runs.len(), 3);
    assert!(runs[0].held_back.is_none());
    assert_eq!(runs[1].held_back.as_ref().map(|i| i.id.as_str()), Some("c1"));
    assert_eq!(runs[2].held_back.as_ref().map(|i| i.id.as_str()), Some("c2"));
    assert!(runs[2].result.connections("arch").unwrap().link("c2", 2).is_none());

    let gold = GoldStandard::new([("c1".to_string(), 1), ("c2".to_string(), 2)]);
    let evaluation = evaluate_holdback(&runs, "arch", &gold, text.sentences().len()).unwrap();
    assert_eq!(evaluation.runs.len(), 2);
    assert_eq!(evaluation.total.true_positives, 2);
    assert_eq!(evaluation.total.false_positives, 0);
    assert!((evaluation.weighted_f1 - 1.0).abs() < 1e-9);
}

/// "The payment gateway charges. The payment is stored."
fn compound_then_bare_text() -> Text {
    let mut words = vec![
        word(0, 1, "The", PosTag::Determiner),
        word(1, 1, "payment", PosTag::Noun),
        word(2, 1, "gateway", PosTag::Noun),
        word(3, 1, "charges", PosTag::Verb),
        word(4, 2, "The", PosTag::Determiner),
        word(5, 2, "payment", PosTag::Noun),
        word(6, 2, "is", PosTag::Verb),
        word(7, 2, "stored", PosTag::Verb),
    ];
    words[2].outgoing.push(DependencyEdge { tag: DependencyTag::Compound, word: 1 });
    words[1].incoming.push(DependencyEdge { tag: DependencyTag::Compound, word: 2 });
    Text::new(
        words,
        vec![
            Sentence {
                number: 1,
                words: vec![0, 1, 2, 3],
                phrases: vec![np(1, &[0, 1, 2])],
            },
            Sentence {
                number: 2,
                words: vec![4, 5, 6, 7],
                phrases: vec![np(2, &[4, 5])],
            },
        ],
    )
}

#[test]
fn compound_does_not_absorb_bare_mention_in_other_sentence() {
    let config = PipelineConfig::default();
    let payment = ModelInstance::new("c3", "Payment", "Component");
    let result = run(
        &config,
        Arc::new(compound_then_bare_text()),
        &[model(vec![payment_gateway(), payment])],
    )
    .unwrap();

    let state = result.text_state();
    assert!(state.is_disjoint());
    let compound = state.mapping_for_word(1).unwrap();
    assert_eq!(state.mapping_for_word(2), Some(compound));
    assert_ne!(state.mapping_for_word(5), Some(compound));
    assert_eq!(state.noun_mapping(compound).unwrap().reference(), "payment gateway");

    let connections = result.connections("arch").unwrap();
    let mut pairs: Vec<(&str, u32)> = connections
        .links()
        .map(|l| (l.model_element_id(), l.sentence_no()))
        .collect();
    pairs.sort();
    assert_eq!(pairs, vec![("c2", 1), ("c3", 2)]);
}

#[test]
fn untraced_sentence_baseline_runs_only_when_enabled() {
    let text = Arc::new(two_sentence_text());
    let full = model(vec![auth_service()]);

    let default_run = run(&PipelineConfig::default(), text.clone(), &[full.clone()]).unwrap();
    let default_findings = default_run.inconsistencies("arch").unwrap();
    assert_eq!(default_findings.of_kind(InconsistencyKind::UntracedSentence).count(), 0);

    let mut config = PipelineConfig::default();
    let mut enabled: Vec<AgentKind> = AgentKind::ALL.to_vec();
    enabled.retain(|a| a.is_default());
    enabled.push(AgentKind::UntracedSentence);
    config.agents.enabled = Some(enabled);

    let result = run(&config, text, &[full]).unwrap();
    let untraced: Vec<_> = result
        .inconsistencies("arch")
        .unwrap()
        .of_kind(InconsistencyKind::UntracedSentence)
        .collect();
    assert_eq!(untraced.len(), 1);
    assert_eq!(untraced[0].sentence_no, Some(2));
    assert_eq!(untraced[0].name, "The PaymentGateway charges cards");
    assert_eq!(result.report().models[0].summary.untraced_sentences, 1);
}

#[test]
fn untraced_sentence_baseline_is_scored_by_holdback() {
    let text = Arc::new(two_sentence_text());
    let full = model(vec![auth_service(), payment_gateway()]);
    let mut config = PipelineConfig::default();
    config.agents.enabled = Some(AgentKind::ALL.to_vec());

    let runs = run_holdback(&config, text.clone(), &full).unwrap();
    let baseline = runs[0].result.inconsistencies("arch").unwrap();
    assert_eq!(baseline.of_kind(InconsistencyKind::UntracedSentence).count(), 0);
    let without_c2 = runs[2].result.inconsistencies("arch").unwrap();
    let untraced: Vec<_> = without_c2
        .of_kind(InconsistencyKind::UntracedSentence)
        .map(|i| i.sentence_no)
        .collect();
    assert_eq!(untraced, vec![Some(2)]);

    let gold = GoldStandard::new([("c1".to_string(), 1), ("c2".to_string(), 2)]);
    let evaluation = evaluate_holdback(&runs, "arch", &gold, text.sentences().len()).unwrap();
    assert_eq!(evaluation.total.true_positives, 2);
    assert_eq!(evaluation.total.false_positives, 0);
}
