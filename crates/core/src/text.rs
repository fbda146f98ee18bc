//! Annotated natural-language text.
//!
//! Words are addressed by their global `position` (0-based, unique across
//! the whole document). Sentences are numbered from 1.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Part-of-speech tag (Penn Treebank). Tags the pipeline does not reason
/// about collapse into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PosTag {
    Noun,
    NounPlural,
    ProperNoun,
    ProperNounPlural,
    Determiner,
    Adjective,
    Verb,
    Preposition,
    Other,
}

impl PosTag {
    pub fn is_noun(self) -> bool {
        matches!(
            self,
            Self::Noun | Self::NounPlural | Self::ProperNoun | Self::ProperNounPlural
        )
    }

    pub fn is_proper_noun(self) -> bool {
        matches!(self, Self::ProperNoun | Self::ProperNounPlural)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Noun => "NN",
            Self::NounPlural => "NNS",
            Self::ProperNoun => "NNP",
            Self::ProperNounPlural => "NNPS",
            Self::Determiner => "DT",
            Self::Adjective => "JJ",
            Self::Verb => "VB",
            Self::Preposition => "IN",
            Self::Other => "X",
        }
    }
}

impl From<&str> for PosTag {
    fn from(tag: &str) -> Self {
        match tag {
            "NN" => Self::Noun,
            "NNS" => Self::NounPlural,
            "NNP" => Self::ProperNoun,
            "NNPS" => Self::ProperNounPlural,
            "DT" => Self::Determiner,
            "JJ" | "JJR" | "JJS" => Self::Adjective,
            "VB" | "VBD" | "VBG" | "VBN" | "VBP" | "VBZ" => Self::Verb,
            "IN" => Self::Preposition,
            _ => Self::Other,
        }
    }
}

impl From<String> for PosTag {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl From<PosTag> for String {
    fn from(tag: PosTag) -> Self {
        tag.as_str().to_string()
    }
}

/// Universal-dependencies relation label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DependencyTag {
    Subject,
    PassiveSubject,
    Object,
    IndirectObject,
    Compound,
    AdjectivalModifier,
    Determiner,
    NominalModifier,
    Other(String),
}

impl DependencyTag {
    /// Subject or object relations: the word is an argument of a predicate.
    pub fn is_argument(&self) -> bool {
        matches!(
            self,
            Self::Subject | Self::PassiveSubject | Self::Object | Self::IndirectObject
        )
    }
}

impl From<String> for DependencyTag {
    fn from(tag: String) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "nsubj" => Self::Subject,
            "nsubjpass" | "nsubj:pass" => Self::PassiveSubject,
            "obj" | "dobj" => Self::Object,
            "iobj" => Self::IndirectObject,
            "compound" => Self::Compound,
            "amod" => Self::AdjectivalModifier,
            "det" => Self::Determiner,
            "nmod" => Self::NominalModifier,
            _ => Self::Other(tag),
        }
    }
}

impl From<DependencyTag> for String {
    fn from(tag: DependencyTag) -> Self {
        match tag {
            DependencyTag::Subject => "nsubj".into(),
            DependencyTag::PassiveSubject => "nsubjpass".into(),
            DependencyTag::Object => "obj".into(),
            DependencyTag::IndirectObject => "iobj".into(),
            DependencyTag::Compound => "compound".into(),
            DependencyTag::AdjectivalModifier => "amod".into(),
            DependencyTag::Determiner => "det".into(),
            DependencyTag::NominalModifier => "nmod".into(),
            DependencyTag::Other(tag) => tag,
        }
    }
}

/// Labeled edge to another word, by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub tag: DependencyTag,
    pub word: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhraseType {
    #[serde(rename = "NP")]
    NounPhrase,
    #[serde(rename = "VP")]
    VerbPhrase,
    #[serde(rename = "PP")]
    PrepositionalPhrase,
    #[serde(rename = "S")]
    Clause,
    #[serde(rename = "OTHER")]
    Other,
}

// ---------------------------------------------------------------------------
// Words, phrases, sentences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub position: usize,
    pub sentence_no: u32,
    pub text: String,
    pub lemma: String,
    pub pos: PosTag,
    #[serde(default)]
    pub incoming: Vec<DependencyEdge>,
    #[serde(default)]
    pub outgoing: Vec<DependencyEdge>,
}

impl Word {
    pub fn new(position: usize, sentence_no: u32, text: &str, lemma: &str, pos: PosTag) -> Self {
        Self {
            position,
            sentence_no,
            text: text.to_string(),
            lemma: lemma.to_string(),
            pos,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// True for identifiers like `AuthService` or `getToken`: a lowercase
    /// letter directly followed by an uppercase one.
    pub fn is_camel_case(&self) -> bool {
        let chars: Vec<char> = self.text.chars().collect();
        chars
            .windows(2)
            .any(|w| w[0].is_lowercase() && w[1].is_uppercase())
    }

    pub fn has_incoming(&self, pred: impl Fn(&DependencyTag) -> bool) -> bool {
        self.incoming.iter().any(|e| pred(&e.tag))
    }
}

/// A constituency-tree node. `words` lists every word the phrase spans,
/// including those of its sub-phrases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phrase {
    pub phrase_type: PhraseType,
    pub sentence_no: u32,
    pub words: Vec<usize>,
    #[serde(default)]
    pub sub_phrases: Vec<Phrase>,
}

impl Phrase {
    pub fn is_super_phrase_of(&self, other: &Phrase) -> bool {
        self.sentence_no == other.sentence_no
            && self.words.len() > other.words.len()
            && other.words.iter().all(|w| self.words.contains(w))
    }

    /// This phrase and all nested phrases, pre-order.
    pub fn flatten(&self) -> Vec<&Phrase> {
        let mut out = vec![self];
        for sub in &self.sub_phrases {
            out.extend(sub.flatten());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub number: u32,
    pub words: Vec<usize>,
    #[serde(default)]
    pub phrases: Vec<Phrase>,
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// The annotated document. Words are stored ordered by position, so
/// `words[i].position == i` holds for every text built by ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Text {
    words: Vec<Word>,
    sentences: Vec<Sentence>,
}

impl Text {
    pub fn new(words: Vec<Word>, sentences: Vec<Sentence>) -> Self {
        Self { words, sentences }
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, position: usize) -> Option<&Word> {
        self.words.get(position).filter(|w| w.position == position)
    }

    pub fn sentence(&self, number: u32) -> Option<&Sentence> {
        self.sentences.iter().find(|s| s.number == number)
    }

    pub fn words_in_sentence(&self, number: u32) -> impl Iterator<Item = &Word> + '_ {
        self.sentence(number)
            .into_iter()
            .flat_map(|s| s.words.iter())
            .filter_map(|p| self.word(*p))
    }

    /// The following word, if it belongs to the same sentence.
    pub fn next_word(&self, position: usize) -> Option<&Word> {
        let current = self.word(position)?;
        self.word(position + 1)
            .filter(|w| w.sentence_no == current.sentence_no)
    }

    /// The preceding word, if it belongs to the same sentence.
    pub fn previous_word(&self, position: usize) -> Option<&Word> {
        let current = self.word(position)?;
        let prev = position.checked_sub(1)?;
        self.word(prev).filter(|w| w.sentence_no == current.sentence_no)
    }

    /// Every phrase of every sentence, flattened in document order.
    pub fn phrases(&self) -> Vec<&Phrase> {
        self.sentences
            .iter()
            .flat_map(|s| s.phrases.iter())
            .flat_map(|p| p.flatten())
            .collect()
    }
}
