use thiserror::Error;

use crate::text_state::{NounMappingId, PhraseMappingId};

#[derive(Debug, Error)]
pub enum EngineError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (probability out of range, empty stage, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A stale merge operand is contained in more than one live mapping.
    #[error("ambiguous merge: noun mapping {mapping} is covered by {candidates} live mappings")]
    AmbiguousMerge {
        mapping: NounMappingId,
        candidates: usize,
    },
    /// A stale merge operand is contained in no live mapping at all.
    #[error("lost merge target: no live mapping covers the words of noun mapping {mapping}")]
    LostMergeTarget { mapping: NounMappingId },
    #[error("unknown noun mapping {0}")]
    UnknownNounMapping(NounMappingId),
    #[error("phrase mapping {0} is retired or unknown")]
    UnknownPhraseMapping(PhraseMappingId),
    /// A heuristic tried to record evidence over zero words.
    #[error("cannot record a mapping without words")]
    EmptyReference,
    /// A stage ran before the state it reads was seeded.
    #[error("state '{0}' is missing from the repository")]
    MissingState(&'static str),
    /// A state key is occupied by a value of another type.
    #[error("state '{0}' holds a value of an unexpected type")]
    StateTypeMismatch(&'static str),
    #[error("unknown model: {0}")]
    UnknownModel(String),
}
