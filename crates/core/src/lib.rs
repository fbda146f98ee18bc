//! `tracelink-core` - immutable inputs of the trace-link pipeline.
//!
//! The linguistic pre-processor hands over a finished [`Text`]; model
//! ingestion hands over finished [`Model`]s. Neither is mutated afterwards,
//! so both can be shared read-only across concurrent runs.

pub mod model;
pub mod text;

pub use model::{split_identifier, Model, ModelInstance, ModelKind};
pub use text::{DependencyEdge, DependencyTag, Phrase, PhraseType, PosTag, Sentence, Text, Word};
