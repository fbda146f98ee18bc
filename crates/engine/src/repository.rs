//! Shared keyed store every stage reads from and writes into.
//!
//! Each state type names its key through [`PipelineState::KEY`]. Lookups
//! downcast by type, so a caller can never observe a state as the wrong
//! type; a key collision between two types surfaces as
//! [`EngineError::StateTypeMismatch`].

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracelink_core::{Model, Text};

use crate::error::EngineError;

/// A value that can live in the [`DataRepository`].
pub trait PipelineState: Any + Send + Sync {
    const KEY: &'static str;
}

#[derive(Default)]
pub struct DataRepository {
    states: FxHashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl DataRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains<T: PipelineState>(&self) -> bool {
        self.states.contains_key(T::KEY)
    }

    pub fn get<T: PipelineState>(&self) -> Option<&T> {
        self.states.get(T::KEY)?.downcast_ref::<T>()
    }

    pub fn get_mut<T: PipelineState>(&mut self) -> Option<&mut T> {
        self.states.get_mut(T::KEY)?.downcast_mut::<T>()
    }

    /// Like [`get`](Self::get), but a missing or mistyped state is an error.
    pub fn require<T: PipelineState>(&self) -> Result<&T, EngineError> {
        match self.states.get(T::KEY) {
            None => Err(EngineError::MissingState(T::KEY)),
            Some(boxed) => boxed
                .downcast_ref::<T>()
                .ok_or(EngineError::StateTypeMismatch(T::KEY)),
        }
    }

    pub fn require_mut<T: PipelineState>(&mut self) -> Result<&mut T, EngineError> {
        match self.states.get_mut(T::KEY) {
            None => Err(EngineError::MissingState(T::KEY)),
            Some(boxed) => boxed
                .downcast_mut::<T>()
                .ok_or(EngineError::StateTypeMismatch(T::KEY)),
        }
    }

    /// Insert or replace a state. Returns `true` if a value was replaced.
    pub fn insert<T: PipelineState>(&mut self, state: T) -> bool {
        self.states.insert(T::KEY, Box::new(state)).is_some()
    }

    /// Fetch a state, creating it with `init` on first access.
    pub fn get_or_insert_with<T: PipelineState>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> Result<&mut T, EngineError> {
        self.states
            .entry(T::KEY)
            .or_insert_with(|| Box::new(init()))
            .downcast_mut::<T>()
            .ok_or(EngineError::StateTypeMismatch(T::KEY))
    }

    /// Remove a state and hand it over by value.
    pub fn take<T: PipelineState>(&mut self) -> Option<T> {
        let boxed = self.states.remove(T::KEY)?;
        match boxed.downcast::<T>() {
            Ok(state) => Some(*state),
            Err(other) => {
                // Wrong type under this key: put it back untouched
                self.states.insert(T::KEY, other);
                None
            }
        }
    }

    /// Keys currently present, sorted.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.states.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for DataRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRepository")
            .field("keys", &self.keys())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Input states
// ---------------------------------------------------------------------------

/// The annotated text, shared read-only between runs.
#[derive(Debug, Clone)]
pub struct PreprocessingData {
    pub text: Arc<Text>,
}

impl PipelineState for PreprocessingData {
    const KEY: &'static str = "preprocessing";
}

/// Input models by id.
#[derive(Debug, Clone, Default)]
pub struct ModelStates {
    models: BTreeMap<String, Arc<Model>>,
}

impl ModelStates {
    pub fn new(models: impl IntoIterator<Item = Model>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|m| (m.id.clone(), Arc::new(m)))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Model>> {
        self.models.get(id)
    }

    /// Models in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.models.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    /// Cheap snapshot for agents that must later borrow the repository
    /// mutably.
    pub fn snapshot(&self) -> Vec<Arc<Model>> {
        self.models.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl PipelineState for ModelStates {
    const KEY: &'static str = "model";
}

/// Repository seeded with the two pipeline inputs.
pub fn seed_repository(text: Arc<Text>, models: impl IntoIterator<Item = Model>) -> DataRepository {
    let mut repo = DataRepository::new();
    repo.insert(PreprocessingData { text });
    repo.insert(ModelStates::new(models));
    repo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Counter(u32);

    impl PipelineState for Counter {
        const KEY: &'static str = "counter";
    }

    #[derive(Debug)]
    struct Impostor;

    impl PipelineState for Impostor {
        const KEY: &'static str = "counter";
    }

    #[test]
    fn insert_get_take() {
        let mut repo = DataRepository::new();
        assert!(!repo.contains::<Counter>());
        assert!(!repo.insert(Counter(1)));
        assert_eq!(repo.get::<Counter>(), Some(&Counter(1)));
        repo.get_mut::<Counter>().unwrap().0 += 1;
        assert_eq!(repo.take::<Counter>(), Some(Counter(2)));
        assert!(!repo.contains::<Counter>());
    }

    #[test]
    fn require_reports_missing_state() {
        let repo = DataRepository::new();
        let err = repo.require::<Counter>().unwrap_err();
        assert!(matches!(err, EngineError::MissingState("counter")));
    }

    #[test]
    fn key_collision_is_a_type_mismatch() {
        let mut repo = DataRepository::new();
        repo.insert(Counter(7));
        assert!(repo.get::<Impostor>().is_none());
        let err = repo.require::<Impostor>().unwrap_err();
        assert!(matches!(err, EngineError::StateTypeMismatch("counter")));
        assert!(repo.take::<Impostor>().is_none());
        assert_eq!(repo.get::<Counter>(), Some(&Counter(7)));
    }

    #[test]
    fn get_or_insert_with_initializes_once() {
        let mut repo = DataRepository::new();
        repo.get_or_insert_with(Counter::default).unwrap().0 = 5;
        let again = repo.get_or_insert_with(|| Counter(99)).unwrap();
        assert_eq!(again.0, 5);
    }

    #[test]
    fn seeded_repository_has_inputs() {
        let repo = seed_repository(Arc::new(Text::default()), Vec::new());
        assert_eq!(repo.keys(), vec!["model", "preprocessing"]);
        assert!(repo.require::<ModelStates>().unwrap().is_empty());
    }
}
