//! Rendered-state tracking

use indexmap::IndexMap;
use seneca_record::RecordKey;
use std::collections::HashSet;

/// Elements currently materialized for one routine
///
/// Existence of the state means the routine's list container has been
/// introduced into the UI.
#[derive(Debug, Clone, Default)]
pub struct RoutineDisplayState {
    materialized: HashSet<RecordKey>,
    companions: HashSet<RecordKey>,
}

impl RoutineDisplayState {
    /// Whether the element is on screen
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &RecordKey) -> bool {
        self.materialized.contains(key)
    }

    /// Record a new element; returns `false` if it was already present
    #[inline]
    pub fn insert(&mut self, key: RecordKey) -> bool {
        self.materialized.insert(key)
    }

    /// Record a plot's companion table; returns `false` if it already exists
    #[inline]
    pub fn insert_companion(&mut self, key: RecordKey) -> bool {
        self.companions.insert(key)
    }

    /// Number of materialized elements
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.materialized.len()
    }

    /// Whether no element has been created yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materialized.is_empty()
    }
}

/// Rendered state of one analysis session, keyed by routine file
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    routines: IndexMap<String, RoutineDisplayState>,
}

impl DisplayState {
    /// Empty state
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State of one routine, if introduced
    #[inline]
    #[must_use]
    pub fn routine(&self, routine_file: &str) -> Option<&RoutineDisplayState> {
        self.routines.get(routine_file)
    }

    /// Whether the routine's container is in the UI
    #[inline]
    #[must_use]
    pub fn is_introduced(&self, routine_file: &str) -> bool {
        self.routines.contains_key(routine_file)
    }

    /// Whether the element is on screen
    #[must_use]
    pub fn contains(&self, key: &RecordKey) -> bool {
        self.routine(&key.routine_file)
            .is_some_and(|routine| routine.contains(key))
    }

    /// Introduce a routine; returns `true` if it was not introduced before
    pub fn introduce(&mut self, routine_file: &str) -> bool {
        if self.routines.contains_key(routine_file) {
            return false;
        }
        self.routines
            .insert(routine_file.to_string(), RoutineDisplayState::default());
        true
    }

    /// Mutable state of a routine, introducing it if needed
    pub fn routine_mut(&mut self, routine_file: &str) -> &mut RoutineDisplayState {
        self.routines.entry(routine_file.to_string()).or_default()
    }

    /// Introduced routines, in introduction order
    pub fn routines(&self) -> impl Iterator<Item = &str> {
        self.routines.keys().map(String::as_str)
    }

    /// Number of introduced routines
    #[inline]
    #[must_use]
    pub fn routine_count(&self) -> usize {
        self.routines.len()
    }

    /// Number of materialized elements across routines
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.routines.values().map(RoutineDisplayState::len).sum()
    }

    /// Forget everything (fresh analysis run)
    #[inline]
    pub fn clear(&mut self) {
        self.routines.clear();
    }
}
