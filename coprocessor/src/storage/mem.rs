//! In-memory state store.
//!
//! Useful for unit tests and short-lived simulations. Contexts live in a
//! `BTreeMap` ordered by id, facts in a `HashMap` keyed by fact key.

use std::collections::{BTreeMap, HashMap};

use crate::consensus::store::{
    ContextPointers, ContextStore, FactStore, StateDelta, StateStore,
};
use crate::storage::StorageError;
use crate::types::{ContextId, ContextRecord, FactKey, FactRecord};

/// In-memory implementation of [`StateStore`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryStateStore {
    contexts: BTreeMap<ContextId, ContextRecord>,
    facts: HashMap<FactKey, FactRecord>,
    pointers: ContextPointers,
}

impl InMemoryStateStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of facts currently stored.
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }
}

impl ContextStore for InMemoryStateStore {
    fn get_context(&self, id: ContextId) -> Result<Option<ContextRecord>, StorageError> {
        Ok(self.contexts.get(&id).cloned())
    }

    fn pointers(&self) -> Result<ContextPointers, StorageError> {
        Ok(self.pointers)
    }

    fn latest_context_id(&self) -> Result<ContextId, StorageError> {
        Ok(self
            .contexts
            .keys()
            .next_back()
            .copied()
            .unwrap_or(ContextId::NONE))
    }
}

impl FactStore for InMemoryStateStore {
    fn get_fact(&self, key: &FactKey) -> Result<Option<FactRecord>, StorageError> {
        Ok(self.facts.get(key).cloned())
    }
}

impl StateStore for InMemoryStateStore {
    fn commit(&mut self, delta: StateDelta) -> Result<(), StorageError> {
        for record in delta.contexts {
            self.contexts.insert(record.id(), record);
        }
        for record in delta.facts {
            self.facts.insert(record.fact_key, record);
        }
        if let Some(pointers) = delta.pointers {
            self.pointers = pointers;
        }
        Ok(())
    }
}
