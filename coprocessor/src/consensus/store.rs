//! Storage abstraction used by the lifecycle manager and the accumulator.
//!
//! Two tables are persisted: a context table keyed by monotonically
//! increasing [`ContextId`] and a fact table keyed by [`FactKey`]. Both
//! components only read through these traits; every mutation is described
//! as a [`StateDelta`] and applied with a single [`StateStore::commit`], so
//! an operation that fails leaves nothing behind.
//!
//! Backend failures surface as [`StorageError`]; a read that cannot be
//! decoded is an error, never an absent record.

use serde::{Deserialize, Serialize};

use crate::storage::StorageError;
use crate::types::{ContextId, ContextRecord, CoprocessorEvent, FactKey, FactRecord};

/// Which context currently occupies each lifecycle phase.
///
/// [`ContextId::NONE`] means the phase is empty. At most one context can
/// hold each phase.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContextPointers {
    pub active: ContextId,
    pub pre_activation: ContextId,
    pub suspended: ContextId,
}

/// Read access to the context table.
pub trait ContextStore {
    /// Fetches a context by id, if present.
    fn get_context(&self, id: ContextId) -> Result<Option<ContextRecord>, StorageError>;

    /// Returns the current phase pointers.
    fn pointers(&self) -> Result<ContextPointers, StorageError>;

    /// Highest context id ever stored, or [`ContextId::NONE`] when empty.
    fn latest_context_id(&self) -> Result<ContextId, StorageError>;
}

/// Read access to the fact table.
pub trait FactStore {
    fn get_fact(&self, key: &FactKey) -> Result<Option<FactRecord>, StorageError>;
}

/// A store holding both tables that can apply a [`StateDelta`] atomically.
pub trait StateStore: ContextStore + FactStore {
    /// Applies every change in `delta`, or none of them.
    ///
    /// On `Err` the store is unchanged.
    fn commit(&mut self, delta: StateDelta) -> Result<(), StorageError>;
}

/// Pending writes produced by one operation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StateDelta {
    pub contexts: Vec<ContextRecord>,
    pub pointers: Option<ContextPointers>,
    pub facts: Vec<FactRecord>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a context upsert, replacing an earlier queued write of the
    /// same id.
    pub fn put_context(&mut self, record: ContextRecord) {
        let id = record.id();
        self.contexts.retain(|c| c.id() != id);
        self.contexts.push(record);
    }

    pub fn set_pointers(&mut self, pointers: ContextPointers) {
        self.pointers = Some(pointers);
    }

    pub fn put_fact(&mut self, record: FactRecord) {
        let key = record.fact_key;
        self.facts.retain(|f| f.fact_key != key);
        self.facts.push(record);
    }

    /// Looks up a context queued in this delta.
    pub fn context(&self, id: ContextId) -> Option<&ContextRecord> {
        self.contexts.iter().find(|c| c.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty() && self.pointers.is_none() && self.facts.is_empty()
    }

    /// Highest context id written by this delta.
    pub fn max_context_id(&self) -> Option<ContextId> {
        self.contexts.iter().map(|c| c.id()).max()
    }
}

/// State changes plus the events to publish once they are committed.
#[derive(Clone, Debug, Default)]
pub struct Changeset {
    pub delta: StateDelta,
    pub events: Vec<CoprocessorEvent>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.delta.is_empty() && self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Committee, ContextStatus, FeatureSet};

    fn record(id: u64, status: ContextStatus) -> ContextRecord {
        ContextRecord {
            committee: Committee {
                context_id: ContextId(id),
                previous_context_id: ContextId(id - 1),
                feature_set: FeatureSet(0),
                members: Vec::new(),
            },
            status,
            block_periods: None,
            activation_block_number: None,
            deactivated_block_number: None,
        }
    }

    #[test]
    fn later_context_writes_replace_earlier_ones() {
        let mut delta = StateDelta::new();
        assert!(delta.is_empty());

        delta.put_context(record(2, ContextStatus::PreActivation));
        delta.put_context(record(1, ContextStatus::Active));
        delta.put_context(record(2, ContextStatus::Active));

        assert_eq!(delta.contexts.len(), 2);
        assert_eq!(
            delta.context(ContextId(2)).map(|c| c.status),
            Some(ContextStatus::Active)
        );
        assert_eq!(delta.max_context_id(), Some(ContextId(2)));
    }

    #[test]
    fn pointers_default_to_empty_phases() {
        let p = ContextPointers::default();
        assert!(p.active.is_none());
        assert!(p.pre_activation.is_none());
        assert!(p.suspended.is_none());
    }
}
