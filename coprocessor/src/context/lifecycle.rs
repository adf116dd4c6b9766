//! Context lifecycle state machine.
//!
//! ```text
//! request_rotation          refresh (activation block reached)
//!   ──────────▶ PreActivation ──────────▶ Active
//!                                    old Active ──▶ Suspended
//!                                                      │ refresh (deactivation block reached)
//!                                                      ▼
//!                                                 Deactivated
//!
//! compromise / destroy: any non-active context ──▶ Compromised / Destroyed
//! move_suspended_to_active: Suspended ──▶ Active, Active ──▶ Deactivated
//! ```
//!
//! Transitions are lazy: nothing happens when a deadline passes until
//! [`ContextLifecycleManager::refresh`] is called with the current block.
//! Every operation only reads the store and returns a [`Changeset`] for the
//! caller to commit.

use crate::consensus::store::{Changeset, ContextPointers, ContextStore};
use crate::types::{
    Address, BlockNumber, BlockPeriods, Committee, ContextId, ContextRecord, ContextStatus,
    CoprocessorEvent, CoprocessorMember, FeatureSet,
};

use super::error::ContextError;
use super::registry::{CommitteeRegistry, validate_members};

/// Stateless lifecycle rules applied against a [`ContextStore`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextLifecycleManager;

impl ContextLifecycleManager {
    pub fn new() -> Self {
        Self
    }

    /// Installs the genesis committee as context 1, `Active`.
    ///
    /// Only legal on an empty store.
    pub fn bootstrap<S>(
        &self,
        store: &S,
        feature_set: FeatureSet,
        members: Vec<CoprocessorMember>,
    ) -> Result<Changeset, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        if !store.latest_context_id()?.is_none() || !store.pointers()?.active.is_none() {
            return Err(ContextError::AlreadyBootstrapped);
        }
        validate_members(&members)?;

        let record = ContextRecord {
            committee: Committee {
                context_id: ContextId::GENESIS,
                previous_context_id: ContextId::NONE,
                feature_set,
                members,
            },
            status: ContextStatus::Active,
            block_periods: None,
            activation_block_number: None,
            deactivated_block_number: None,
        };

        let mut changes = Changeset::default();
        changes.delta.put_context(record);
        changes.delta.set_pointers(ContextPointers {
            active: ContextId::GENESIS,
            ..ContextPointers::default()
        });
        changes.events.push(CoprocessorEvent::ActivateContext {
            context_id: ContextId::GENESIS,
        });
        Ok(changes)
    }

    /// Schedules a new committee to replace the active one.
    ///
    /// Fails while another rotation is waiting for activation or while the
    /// previous active context is still winding down.
    pub fn request_rotation<S>(
        &self,
        store: &S,
        now: BlockNumber,
        feature_set: FeatureSet,
        block_periods: BlockPeriods,
        members: Vec<CoprocessorMember>,
    ) -> Result<Changeset, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let mut pointers = store.pointers()?;
        if pointers.active.is_none() {
            return Err(ContextError::NotBootstrapped);
        }
        if !pointers.pre_activation.is_none() {
            return Err(ContextError::RotationAlreadyPending(pointers.pre_activation));
        }
        if !pointers.suspended.is_none() {
            return Err(ContextError::WindDownAlreadyPending(pointers.suspended));
        }
        validate_members(&members)?;

        let active = self.context(store, pointers.active)?;
        let context_id = store.latest_context_id()?.next();
        let activation_block_number =
            now.saturating_add(block_periods.pre_activation_block_period);

        let record = ContextRecord {
            committee: Committee {
                context_id,
                previous_context_id: active.id(),
                feature_set,
                members,
            },
            status: ContextStatus::PreActivation,
            block_periods: Some(block_periods),
            activation_block_number: Some(activation_block_number),
            deactivated_block_number: None,
        };

        let mut changes = Changeset::default();
        changes.events.push(CoprocessorEvent::NewContext {
            old: active.snapshot(),
            new: record.snapshot(),
            block_periods,
        });
        changes.events.push(CoprocessorEvent::PreActivateContext {
            context_id,
            activation_block_number,
        });

        pointers.pre_activation = context_id;
        changes.delta.put_context(record);
        changes.delta.set_pointers(pointers);
        Ok(changes)
    }

    /// Applies every transition whose scheduled block is `<= now`.
    ///
    /// Activation is checked before deactivation, so one call after a long
    /// gap can do both. Returns an empty changeset when nothing is due.
    pub fn refresh<S>(&self, store: &S, now: BlockNumber) -> Result<Changeset, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let mut pointers = store.pointers()?;
        let mut changes = Changeset::default();

        if !pointers.pre_activation.is_none() {
            if let Some(mut incoming) = store.get_context(pointers.pre_activation)? {
                let due = incoming
                    .activation_block_number
                    .is_some_and(|block| block <= now);
                if due {
                    let suspended_period = incoming
                        .block_periods
                        .map(|p| p.suspended_block_period)
                        .unwrap_or_default();
                    let deactivated_block_number = now.saturating_add(suspended_period);

                    if let Some(mut outgoing) = store.get_context(pointers.active)? {
                        outgoing.status = ContextStatus::Suspended;
                        outgoing.deactivated_block_number = Some(deactivated_block_number);
                        pointers.suspended = outgoing.id();
                        changes.events.push(CoprocessorEvent::SuspendContext {
                            context_id: outgoing.id(),
                            deactivated_block_number,
                        });
                        changes.delta.put_context(outgoing);
                    }

                    incoming.status = ContextStatus::Active;
                    pointers.active = incoming.id();
                    pointers.pre_activation = ContextId::NONE;
                    changes.events.push(CoprocessorEvent::ActivateContext {
                        context_id: incoming.id(),
                    });
                    changes.delta.put_context(incoming);
                }
            }
        }

        if !pointers.suspended.is_none() {
            // May be the context suspended a few lines above.
            let suspended = match changes.delta.context(pointers.suspended) {
                Some(record) => Some(record.clone()),
                None => store.get_context(pointers.suspended)?,
            };

            if let Some(mut outgoing) = suspended {
                let due = outgoing
                    .deactivated_block_number
                    .is_some_and(|block| block <= now);
                if due {
                    outgoing.status = ContextStatus::Deactivated;
                    pointers.suspended = ContextId::NONE;
                    changes.events.push(CoprocessorEvent::DeactivateContext {
                        context_id: outgoing.id(),
                    });
                    changes.delta.put_context(outgoing);
                }
            }
        }

        if !changes.delta.contexts.is_empty() {
            changes.delta.set_pointers(pointers);
        }
        Ok(changes)
    }

    /// Marks a non-active context as compromised.
    pub fn compromise<S>(&self, store: &S, id: ContextId) -> Result<Changeset, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        self.terminate(store, id, ContextStatus::Compromised)
    }

    /// Marks a non-active context as destroyed.
    pub fn destroy<S>(&self, store: &S, id: ContextId) -> Result<Changeset, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        self.terminate(store, id, ContextStatus::Destroyed)
    }

    fn terminate<S>(
        &self,
        store: &S,
        id: ContextId,
        status: ContextStatus,
    ) -> Result<Changeset, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let mut record = self.context(store, id)?;
        if record.status == ContextStatus::Active {
            return Err(ContextError::ContextStillActive(id));
        }

        // A terminated context no longer occupies its phase.
        let mut pointers = store.pointers()?;
        if pointers.pre_activation == id {
            pointers.pre_activation = ContextId::NONE;
        }
        if pointers.suspended == id {
            pointers.suspended = ContextId::NONE;
        }

        record.status = status;

        let mut changes = Changeset::default();
        changes.delta.put_context(record);
        changes.delta.set_pointers(pointers);
        changes.events.push(match status {
            ContextStatus::Destroyed => CoprocessorEvent::DestroyContext { context_id: id },
            _ => CoprocessorEvent::CompromiseContext { context_id: id },
        });
        Ok(changes)
    }

    /// Emergency rollback of the last rotation.
    ///
    /// The suspended context becomes active again and the current active
    /// context is deactivated outright, without passing through
    /// `Suspended`.
    pub fn move_suspended_to_active<S>(&self, store: &S) -> Result<Changeset, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let mut pointers = store.pointers()?;
        if pointers.suspended.is_none() {
            return Err(ContextError::NoSuspendedContext);
        }

        let mut reinstated = self.context(store, pointers.suspended)?;
        let mut displaced = self.context(store, pointers.active)?;

        reinstated.status = ContextStatus::Active;
        reinstated.deactivated_block_number = None;
        displaced.status = ContextStatus::Deactivated;

        pointers.active = reinstated.id();
        pointers.suspended = ContextId::NONE;

        let mut changes = Changeset::default();
        changes.events.push(CoprocessorEvent::MoveSuspendedToActive {
            reactivated: reinstated.id(),
            deactivated: displaced.id(),
        });
        changes.delta.put_context(reinstated);
        changes.delta.put_context(displaced);
        changes.delta.set_pointers(pointers);
        Ok(changes)
    }

    /// Resolves which live committee a first-time submitter belongs to.
    ///
    /// The active context is checked first, then the suspended one so the
    /// outgoing committee keeps working during the overlap window.
    pub fn resolve_submitter_context<S>(
        &self,
        store: &S,
        submitter: &Address,
    ) -> Result<ContextId, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let pointers = store.pointers()?;
        if pointers.active.is_none() {
            return Err(ContextError::NotBootstrapped);
        }

        let registry = CommitteeRegistry::new(store);
        if registry.is_tx_sender(pointers.active, submitter)? {
            return Ok(pointers.active);
        }
        if !pointers.suspended.is_none() && registry.is_tx_sender(pointers.suspended, submitter)? {
            return Ok(pointers.suspended);
        }

        Err(ContextError::NotAMember {
            context_id: pointers.active,
            identity: *submitter,
        })
    }

    // ---------------------------
    // Queries
    // ---------------------------

    /// Fetches context `id`.
    pub fn context<S>(&self, store: &S, id: ContextId) -> Result<ContextRecord, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        if id.is_none() {
            return Err(ContextError::UnknownContext(id));
        }
        store.get_context(id)?.ok_or(ContextError::UnknownContext(id))
    }

    pub fn context_exists<S>(&self, store: &S, id: ContextId) -> Result<bool, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        CommitteeRegistry::new(store).contains(id)
    }

    /// Status of context `id`; unknown ids report `Uninitialized`.
    pub fn status<S>(&self, store: &S, id: ContextId) -> Result<ContextStatus, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        if id.is_none() {
            return Ok(ContextStatus::default());
        }
        Ok(store
            .get_context(id)?
            .map(|record| record.status)
            .unwrap_or_default())
    }

    pub fn is_active_or_suspended<S>(&self, store: &S, id: ContextId) -> Result<bool, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        Ok(self.status(store, id)?.is_active_or_suspended())
    }

    pub fn active_context_id<S>(&self, store: &S) -> Result<ContextId, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let id = store.pointers()?.active;
        if id.is_none() {
            return Err(ContextError::NotBootstrapped);
        }
        Ok(id)
    }

    pub fn active_context<S>(&self, store: &S) -> Result<ContextRecord, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let id = self.active_context_id(store)?;
        self.context(store, id)
    }

    pub fn pre_activation_context_id<S>(&self, store: &S) -> Result<ContextId, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let id = store.pointers()?.pre_activation;
        if id.is_none() {
            return Err(ContextError::NoPreActivationContext);
        }
        Ok(id)
    }

    pub fn pre_activation_context<S>(&self, store: &S) -> Result<ContextRecord, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let id = self.pre_activation_context_id(store)?;
        self.context(store, id)
    }

    pub fn suspended_context_id<S>(&self, store: &S) -> Result<ContextId, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let id = store.pointers()?.suspended;
        if id.is_none() {
            return Err(ContextError::NoSuspendedContext);
        }
        Ok(id)
    }

    pub fn suspended_context<S>(&self, store: &S) -> Result<ContextRecord, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let id = self.suspended_context_id(store)?;
        self.context(store, id)
    }

    pub fn activation_block_number<S>(
        &self,
        store: &S,
        id: ContextId,
    ) -> Result<Option<BlockNumber>, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        Ok(self.context(store, id)?.activation_block_number)
    }

    pub fn deactivated_block_number<S>(
        &self,
        store: &S,
        id: ContextId,
    ) -> Result<Option<BlockNumber>, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        Ok(self.context(store, id)?.deactivated_block_number)
    }

    /// Looks up `who` among the tx-senders of context `id`.
    pub fn member<S>(
        &self,
        store: &S,
        id: ContextId,
        who: &Address,
    ) -> Result<CoprocessorMember, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        CommitteeRegistry::new(store).member(id, who)
    }

    /// Looks up `who` among the tx-senders of the active context.
    pub fn active_member<S>(&self, store: &S, who: &Address) -> Result<CoprocessorMember, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        let id = self.active_context_id(store)?;
        self.member(store, id, who)
    }

    pub fn majority_threshold<S>(&self, store: &S, id: ContextId) -> Result<usize, ContextError>
    where
        S: ContextStore + ?Sized,
    {
        CommitteeRegistry::new(store).majority_threshold(id)
    }
}
