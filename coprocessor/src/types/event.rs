//! Events published at lifecycle transitions and fact finalization.

use serde::{Deserialize, Serialize};

use super::{Address, BlockNumber, BlockPeriods, ContextId, ContextSnapshot, FactKey, Hash256};

/// Notification emitted synchronously, right after the state change it
/// describes has been committed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CoprocessorEvent {
    /// A rotation was requested and a new context was created.
    NewContext {
        old: ContextSnapshot,
        new: ContextSnapshot,
        block_periods: BlockPeriods,
    },

    /// The new context is waiting in `PreActivation`.
    PreActivateContext {
        context_id: ContextId,
        activation_block_number: BlockNumber,
    },

    ActivateContext {
        context_id: ContextId,
    },

    SuspendContext {
        context_id: ContextId,
        deactivated_block_number: BlockNumber,
    },

    DeactivateContext {
        context_id: ContextId,
    },

    CompromiseContext {
        context_id: ContextId,
    },

    DestroyContext {
        context_id: ContextId,
    },

    /// Emergency rollback: the suspended context was reinstated and the
    /// previously active one deactivated.
    MoveSuspendedToActive {
        reactivated: ContextId,
        deactivated: ContextId,
    },

    /// A fact reached the majority threshold of its pinned context.
    ///
    /// Fired exactly once per fact.
    FactFinalized {
        fact_key: FactKey,
        context_id: ContextId,
        ciphertext_digest: Hash256,
        sns_ciphertext_digest: Hash256,
        submitters: Vec<Address>,
    },
}

impl CoprocessorEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            CoprocessorEvent::NewContext { .. } => "new_context",
            CoprocessorEvent::PreActivateContext { .. } => "pre_activate_context",
            CoprocessorEvent::ActivateContext { .. } => "activate_context",
            CoprocessorEvent::SuspendContext { .. } => "suspend_context",
            CoprocessorEvent::DeactivateContext { .. } => "deactivate_context",
            CoprocessorEvent::CompromiseContext { .. } => "compromise_context",
            CoprocessorEvent::DestroyContext { .. } => "destroy_context",
            CoprocessorEvent::MoveSuspendedToActive { .. } => "move_suspended_to_active",
            CoprocessorEvent::FactFinalized { .. } => "fact_finalized",
        }
    }

    /// Whether this event records a context status change.
    pub const fn is_transition(&self) -> bool {
        !matches!(
            self,
            CoprocessorEvent::NewContext { .. } | CoprocessorEvent::FactFinalized { .. }
        )
    }
}
