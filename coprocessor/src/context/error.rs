use std::fmt;

use crate::storage::StorageError;
use crate::types::{Address, ContextId};
use crate::validation::GateError;

/// Errors raised by context lifecycle operations and committee lookups.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ContextError {
    /// No genesis committee has been installed yet.
    NotBootstrapped,
    /// Bootstrap was called on an already configured instance.
    AlreadyBootstrapped,
    /// A committee must contain at least one member.
    EmptyCommittee,
    /// Member at `index` has a null tx-sender or signer identity.
    NullMemberIdentity { index: usize },
    /// The same identity appears twice within one committee.
    DuplicateMemberIdentity(Address),
    /// `identity` is not a tx-sender of context `context_id`.
    NotAMember {
        context_id: ContextId,
        identity: Address,
    },
    UnknownContext(ContextId),
    NoPreActivationContext,
    NoSuspendedContext,
    /// A rotation to the given context is already scheduled.
    RotationAlreadyPending(ContextId),
    /// The given context has not finished winding down.
    WindDownAlreadyPending(ContextId),
    /// The operation is illegal on the active context.
    ContextStillActive(ContextId),
    /// Rejected by an admission gate.
    Gate(GateError),
    /// The state store failed to read or write.
    Storage(StorageError),
}

impl From<GateError> for ContextError {
    fn from(e: GateError) -> Self {
        ContextError::Gate(e)
    }
}

impl From<StorageError> for ContextError {
    fn from(e: StorageError) -> Self {
        ContextError::Storage(e)
    }
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::NotBootstrapped => write!(f, "no coprocessor context has been bootstrapped"),
            ContextError::AlreadyBootstrapped => {
                write!(f, "coprocessor contexts are already bootstrapped")
            }
            ContextError::EmptyCommittee => write!(f, "committee must not be empty"),
            ContextError::NullMemberIdentity { index } => {
                write!(f, "committee member {index} has a null identity")
            }
            ContextError::DuplicateMemberIdentity(who) => {
                write!(f, "identity {who} appears more than once in the committee")
            }
            ContextError::NotAMember {
                context_id,
                identity,
            } => write!(
                f,
                "{identity} is not a coprocessor tx sender of context {context_id}"
            ),
            ContextError::UnknownContext(id) => write!(f, "context {id} does not exist"),
            ContextError::NoPreActivationContext => write!(f, "no context is in pre-activation"),
            ContextError::NoSuspendedContext => write!(f, "no context is suspended"),
            ContextError::RotationAlreadyPending(id) => {
                write!(f, "context {id} is already waiting for activation")
            }
            ContextError::WindDownAlreadyPending(id) => {
                write!(f, "context {id} is still suspended")
            }
            ContextError::ContextStillActive(id) => write!(f, "context {id} is active"),
            ContextError::Gate(e) => write!(f, "{e}"),
            ContextError::Storage(e) => write!(f, "state store failure: {e}"),
        }
    }
}

impl std::error::Error for ContextError {}
