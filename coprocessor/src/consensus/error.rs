use std::fmt;

use crate::context::ContextError;
use crate::storage::StorageError;
use crate::types::{Address, ContextId, ContextStatus, FactKey};
use crate::validation::GateError;

/// Errors returned by attestation submission and fact queries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConsensusError {
    /// Committee resolution or lookup failure.
    Context(ContextError),
    /// Rejected by an admission gate (pause, unknown chain).
    Gate(GateError),
    /// `identity` already contributed to `fact_key`.
    DuplicateSubmitter {
        fact_key: FactKey,
        identity: Address,
    },
    /// The context `fact_key` is pinned to can no longer reach consensus.
    FactTargetInvalid {
        fact_key: FactKey,
        context_id: ContextId,
        status: ContextStatus,
    },
    FactNotFound(FactKey),
    /// The fact exists but has not reached its majority threshold yet.
    FactNotFinalized(FactKey),
    /// The state store failed to read or write.
    Storage(StorageError),
}

impl From<ContextError> for ConsensusError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::Gate(gate) => ConsensusError::Gate(gate),
            ContextError::Storage(e) => ConsensusError::Storage(e),
            other => ConsensusError::Context(other),
        }
    }
}

impl From<GateError> for ConsensusError {
    fn from(e: GateError) -> Self {
        ConsensusError::Gate(e)
    }
}

impl From<StorageError> for ConsensusError {
    fn from(e: StorageError) -> Self {
        ConsensusError::Storage(e)
    }
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusError::Context(e) => write!(f, "{e}"),
            ConsensusError::Gate(e) => write!(f, "{e}"),
            ConsensusError::DuplicateSubmitter { fact_key, identity } => {
                write!(f, "{identity} already submitted fact {fact_key}")
            }
            ConsensusError::FactTargetInvalid {
                fact_key,
                context_id,
                status,
            } => write!(
                f,
                "fact {fact_key} is pinned to context {context_id} which is {status}"
            ),
            ConsensusError::FactNotFound(key) => write!(f, "fact {key} was never submitted"),
            ConsensusError::FactNotFinalized(key) => write!(f, "fact {key} is not finalized"),
            ConsensusError::Storage(e) => write!(f, "state store failure: {e}"),
        }
    }
}

impl std::error::Error for ConsensusError {}
