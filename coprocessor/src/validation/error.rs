use std::fmt;

use crate::types::{Address, ChainId};

/// Rejection raised by an admission gate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GateError {
    /// State-mutating operations are disabled.
    Paused,
    /// The caller lacks the role the operation requires.
    Unauthorized(Address),
    /// The fact key references a host chain that is not registered.
    UnknownChain(ChainId),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::Paused => write!(f, "operation rejected: system is paused"),
            GateError::Unauthorized(who) => write!(f, "caller {who} is not authorized"),
            GateError::UnknownChain(id) => write!(f, "host chain {id} is not registered"),
        }
    }
}

impl std::error::Error for GateError {}
