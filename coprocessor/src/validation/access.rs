//! Access-control and pause gate.

use crate::types::Address;

use super::error::GateError;

/// Capability checks for privileged operations.
///
/// Implementations must be deterministic: the same caller and state always
/// yield the same answer.
pub trait AccessControl {
    /// Whether `who` may rotate, compromise, destroy or roll back contexts.
    fn is_privileged(&self, who: &Address) -> bool;

    /// While paused, every state-mutating entry point is rejected.
    fn is_paused(&self) -> bool;

    fn check_not_paused(&self) -> Result<(), GateError> {
        if self.is_paused() {
            Err(GateError::Paused)
        } else {
            Ok(())
        }
    }

    fn check_privileged(&self, who: &Address) -> Result<(), GateError> {
        if self.is_privileged(who) {
            Ok(())
        } else {
            Err(GateError::Unauthorized(*who))
        }
    }
}

/// Two-role gate: an owner and a pauser.
///
/// Both roles are privileged. Only the pauser may pause and only the owner
/// may unpause.
#[derive(Clone, Debug)]
pub struct RoleAccessControl {
    owner: Address,
    pauser: Address,
    paused: bool,
}

impl RoleAccessControl {
    pub fn new(owner: Address, pauser: Address) -> Self {
        Self {
            owner,
            pauser,
            paused: false,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn pauser(&self) -> Address {
        self.pauser
    }

    pub fn pause(&mut self, caller: &Address) -> Result<(), GateError> {
        if caller != &self.pauser {
            return Err(GateError::Unauthorized(*caller));
        }
        self.paused = true;
        tracing::warn!(caller = %caller, "coprocessor paused");
        Ok(())
    }

    pub fn unpause(&mut self, caller: &Address) -> Result<(), GateError> {
        if caller != &self.owner {
            return Err(GateError::Unauthorized(*caller));
        }
        self.paused = false;
        tracing::info!(caller = %caller, "coprocessor unpaused");
        Ok(())
    }
}

impl AccessControl for RoleAccessControl {
    fn is_privileged(&self, who: &Address) -> bool {
        who == &self.owner || who == &self.pauser
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}
