//! Host-chain registry gate.

use std::collections::BTreeSet;

use crate::types::ChainId;

use super::error::GateError;

/// External registry of host chains whose fact keys may be attested.
pub trait HostChainRegistry {
    fn is_registered(&self, chain_id: ChainId) -> bool;

    /// Fails with [`GateError::UnknownChain`] for an unregistered chain.
    fn check_registered(&self, chain_id: ChainId) -> Result<(), GateError> {
        if self.is_registered(chain_id) {
            Ok(())
        } else {
            Err(GateError::UnknownChain(chain_id))
        }
    }
}

/// Fixed, in-process set of registered host chains.
#[derive(Clone, Debug, Default)]
pub struct StaticHostChainRegistry {
    chains: BTreeSet<ChainId>,
}

impl StaticHostChainRegistry {
    pub fn new(chains: impl IntoIterator<Item = ChainId>) -> Self {
        Self {
            chains: chains.into_iter().collect(),
        }
    }

    /// Registers a chain. Returns `false` if it was already known.
    pub fn register(&mut self, chain_id: ChainId) -> bool {
        self.chains.insert(chain_id)
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainId> {
        self.chains.iter()
    }
}

impl HostChainRegistry for StaticHostChainRegistry {
    fn is_registered(&self, chain_id: ChainId) -> bool {
        self.chains.contains(&chain_id)
    }
}
