//! Committee contexts and their lifecycle metadata.
//!
//! A context is one version of the coprocessor committee. Its membership,
//! predecessor and feature set are fixed at creation ([`Committee`]); only
//! the lifecycle fields of the surrounding [`ContextRecord`] change over
//! time.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Address, BlockNumber, ContextId, FeatureSet};

/// A single coprocessor operator within a committee.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CoprocessorMember {
    /// Human-readable operator name.
    pub name: String,

    /// Identity that authorizes attestation submissions.
    pub tx_sender: Address,

    /// Identity that signs off-band attestations.
    ///
    /// Not used by the attestation path itself, only exposed for lookup.
    pub signer: Address,

    /// Where the operator publishes its ciphertext materials.
    pub storage_url: String,
}

/// Lifecycle status of a context.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ContextStatus {
    #[default]
    Uninitialized,
    PreActivation,
    Active,
    Suspended,
    Deactivated,
    Compromised,
    Destroyed,
}

impl ContextStatus {
    pub const fn name(&self) -> &'static str {
        match self {
            ContextStatus::Uninitialized => "uninitialized",
            ContextStatus::PreActivation => "pre_activation",
            ContextStatus::Active => "active",
            ContextStatus::Suspended => "suspended",
            ContextStatus::Deactivated => "deactivated",
            ContextStatus::Compromised => "compromised",
            ContextStatus::Destroyed => "destroyed",
        }
    }

    /// Whether members of a context in this status may still submit.
    pub const fn is_active_or_suspended(&self) -> bool {
        matches!(self, ContextStatus::Active | ContextStatus::Suspended)
    }
}

impl fmt::Display for ContextStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Durations, in blocks, attached to every non-genesis context.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockPeriods {
    /// How long the new context waits in `PreActivation` before it may
    /// replace the active one.
    pub pre_activation_block_period: u64,

    /// How long the displaced context stays `Suspended` before it is
    /// deactivated.
    pub suspended_block_period: u64,
}

/// Immutable part of a context: who is on the committee and under which
/// feature set.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Committee {
    pub context_id: ContextId,

    /// Context that was active when this one was created
    /// ([`ContextId::NONE`] for genesis).
    pub previous_context_id: ContextId,

    pub feature_set: FeatureSet,

    /// Members in registration order; tx-sender and signer identities are
    /// unique within a committee.
    pub members: Vec<CoprocessorMember>,
}

impl Committee {
    /// Number of distinct submitters required to finalize a fact pinned to
    /// this committee: `floor(n / 2) + 1`.
    pub fn majority_threshold(&self) -> usize {
        self.members.len() / 2 + 1
    }

    /// Finds a member by its transaction sender identity.
    pub fn member_by_tx_sender(&self, tx_sender: &Address) -> Option<&CoprocessorMember> {
        self.members.iter().find(|m| &m.tx_sender == tx_sender)
    }

    pub fn has_tx_sender(&self, tx_sender: &Address) -> bool {
        self.member_by_tx_sender(tx_sender).is_some()
    }

    pub fn has_signer(&self, signer: &Address) -> bool {
        self.members.iter().any(|m| &m.signer == signer)
    }

    pub fn tx_senders(&self) -> Vec<Address> {
        self.members.iter().map(|m| m.tx_sender).collect()
    }

    pub fn signers(&self) -> Vec<Address> {
        self.members.iter().map(|m| m.signer).collect()
    }
}

/// A context as persisted: the committee plus mutable lifecycle state.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub committee: Committee,
    pub status: ContextStatus,

    /// Periods requested at rotation time; `None` for genesis.
    pub block_periods: Option<BlockPeriods>,

    /// Block at which a `PreActivation` context becomes eligible to take
    /// over.
    pub activation_block_number: Option<BlockNumber>,

    /// Block at which a `Suspended` context becomes `Deactivated`.
    pub deactivated_block_number: Option<BlockNumber>,
}

impl ContextRecord {
    pub fn id(&self) -> ContextId {
        self.committee.context_id
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            committee: self.committee.clone(),
            status: self.status,
        }
    }
}

/// Point-in-time view of a context, carried by lifecycle events.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub committee: Committee,
    pub status: ContextStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(byte: u8) -> CoprocessorMember {
        CoprocessorMember {
            name: format!("coprocessor-{byte}"),
            tx_sender: Address([byte; 20]),
            signer: Address([byte.wrapping_add(100); 20]),
            storage_url: format!("s3://bucket-{byte}"),
        }
    }

    fn committee(n: u8) -> Committee {
        Committee {
            context_id: ContextId::GENESIS,
            previous_context_id: ContextId::NONE,
            feature_set: FeatureSet(0),
            members: (1..=n).map(member).collect(),
        }
    }

    #[test]
    fn majority_threshold_is_floor_half_plus_one() {
        assert_eq!(committee(1).majority_threshold(), 1);
        assert_eq!(committee(2).majority_threshold(), 2);
        assert_eq!(committee(3).majority_threshold(), 2);
        assert_eq!(committee(4).majority_threshold(), 3);
        assert_eq!(committee(10).majority_threshold(), 6);
    }

    #[test]
    fn lookups_distinguish_tx_senders_and_signers() {
        let c = committee(3);
        assert!(c.has_tx_sender(&Address([2; 20])));
        assert!(!c.has_signer(&Address([2; 20])));
        assert!(c.has_signer(&Address([102; 20])));
        assert_eq!(c.tx_senders().len(), 3);
        assert_eq!(
            c.member_by_tx_sender(&Address([3; 20])).map(|m| m.name.as_str()),
            Some("coprocessor-3")
        );
    }

    #[test]
    fn only_active_and_suspended_accept_submissions() {
        assert!(ContextStatus::Active.is_active_or_suspended());
        assert!(ContextStatus::Suspended.is_active_or_suspended());
        for status in [
            ContextStatus::Uninitialized,
            ContextStatus::PreActivation,
            ContextStatus::Deactivated,
            ContextStatus::Compromised,
            ContextStatus::Destroyed,
        ] {
            assert!(!status.is_active_or_suspended(), "{status}");
        }
    }
}
