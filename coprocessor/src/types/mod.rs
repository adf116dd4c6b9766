//! Core domain types shared by the coprocessor crate.
//!
//! This module defines strongly-typed hashes, identities, context and chain
//! identifiers, and the handle type used to key attested facts. The goal is
//! to avoid "naked" integers and byte buffers in public APIs and instead use
//! domain-specific newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Committee contexts, members, lifecycle status and block periods.
pub mod context;
/// Lifecycle and finalization events.
pub mod event;
/// Attestations and accumulated fact records.
pub mod fact;

pub use context::{
    BlockPeriods, Committee, ContextRecord, ContextSnapshot, ContextStatus, CoprocessorMember,
};
pub use event::CoprocessorEvent;
pub use fact::{Attestation, FactRecord};

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Length in bytes of an [`Address`].
pub const ADDRESS_LEN: usize = 20;

/// External monotonic block counter value.
pub type BlockNumber = u64;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// Used as the backing representation for ciphertext digests and fact
/// handles. It is always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// 20-byte account identity of a committee member or operator.
///
/// Members carry two of these: a transaction sender that authorizes
/// submissions and a signer used for off-band attestations. The all-zero
/// address is the null identity and is never a valid member.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The null identity.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Returns `true` for the null identity.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// Derives an address from arbitrary key material.
    ///
    /// The address is the trailing [`ADDRESS_LEN`] bytes of the BLAKE3 hash
    /// of `seed`. Different encodings of the same key give different
    /// addresses, so callers must pass a canonical encoding.
    pub fn from_seed(seed: &[u8]) -> Self {
        let h = Hash256::compute(seed);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&h.0[HASH_LEN - ADDRESS_LEN..]);
        Address(out)
    }

    /// Returns the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Identifier of a committee version.
///
/// Ids are allocated contiguously starting at [`ContextId::GENESIS`];
/// [`ContextId::NONE`] marks "no context" (e.g. the predecessor of genesis).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ContextId(pub u64);

impl ContextId {
    pub const NONE: ContextId = ContextId(0);
    pub const GENESIS: ContextId = ContextId(1);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Returns the id allocated right after this one.
    pub fn next(&self) -> ContextId {
        ContextId(self.0 + 1)
    }

    /// Big-endian encoding, used as a sortable storage key.
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host chain identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the FHE key a ciphertext was produced under.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct KeyId(pub u64);

/// Opaque capability flags attached to a context.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FeatureSet(pub u64);

/// Handle of an attested fact (a ciphertext handle).
///
/// Handles are produced on a host chain and embed that chain's id as a
/// big-endian `u64` at bytes `22..30`. The remaining bytes are opaque to
/// this crate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct FactKey(pub Hash256);

impl FactKey {
    const CHAIN_ID_OFFSET: usize = 22;

    /// Builds a handle from an opaque prefix and the host chain id.
    ///
    /// The first 22 bytes come from the BLAKE3 hash of `prefix`, the chain
    /// id fills bytes `22..30` and the trailing two bytes are zero.
    pub fn for_chain(prefix: &[u8], chain_id: ChainId) -> Self {
        let mut bytes = [0u8; HASH_LEN];
        let h = Hash256::compute(prefix);
        bytes[..Self::CHAIN_ID_OFFSET].copy_from_slice(&h.0[..Self::CHAIN_ID_OFFSET]);
        bytes[Self::CHAIN_ID_OFFSET..Self::CHAIN_ID_OFFSET + 8]
            .copy_from_slice(&chain_id.0.to_be_bytes());
        FactKey(Hash256(bytes))
    }

    /// Extracts the host chain id embedded in the handle.
    pub fn host_chain_id(&self) -> ChainId {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.0.0[Self::CHAIN_ID_OFFSET..Self::CHAIN_ID_OFFSET + 8]);
        ChainId(u64::from_be_bytes(raw))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        self.0.as_bytes()
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
