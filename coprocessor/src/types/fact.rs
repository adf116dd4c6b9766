//! Attestations and accumulated fact records.

use serde::{Deserialize, Serialize};

use super::{Address, ContextId, FactKey, Hash256, KeyId};

/// One coprocessor's claim about a ciphertext handle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub fact_key: FactKey,
    pub key_id: KeyId,
    /// Digest of the regular ciphertext.
    pub ciphertext_digest: Hash256,
    /// Digest of the switch-and-squash ciphertext.
    pub sns_ciphertext_digest: Hash256,
}

/// Accumulated state of a fact.
///
/// Material fields come from the first submission and are never rewritten.
/// `context_id` is pinned at first submission as well.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FactRecord {
    pub fact_key: FactKey,
    pub key_id: KeyId,
    pub ciphertext_digest: Hash256,
    pub sns_ciphertext_digest: Hash256,
    pub context_id: ContextId,
    /// Distinct submitters in arrival order.
    pub submitters: Vec<Address>,
    pub finalized: bool,
}

impl FactRecord {
    /// Creates the record for a fact's first submission.
    pub fn first(attestation: &Attestation, context_id: ContextId, submitter: Address) -> Self {
        Self {
            fact_key: attestation.fact_key,
            key_id: attestation.key_id,
            ciphertext_digest: attestation.ciphertext_digest,
            sns_ciphertext_digest: attestation.sns_ciphertext_digest,
            context_id,
            submitters: vec![submitter],
            finalized: false,
        }
    }

    pub fn has_submitter(&self, who: &Address) -> bool {
        self.submitters.contains(who)
    }
}
