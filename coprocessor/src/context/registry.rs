//! Committee registry: read-only lookups over per-version membership.
//!
//! Membership and metadata of a context never change after creation, so
//! every lookup here is a pure function of the stored committee.

use std::collections::HashSet;

use crate::consensus::store::ContextStore;
use crate::types::{Address, Committee, ContextId, CoprocessorMember};

use super::error::ContextError;

/// Lookup view over the committees held in a [`ContextStore`].
pub struct CommitteeRegistry<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S> CommitteeRegistry<'s, S>
where
    S: ContextStore + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn contains(&self, id: ContextId) -> Result<bool, ContextError> {
        if id.is_none() {
            return Ok(false);
        }
        Ok(self.store.get_context(id)?.is_some())
    }

    /// Returns the committee of context `id`.
    pub fn committee(&self, id: ContextId) -> Result<Committee, ContextError> {
        self.store
            .get_context(id)?
            .map(|record| record.committee)
            .ok_or(ContextError::UnknownContext(id))
    }

    /// Looks up a member of context `id` by its tx-sender identity.
    pub fn member(
        &self,
        id: ContextId,
        tx_sender: &Address,
    ) -> Result<CoprocessorMember, ContextError> {
        let committee = self.committee(id)?;
        committee
            .member_by_tx_sender(tx_sender)
            .cloned()
            .ok_or(ContextError::NotAMember {
                context_id: id,
                identity: *tx_sender,
            })
    }

    pub fn is_tx_sender(&self, id: ContextId, who: &Address) -> Result<bool, ContextError> {
        Ok(self.committee(id)?.has_tx_sender(who))
    }

    pub fn is_signer(&self, id: ContextId, who: &Address) -> Result<bool, ContextError> {
        Ok(self.committee(id)?.has_signer(who))
    }

    pub fn tx_senders(&self, id: ContextId) -> Result<Vec<Address>, ContextError> {
        Ok(self.committee(id)?.tx_senders())
    }

    pub fn signers(&self, id: ContextId) -> Result<Vec<Address>, ContextError> {
        Ok(self.committee(id)?.signers())
    }

    /// `floor(member_count / 2) + 1` for context `id`.
    pub fn majority_threshold(&self, id: ContextId) -> Result<usize, ContextError> {
        Ok(self.committee(id)?.majority_threshold())
    }
}

/// Checks a candidate member list before it becomes a committee.
///
/// The list must be non-empty, no identity may be null, and tx-sender and
/// signer identities must each be unique.
pub fn validate_members(members: &[CoprocessorMember]) -> Result<(), ContextError> {
    if members.is_empty() {
        return Err(ContextError::EmptyCommittee);
    }

    let mut tx_senders = HashSet::with_capacity(members.len());
    let mut signers = HashSet::with_capacity(members.len());

    for (index, member) in members.iter().enumerate() {
        if member.tx_sender.is_zero() || member.signer.is_zero() {
            return Err(ContextError::NullMemberIdentity { index });
        }
        if !tx_senders.insert(member.tx_sender) {
            return Err(ContextError::DuplicateMemberIdentity(member.tx_sender));
        }
        if !signers.insert(member.signer) {
            return Err(ContextError::DuplicateMemberIdentity(member.signer));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::store::{StateDelta, StateStore};
    use crate::storage::InMemoryStateStore;
    use crate::types::{ContextRecord, ContextStatus, FeatureSet};

    fn member(byte: u8) -> CoprocessorMember {
        CoprocessorMember {
            name: format!("coprocessor-{byte}"),
            tx_sender: Address([byte; 20]),
            signer: Address([byte.wrapping_add(100); 20]),
            storage_url: String::new(),
        }
    }

    fn store_with_genesis(n: u8) -> InMemoryStateStore {
        let mut store = InMemoryStateStore::new();
        let mut delta = StateDelta::new();
        delta.put_context(ContextRecord {
            committee: Committee {
                context_id: ContextId::GENESIS,
                previous_context_id: ContextId::NONE,
                feature_set: FeatureSet(7),
                members: (1..=n).map(member).collect(),
            },
            status: ContextStatus::Active,
            block_periods: None,
            activation_block_number: None,
            deactivated_block_number: None,
        });
        store.commit(delta).expect("commit");
        store
    }

    #[test]
    fn lookups_resolve_against_stored_committee() {
        let store = store_with_genesis(3);
        let registry = CommitteeRegistry::new(&store);

        assert_eq!(registry.contains(ContextId::GENESIS), Ok(true));
        assert_eq!(registry.contains(ContextId::NONE), Ok(false));
        assert_eq!(registry.contains(ContextId(2)), Ok(false));

        assert_eq!(registry.majority_threshold(ContextId::GENESIS), Ok(2));
        assert_eq!(
            registry.tx_senders(ContextId::GENESIS).map(|v| v.len()),
            Ok(3)
        );
        assert_eq!(
            registry
                .member(ContextId::GENESIS, &Address([2; 20]))
                .map(|m| m.name),
            Ok("coprocessor-2".to_string())
        );
        assert_eq!(registry.is_signer(ContextId::GENESIS, &Address([101; 20])), Ok(true));
    }

    #[test]
    fn missing_member_and_context_are_reported() {
        let store = store_with_genesis(1);
        let registry = CommitteeRegistry::new(&store);

        let stranger = Address([9; 20]);
        assert_eq!(
            registry.member(ContextId::GENESIS, &stranger),
            Err(ContextError::NotAMember {
                context_id: ContextId::GENESIS,
                identity: stranger,
            })
        );
        assert_eq!(
            registry.committee(ContextId(5)),
            Err(ContextError::UnknownContext(ContextId(5)))
        );
    }

    #[test]
    fn member_validation_rejects_bad_committees() {
        assert_eq!(validate_members(&[]), Err(ContextError::EmptyCommittee));

        let mut null_signer = member(2);
        null_signer.signer = Address::ZERO;
        assert_eq!(
            validate_members(&[member(1), null_signer]),
            Err(ContextError::NullMemberIdentity { index: 1 })
        );

        assert_eq!(
            validate_members(&[member(1), member(1)]),
            Err(ContextError::DuplicateMemberIdentity(Address([1; 20])))
        );

        assert!(validate_members(&[member(1), member(2), member(3)]).is_ok());
    }
}
