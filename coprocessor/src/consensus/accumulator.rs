//! Threshold-consensus accumulator for attested facts.
//!
//! Each fact is pinned to the committee its first submitter belonged to.
//! Distinct submissions from that committee are accumulated and the fact
//! finalizes the moment their count reaches the committee's majority
//! threshold. Submissions past that point are still recorded but produce
//! no further event.

use crate::context::{CommitteeRegistry, ContextError, ContextLifecycleManager};
use crate::types::{Address, Attestation, CoprocessorEvent, FactKey, FactRecord};

use super::error::ConsensusError;
use super::store::{Changeset, ContextStore, FactStore};

/// Result of an accepted submission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Submission {
    /// The fact record after this submission.
    pub record: FactRecord,
    /// Majority threshold of the pinned context.
    pub threshold: usize,
    /// `true` only for the submission that crossed the threshold.
    pub finalized_now: bool,
}

/// Stateless accumulation rules applied against a store holding both the
/// context and fact tables.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsensusAccumulator {
    lifecycle: ContextLifecycleManager,
}

impl ConsensusAccumulator {
    pub fn new(lifecycle: ContextLifecycleManager) -> Self {
        Self { lifecycle }
    }

    /// Records `submitter`'s attestation.
    ///
    /// Material fields are taken from the first submission only; later
    /// submissions are not compared against them.
    pub fn submit<S>(
        &self,
        store: &S,
        attestation: &Attestation,
        submitter: Address,
    ) -> Result<(Submission, Changeset), ConsensusError>
    where
        S: ContextStore + FactStore + ?Sized,
    {
        let mut record = match store.get_fact(&attestation.fact_key)? {
            None => {
                let context_id = self.lifecycle.resolve_submitter_context(store, &submitter)?;
                FactRecord::first(attestation, context_id, submitter)
            }
            Some(mut existing) => {
                let status = self.lifecycle.status(store, existing.context_id)?;
                if !status.is_active_or_suspended() {
                    return Err(ConsensusError::FactTargetInvalid {
                        fact_key: existing.fact_key,
                        context_id: existing.context_id,
                        status,
                    });
                }

                let committee = CommitteeRegistry::new(store).committee(existing.context_id)?;
                if !committee.has_tx_sender(&submitter) {
                    return Err(ContextError::NotAMember {
                        context_id: existing.context_id,
                        identity: submitter,
                    }
                    .into());
                }

                if existing.has_submitter(&submitter) {
                    return Err(ConsensusError::DuplicateSubmitter {
                        fact_key: existing.fact_key,
                        identity: submitter,
                    });
                }

                existing.submitters.push(submitter);
                existing
            }
        };

        let threshold = self.lifecycle.majority_threshold(store, record.context_id)?;
        let finalized_now = !record.finalized && record.submitters.len() >= threshold;

        let mut changes = Changeset::default();
        if finalized_now {
            record.finalized = true;
            changes.events.push(CoprocessorEvent::FactFinalized {
                fact_key: record.fact_key,
                context_id: record.context_id,
                ciphertext_digest: record.ciphertext_digest,
                sns_ciphertext_digest: record.sns_ciphertext_digest,
                submitters: record.submitters.clone(),
            });
        }
        changes.delta.put_fact(record.clone());

        Ok((
            Submission {
                record,
                threshold,
                finalized_now,
            },
            changes,
        ))
    }

    /// Returns the stored record of `key`.
    pub fn query<S>(&self, store: &S, key: &FactKey) -> Result<FactRecord, ConsensusError>
    where
        S: FactStore + ?Sized,
    {
        store.get_fact(key)?.ok_or(ConsensusError::FactNotFound(*key))
    }

    /// Fails with [`ConsensusError::FactNotFound`] if `key` was never
    /// submitted.
    pub fn check<S>(&self, store: &S, key: &FactKey) -> Result<(), ConsensusError>
    where
        S: FactStore + ?Sized,
    {
        self.query(store, key).map(|_| ())
    }

    /// Returns the records of every key, in order.
    pub fn query_many<S>(&self, store: &S, keys: &[FactKey]) -> Result<Vec<FactRecord>, ConsensusError>
    where
        S: FactStore + ?Sized,
    {
        keys.iter().map(|key| self.query(store, key)).collect()
    }

    /// Like [`Self::query_many`], but every fact must be finalized.
    pub fn finalized_materials<S>(
        &self,
        store: &S,
        keys: &[FactKey],
    ) -> Result<Vec<FactRecord>, ConsensusError>
    where
        S: FactStore + ?Sized,
    {
        keys.iter()
            .map(|key| {
                let record = self.query(store, key)?;
                if record.finalized {
                    Ok(record)
                } else {
                    Err(ConsensusError::FactNotFinalized(*key))
                }
            })
            .collect()
    }
}
