//! Coordinating engine.
//!
//! [`CoprocessorEngine`] owns the state store and wires together:
//!
//! - the admission gates ([`AccessControl`], [`HostChainRegistry`]),
//! - the [`ContextLifecycleManager`] and the [`ConsensusAccumulator`],
//! - an [`EventSink`] and, optionally, [`ConsensusMetrics`].
//!
//! Every mutating entry point follows the same shape: check the gates,
//! compute a [`Changeset`] from reads only, commit its delta in one call,
//! then publish its events. Events and metrics are only emitted once the
//! commit succeeded, so a failing call (including a failing store) changes
//! nothing and emits nothing.

use std::time::Instant;

use crate::context::{CommitteeRegistry, ContextError, ContextLifecycleManager};
use crate::metrics::ConsensusMetrics;
use crate::storage::StorageError;
use crate::types::{
    Address, Attestation, BlockNumber, BlockPeriods, ContextId, ContextRecord, ContextStatus,
    CoprocessorMember, FactKey, FactRecord, FeatureSet,
};
use crate::validation::{AccessControl, HostChainRegistry};

use super::accumulator::{ConsensusAccumulator, Submission};
use super::error::ConsensusError;
use super::events::EventSink;
use super::store::{Changeset, StateStore};

/// Coprocessor context management and attestation consensus over a single
/// state store.
///
/// Generic over:
///
/// - `S`: state backend implementing [`StateStore`],
/// - `H`: host-chain registry implementing [`HostChainRegistry`],
/// - `A`: access gate implementing [`AccessControl`],
/// - `E`: event observer implementing [`EventSink`].
pub struct CoprocessorEngine<S, H, A, E> {
    store: S,
    host_chains: H,
    access: A,
    sink: E,
    lifecycle: ContextLifecycleManager,
    accumulator: ConsensusAccumulator,
    metrics: Option<ConsensusMetrics>,
}

impl<S, H, A, E> CoprocessorEngine<S, H, A, E>
where
    S: StateStore,
    H: HostChainRegistry,
    A: AccessControl,
    E: EventSink,
{
    pub fn new(store: S, host_chains: H, access: A, sink: E) -> Self {
        let lifecycle = ContextLifecycleManager::new();
        Self {
            store,
            host_chains,
            access,
            sink,
            lifecycle,
            accumulator: ConsensusAccumulator::new(lifecycle),
            metrics: None,
        }
    }

    /// Records submissions and transitions into `metrics`.
    pub fn with_metrics(mut self, metrics: ConsensusMetrics) -> Self {
        if let Ok(active) = self.lifecycle.active_context_id(&self.store) {
            metrics.active_context_id.set(active.0 as i64);
        }
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut E {
        &mut self.sink
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    /// Mutable access to the gate, e.g. to pause or unpause it.
    pub fn access_mut(&mut self) -> &mut A {
        &mut self.access
    }

    pub fn host_chains_mut(&mut self) -> &mut H {
        &mut self.host_chains
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Installs the genesis committee. Only legal on an empty store.
    pub fn bootstrap(
        &mut self,
        feature_set: FeatureSet,
        members: Vec<CoprocessorMember>,
    ) -> Result<(), ContextError> {
        self.access.check_not_paused()?;
        let changes = self.lifecycle.bootstrap(&self.store, feature_set, members)?;
        self.apply(changes)?;
        tracing::info!("coprocessor contexts bootstrapped");
        Ok(())
    }

    /// Schedules a rotation to `members` and returns the new context id.
    pub fn request_rotation(
        &mut self,
        caller: &Address,
        now: BlockNumber,
        feature_set: FeatureSet,
        block_periods: BlockPeriods,
        members: Vec<CoprocessorMember>,
    ) -> Result<ContextId, ContextError> {
        self.access.check_not_paused()?;
        self.access.check_privileged(caller)?;

        let changes = self.lifecycle.request_rotation(
            &self.store,
            now,
            feature_set,
            block_periods,
            members,
        )?;
        let context_id = match changes.delta.max_context_id() {
            Some(id) => id,
            None => self.store.latest_context_id()?,
        };
        self.apply(changes)?;
        Ok(context_id)
    }

    /// Applies the transitions due at block `now` and returns how many
    /// events that produced.
    pub fn refresh(&mut self, now: BlockNumber) -> Result<usize, ContextError> {
        self.access.check_not_paused()?;
        let changes = self.lifecycle.refresh(&self.store, now)?;
        let produced = changes.events.len();
        self.apply(changes)?;
        Ok(produced)
    }

    pub fn compromise(&mut self, caller: &Address, id: ContextId) -> Result<(), ContextError> {
        self.access.check_not_paused()?;
        self.access.check_privileged(caller)?;
        let changes = self.lifecycle.compromise(&self.store, id)?;
        self.apply(changes)?;
        Ok(())
    }

    pub fn destroy(&mut self, caller: &Address, id: ContextId) -> Result<(), ContextError> {
        self.access.check_not_paused()?;
        self.access.check_privileged(caller)?;
        let changes = self.lifecycle.destroy(&self.store, id)?;
        self.apply(changes)?;
        Ok(())
    }

    /// Rolls back the last rotation while its wind-down is still pending.
    pub fn move_suspended_to_active(&mut self, caller: &Address) -> Result<(), ContextError> {
        self.access.check_not_paused()?;
        self.access.check_privileged(caller)?;
        let changes = self.lifecycle.move_suspended_to_active(&self.store)?;
        self.apply(changes)?;
        Ok(())
    }

    // ---------------------------
    // Attestations
    // ---------------------------

    /// Records `submitter`'s attestation.
    pub fn submit(
        &mut self,
        submitter: Address,
        attestation: &Attestation,
    ) -> Result<Submission, ConsensusError> {
        let start = Instant::now();
        let result = self.try_submit(submitter, attestation);

        if let Some(metrics) = &self.metrics {
            metrics
                .submission_seconds
                .observe(start.elapsed().as_secs_f64());
            match &result {
                Ok(_) => metrics.attestations_accepted.inc(),
                Err(_) => metrics.attestations_rejected.inc(),
            }
        }

        match &result {
            Ok(submission) => tracing::debug!(
                fact_key = %attestation.fact_key,
                submitter = %submitter,
                context = %submission.record.context_id,
                submitters = submission.record.submitters.len(),
                threshold = submission.threshold,
                "attestation accepted"
            ),
            Err(e) => tracing::warn!(
                fact_key = %attestation.fact_key,
                submitter = %submitter,
                error = %e,
                "attestation rejected"
            ),
        }
        result
    }

    fn try_submit(
        &mut self,
        submitter: Address,
        attestation: &Attestation,
    ) -> Result<Submission, ConsensusError> {
        self.access.check_not_paused()?;
        self.host_chains
            .check_registered(attestation.fact_key.host_chain_id())?;

        let (submission, changes) = self
            .accumulator
            .submit(&self.store, attestation, submitter)?;
        self.apply(changes)?;
        Ok(submission)
    }

    /// Commits the delta, then publishes the events.
    ///
    /// Nothing is published when the commit fails.
    fn apply(&mut self, changes: Changeset) -> Result<(), StorageError> {
        let Changeset { delta, events } = changes;
        if !delta.is_empty() {
            self.store.commit(delta)?;
        }
        for event in &events {
            if let Some(metrics) = &self.metrics {
                metrics.observe_event(event);
            }
            self.sink.publish(event);
        }
        Ok(())
    }

    // ---------------------------
    // Fact queries
    // ---------------------------

    pub fn query_fact(&self, key: &FactKey) -> Result<FactRecord, ConsensusError> {
        self.accumulator.query(&self.store, key)
    }

    pub fn check_fact(&self, key: &FactKey) -> Result<(), ConsensusError> {
        self.accumulator.check(&self.store, key)
    }

    pub fn query_materials(&self, keys: &[FactKey]) -> Result<Vec<FactRecord>, ConsensusError> {
        self.accumulator.query_many(&self.store, keys)
    }

    pub fn finalized_materials(
        &self,
        keys: &[FactKey],
    ) -> Result<Vec<FactRecord>, ConsensusError> {
        self.accumulator.finalized_materials(&self.store, keys)
    }

    // ---------------------------
    // Context queries
    // ---------------------------

    /// Membership lookups over every stored committee.
    pub fn committees(&self) -> CommitteeRegistry<'_, S> {
        CommitteeRegistry::new(&self.store)
    }

    pub fn context(&self, id: ContextId) -> Result<ContextRecord, ContextError> {
        self.lifecycle.context(&self.store, id)
    }

    pub fn context_exists(&self, id: ContextId) -> Result<bool, ContextError> {
        self.lifecycle.context_exists(&self.store, id)
    }

    pub fn status(&self, id: ContextId) -> Result<ContextStatus, ContextError> {
        self.lifecycle.status(&self.store, id)
    }

    pub fn is_active_or_suspended(&self, id: ContextId) -> Result<bool, ContextError> {
        self.lifecycle.is_active_or_suspended(&self.store, id)
    }

    pub fn active_context_id(&self) -> Result<ContextId, ContextError> {
        self.lifecycle.active_context_id(&self.store)
    }

    pub fn active_context(&self) -> Result<ContextRecord, ContextError> {
        self.lifecycle.active_context(&self.store)
    }

    pub fn pre_activation_context_id(&self) -> Result<ContextId, ContextError> {
        self.lifecycle.pre_activation_context_id(&self.store)
    }

    pub fn pre_activation_context(&self) -> Result<ContextRecord, ContextError> {
        self.lifecycle.pre_activation_context(&self.store)
    }

    pub fn suspended_context_id(&self) -> Result<ContextId, ContextError> {
        self.lifecycle.suspended_context_id(&self.store)
    }

    pub fn suspended_context(&self) -> Result<ContextRecord, ContextError> {
        self.lifecycle.suspended_context(&self.store)
    }

    pub fn activation_block_number(
        &self,
        id: ContextId,
    ) -> Result<Option<BlockNumber>, ContextError> {
        self.lifecycle.activation_block_number(&self.store, id)
    }

    pub fn deactivated_block_number(
        &self,
        id: ContextId,
    ) -> Result<Option<BlockNumber>, ContextError> {
        self.lifecycle.deactivated_block_number(&self.store, id)
    }

    pub fn member(&self, id: ContextId, who: &Address) -> Result<CoprocessorMember, ContextError> {
        self.lifecycle.member(&self.store, id, who)
    }

    pub fn active_member(&self, who: &Address) -> Result<CoprocessorMember, ContextError> {
        self.lifecycle.active_member(&self.store, who)
    }

    /// Is `who` a tx-sender of the active context?
    pub fn is_tx_sender(&self, who: &Address) -> Result<bool, ContextError> {
        let id = self.active_context_id()?;
        self.committees().is_tx_sender(id, who)
    }

    /// Is `who` a signer of the active context?
    pub fn is_signer(&self, who: &Address) -> Result<bool, ContextError> {
        let id = self.active_context_id()?;
        self.committees().is_signer(id, who)
    }

    pub fn majority_threshold(&self, id: ContextId) -> Result<usize, ContextError> {
        self.lifecycle.majority_threshold(&self.store, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::events::EventLog;
    use crate::consensus::store::{ContextPointers, ContextStore, FactStore, StateDelta};
    use crate::storage::InMemoryStateStore;
    use crate::types::{ChainId, CoprocessorEvent, Hash256, KeyId};
    use crate::validation::{GateError, RoleAccessControl, StaticHostChainRegistry};

    type TestEngine =
        CoprocessorEngine<InMemoryStateStore, StaticHostChainRegistry, RoleAccessControl, EventLog>;

    fn owner() -> Address {
        Address::from_seed(b"owner")
    }

    fn pauser() -> Address {
        Address::from_seed(b"pauser")
    }

    fn member(seed: &str) -> CoprocessorMember {
        CoprocessorMember {
            name: seed.to_string(),
            tx_sender: Address::from_seed(format!("{seed}/tx").as_bytes()),
            signer: Address::from_seed(format!("{seed}/signer").as_bytes()),
            storage_url: format!("https://storage.example/{seed}"),
        }
    }

    fn committee(prefix: &str, n: usize) -> Vec<CoprocessorMember> {
        (0..n).map(|i| member(&format!("{prefix}-{i}"))).collect()
    }

    fn tx(prefix: &str, i: usize) -> Address {
        member(&format!("{prefix}-{i}")).tx_sender
    }

    fn attestation_on(name: &str, chain: ChainId) -> Attestation {
        Attestation {
            fact_key: FactKey::for_chain(name.as_bytes(), chain),
            key_id: KeyId(7),
            ciphertext_digest: Hash256::compute(format!("{name}/ct").as_bytes()),
            sns_ciphertext_digest: Hash256::compute(format!("{name}/sns").as_bytes()),
        }
    }

    fn attestation(name: &str) -> Attestation {
        attestation_on(name, ChainId(1))
    }

    fn periods(pre_activation: u64, suspended: u64) -> BlockPeriods {
        BlockPeriods {
            pre_activation_block_period: pre_activation,
            suspended_block_period: suspended,
        }
    }

    fn engine(members: usize) -> TestEngine {
        engine_over(InMemoryStateStore::new(), members)
    }

    fn engine_over<S: StateStore>(
        store: S,
        members: usize,
    ) -> CoprocessorEngine<S, StaticHostChainRegistry, RoleAccessControl, EventLog> {
        let mut engine = CoprocessorEngine::new(
            store,
            StaticHostChainRegistry::new([ChainId(1)]),
            RoleAccessControl::new(owner(), pauser()),
            EventLog::new(),
        );
        engine
            .bootstrap(FeatureSet(0), committee("genesis", members))
            .expect("bootstrap");
        engine.sink_mut().drain();
        engine
    }

    /// In-memory store whose commits can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStateStore,
        fail_commits: bool,
    }

    impl ContextStore for FlakyStore {
        fn get_context(&self, id: ContextId) -> Result<Option<ContextRecord>, StorageError> {
            self.inner.get_context(id)
        }

        fn pointers(&self) -> Result<ContextPointers, StorageError> {
            self.inner.pointers()
        }

        fn latest_context_id(&self) -> Result<ContextId, StorageError> {
            self.inner.latest_context_id()
        }
    }

    impl FactStore for FlakyStore {
        fn get_fact(&self, key: &FactKey) -> Result<Option<FactRecord>, StorageError> {
            self.inner.get_fact(key)
        }
    }

    impl StateStore for FlakyStore {
        fn commit(&mut self, delta: StateDelta) -> Result<(), StorageError> {
            if self.fail_commits {
                return Err(StorageError::Unavailable("disk full".to_string()));
            }
            self.inner.commit(delta)
        }
    }

    fn finalized_events<S: StateStore>(
        engine: &CoprocessorEngine<S, StaticHostChainRegistry, RoleAccessControl, EventLog>,
    ) -> Vec<&CoprocessorEvent> {
        engine
            .sink()
            .events()
            .iter()
            .filter(|e| matches!(e, CoprocessorEvent::FactFinalized { .. }))
            .collect()
    }

    #[test]
    fn basic_consensus_with_three_members() {
        let mut engine = engine(3);
        let fact = attestation("h");
        let (a, b, c) = (tx("genesis", 0), tx("genesis", 1), tx("genesis", 2));

        let first = engine.submit(a, &fact).expect("A submits");
        assert!(!first.finalized_now);
        assert!(!first.record.finalized);
        assert_eq!(first.record.submitters, vec![a]);
        assert!(engine.sink().is_empty());

        let second = engine.submit(b, &fact).expect("B submits");
        assert!(second.finalized_now);
        match finalized_events(&engine).as_slice() {
            [CoprocessorEvent::FactFinalized {
                fact_key,
                context_id,
                ciphertext_digest,
                submitters,
                ..
            }] => {
                assert_eq!(*fact_key, fact.fact_key);
                assert_eq!(*context_id, ContextId::GENESIS);
                assert_eq!(*ciphertext_digest, fact.ciphertext_digest);
                assert_eq!(submitters, &vec![a, b]);
            }
            other => panic!("expected one FactFinalized event, got {other:?}"),
        }

        let third = engine.submit(c, &fact).expect("C submits");
        assert!(!third.finalized_now);
        assert_eq!(finalized_events(&engine).len(), 1);

        let stored = engine.query_fact(&fact.fact_key).expect("stored");
        assert_eq!(stored.submitters, vec![a, b, c]);
        assert!(stored.finalized);
    }

    #[test]
    fn rotation_overlap_keeps_outgoing_committee_working() {
        let mut engine = engine(3);
        let fact = attestation("overlap");

        let new_id = engine
            .request_rotation(&owner(), 0, FeatureSet(1), periods(100, 50), committee("next", 10))
            .expect("rotation");
        assert_eq!(new_id, ContextId(2));
        assert_eq!(engine.status(new_id), Ok(ContextStatus::PreActivation));
        assert_eq!(engine.activation_block_number(new_id), Ok(Some(100)));

        // Context 1 is still the only active committee.
        engine.refresh(99).expect("refresh");
        let first = engine.submit(tx("genesis", 0), &fact).expect("A submits");
        assert_eq!(first.record.context_id, ContextId::GENESIS);

        engine.refresh(100).expect("refresh");
        assert_eq!(engine.status(ContextId::GENESIS), Ok(ContextStatus::Suspended));
        assert_eq!(engine.status(new_id), Ok(ContextStatus::Active));
        assert_eq!(engine.deactivated_block_number(ContextId::GENESIS), Ok(Some(150)));

        let second = engine.submit(tx("genesis", 1), &fact).expect("B submits");
        assert!(second.finalized_now);
        assert_eq!(second.threshold, 2);
        assert_eq!(second.record.context_id, ContextId::GENESIS);
    }

    #[test]
    fn stale_context_rejects_further_submissions() {
        let mut engine = engine(3);
        let fact = attestation("stale");

        engine.submit(tx("genesis", 0), &fact).expect("A submits");
        engine
            .request_rotation(&owner(), 10, FeatureSet(1), periods(5, 20), committee("next", 10))
            .expect("rotation");
        engine.refresh(15).expect("activate");
        engine.refresh(35).expect("deactivate");
        assert_eq!(engine.status(ContextId::GENESIS), Ok(ContextStatus::Deactivated));

        let err = engine.submit(tx("genesis", 1), &fact).unwrap_err();
        assert_eq!(
            err,
            ConsensusError::FactTargetInvalid {
                fact_key: fact.fact_key,
                context_id: ContextId::GENESIS,
                status: ContextStatus::Deactivated,
            }
        );
        let stored = engine.query_fact(&fact.fact_key).expect("stored");
        assert_eq!(stored.submitters.len(), 1);
    }

    #[test]
    fn compromise_and_destroy_require_non_active_context() {
        let mut engine = engine(3);
        assert_eq!(
            engine.compromise(&owner(), ContextId::GENESIS),
            Err(ContextError::ContextStillActive(ContextId::GENESIS))
        );
        assert_eq!(
            engine.destroy(&owner(), ContextId::GENESIS),
            Err(ContextError::ContextStillActive(ContextId::GENESIS))
        );

        engine
            .request_rotation(&owner(), 0, FeatureSet(1), periods(1, 100), committee("next", 4))
            .expect("rotation");
        engine.refresh(1).expect("refresh");
        assert_eq!(engine.suspended_context_id(), Ok(ContextId::GENESIS));

        engine
            .compromise(&pauser(), ContextId::GENESIS)
            .expect("compromise suspended");
        assert_eq!(engine.status(ContextId::GENESIS), Ok(ContextStatus::Compromised));
        assert_eq!(engine.suspended_context_id(), Err(ContextError::NoSuspendedContext));

        engine
            .destroy(&owner(), ContextId::GENESIS)
            .expect("destroy compromised");
        assert_eq!(engine.status(ContextId::GENESIS), Ok(ContextStatus::Destroyed));
    }

    #[test]
    fn rollback_restores_suspended_committee() {
        let mut engine = engine(3);
        engine
            .request_rotation(&owner(), 0, FeatureSet(1), periods(2, 100), committee("next", 4))
            .expect("rotation");
        engine.refresh(2).expect("refresh");

        engine
            .move_suspended_to_active(&owner())
            .expect("rollback");
        assert_eq!(engine.active_context_id(), Ok(ContextId::GENESIS));
        assert_eq!(engine.status(ContextId(2)), Ok(ContextStatus::Deactivated));
        assert_eq!(engine.is_tx_sender(&tx("genesis", 0)), Ok(true));
        assert_eq!(engine.is_tx_sender(&tx("next", 0)), Ok(false));
        assert_eq!(
            engine.move_suspended_to_active(&owner()),
            Err(ContextError::NoSuspendedContext)
        );
    }

    #[test]
    fn pause_blocks_mutations_but_not_queries() {
        let mut engine = engine(3);
        let fact = attestation("paused");
        engine.submit(tx("genesis", 0), &fact).expect("submit");

        engine.access_mut().pause(&pauser()).expect("pause");

        assert_eq!(
            engine.submit(tx("genesis", 1), &fact),
            Err(ConsensusError::Gate(GateError::Paused))
        );
        assert_eq!(
            engine.request_rotation(&owner(), 0, FeatureSet(1), periods(1, 1), committee("n", 3)),
            Err(ContextError::Gate(GateError::Paused))
        );
        assert_eq!(engine.refresh(10), Err(ContextError::Gate(GateError::Paused)));
        assert_eq!(
            engine.compromise(&owner(), ContextId::GENESIS),
            Err(ContextError::Gate(GateError::Paused))
        );

        assert_eq!(engine.active_context_id(), Ok(ContextId::GENESIS));
        assert_eq!(engine.majority_threshold(ContextId::GENESIS), Ok(2));
        assert!(engine.check_fact(&fact.fact_key).is_ok());

        engine.access_mut().unpause(&owner()).expect("unpause");
        assert!(engine.submit(tx("genesis", 1), &fact).expect("submit").finalized_now);
    }

    #[test]
    fn privileged_operations_reject_other_callers() {
        let mut engine = engine(3);
        let outsider = tx("genesis", 0);

        assert_eq!(
            engine.request_rotation(&outsider, 0, FeatureSet(1), periods(1, 1), committee("n", 3)),
            Err(ContextError::Gate(GateError::Unauthorized(outsider)))
        );
        assert_eq!(
            engine.move_suspended_to_active(&outsider),
            Err(ContextError::Gate(GateError::Unauthorized(outsider)))
        );
        assert_eq!(engine.pre_activation_context_id(), Err(ContextError::NoPreActivationContext));
    }

    #[test]
    fn unknown_host_chain_is_rejected_before_consensus() {
        let mut engine = engine(3);
        let foreign = attestation_on("elsewhere", ChainId(99));
        let outsider = Address::from_seed(b"outsider");

        assert_eq!(
            engine.submit(outsider, &foreign),
            Err(ConsensusError::Gate(GateError::UnknownChain(ChainId(99))))
        );
        assert_eq!(
            engine.check_fact(&foreign.fact_key),
            Err(ConsensusError::FactNotFound(foreign.fact_key))
        );

        engine.host_chains_mut().register(ChainId(99));
        assert!(engine.submit(tx("genesis", 0), &foreign).is_ok());
    }

    #[test]
    fn failed_operations_leave_no_trace() {
        let mut engine = engine(3);
        let fact = attestation("atomic");
        let a = tx("genesis", 0);
        engine.submit(a, &fact).expect("submit");
        let events_before = engine.sink().len();
        let before = engine.query_fact(&fact.fact_key).expect("stored");

        assert_eq!(
            engine.submit(a, &fact),
            Err(ConsensusError::DuplicateSubmitter {
                fact_key: fact.fact_key,
                identity: a,
            })
        );
        let outsider = Address::from_seed(b"outsider");
        assert!(matches!(
            engine.submit(outsider, &fact),
            Err(ConsensusError::Context(ContextError::NotAMember { .. }))
        ));
        assert!(
            engine
                .request_rotation(&owner(), 0, FeatureSet(1), periods(1, 1), Vec::new())
                .is_err()
        );

        assert_eq!(engine.query_fact(&fact.fact_key), Ok(before));
        assert_eq!(engine.sink().len(), events_before);
        assert_eq!(engine.store().latest_context_id(), Ok(ContextId::GENESIS));
    }

    #[test]
    fn materials_require_finalization() {
        let mut engine = engine(3);
        let done = attestation("done");
        let pending = attestation("pending");

        engine.submit(tx("genesis", 0), &done).expect("submit");
        engine.submit(tx("genesis", 1), &done).expect("submit");
        engine.submit(tx("genesis", 2), &pending).expect("submit");

        let records = engine
            .query_materials(&[done.fact_key, pending.fact_key])
            .expect("materials");
        assert_eq!(records.len(), 2);
        assert_eq!(
            engine.finalized_materials(&[done.fact_key, pending.fact_key]),
            Err(ConsensusError::FactNotFinalized(pending.fact_key))
        );
        assert_eq!(
            engine
                .finalized_materials(&[done.fact_key])
                .expect("finalized")[0]
                .sns_ciphertext_digest,
            done.sns_ciphertext_digest
        );
    }

    #[test]
    fn lifecycle_events_are_published_in_order() {
        let mut engine = engine(3);
        engine
            .request_rotation(&owner(), 0, FeatureSet(1), periods(3, 0), committee("next", 4))
            .expect("rotation");
        assert_eq!(engine.refresh(10).expect("refresh"), 3);

        let names: Vec<_> = engine.sink().events().iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "new_context",
                "pre_activate_context",
                "suspend_context",
                "activate_context",
                "deactivate_context",
            ]
        );
        assert_eq!(engine.refresh(11), Ok(0));
    }

    #[test]
    fn metrics_follow_submissions_and_transitions() {
        let registry = prometheus::Registry::new();
        let metrics = ConsensusMetrics::register(&registry).expect("metrics");
        let mut engine = engine(3).with_metrics(metrics.clone());
        assert_eq!(metrics.active_context_id.get(), 1);

        let fact = attestation("metered");
        engine.submit(tx("genesis", 0), &fact).expect("submit");
        engine.submit(tx("genesis", 1), &fact).expect("submit");
        let _ = engine.submit(tx("genesis", 1), &fact);

        assert_eq!(metrics.attestations_accepted.get(), 2);
        assert_eq!(metrics.attestations_rejected.get(), 1);
        assert_eq!(metrics.facts_finalized.get(), 1);

        engine
            .request_rotation(&owner(), 0, FeatureSet(1), periods(1, 100), committee("next", 4))
            .expect("rotation");
        engine.refresh(1).expect("refresh");
        assert_eq!(metrics.active_context_id.get(), 2);
        assert_eq!(metrics.context_transitions.get(), 3);
    }

    #[test]
    fn failed_commit_publishes_nothing_and_retry_finalizes_once() {
        let registry = prometheus::Registry::new();
        let metrics = ConsensusMetrics::register(&registry).expect("metrics");
        let mut engine = engine_over(FlakyStore::default(), 3).with_metrics(metrics.clone());
        let fact = attestation("flaky");
        let (a, b) = (tx("genesis", 0), tx("genesis", 1));

        engine.submit(a, &fact).expect("A submits");
        engine.store_mut().fail_commits = true;

        let err = engine.submit(b, &fact).unwrap_err();
        assert!(matches!(err, ConsensusError::Storage(StorageError::Unavailable(_))));
        assert!(finalized_events(&engine).is_empty());
        assert_eq!(metrics.facts_finalized.get(), 0);
        assert_eq!(metrics.attestations_rejected.get(), 1);
        let stored = engine.query_fact(&fact.fact_key).expect("stored");
        assert_eq!(stored.submitters, vec![a]);
        assert!(!stored.finalized);

        let events_before = engine.sink().len();
        let rotation = engine.request_rotation(
            &owner(),
            0,
            FeatureSet(1),
            periods(0, 0),
            committee("next", 4),
        );
        assert!(matches!(rotation, Err(ContextError::Storage(_))));
        assert_eq!(engine.sink().len(), events_before);
        assert_eq!(engine.pre_activation_context_id(), Err(ContextError::NoPreActivationContext));

        engine.store_mut().fail_commits = false;
        let retry = engine.submit(b, &fact).expect("B retries");
        assert!(retry.finalized_now);
        assert_eq!(retry.record.submitters, vec![a, b]);

        engine.submit(tx("genesis", 2), &fact).expect("C submits");
        assert_eq!(finalized_events(&engine).len(), 1);
        assert_eq!(metrics.facts_finalized.get(), 1);
    }
}
