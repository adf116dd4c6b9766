// src/main.rs
//
// Demo node that wires up the coprocessor library:
//
// - RocksDB-backed state
// - Static host-chain list + owner/pauser access gate
// - Prometheus metrics exporter on /metrics
// - A loop that advances a local block counter, applies due transitions,
//   and has the live committees attest a fresh fact every block. One
//   rotation is requested along the way so the overlap window shows up.
//   The counter is persisted, so a restart resumes where it stopped.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use coprocessor::{
    Address, Attestation, ContextStore, CoprocessorConfig, CoprocessorEngine, CoprocessorMember,
    DefaultCoprocessorEngine, FactKey, FeatureSet, Hash256, KeyId, MetricsRegistry,
    RocksDbStateStore, RoleAccessControl, StaticHostChainRegistry, TracingEventSink,
    run_prometheus_http_server,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "coprocessor=info".to_string()),
        )
        .init();

    if let Err(err) = run_node().await {
        tracing::error!(error = %err, "fatal error");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    let cfg = match std::env::var("COPROCESSOR_CONFIG") {
        Ok(path) => CoprocessorConfig::from_file(&path)
            .map_err(|e| format!("failed to load config from {path}: {e}"))?,
        Err(_) => CoprocessorConfig::default(),
    };

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!(error = %e, "metrics HTTP server error");
            }
        });
        tracing::info!("metrics exporter listening on http://{addr}/metrics");
    }

    // ---------------------------
    // Storage backend (RocksDB)
    // ---------------------------

    let store = RocksDbStateStore::open(&cfg.storage)
        .map_err(|e| format!("failed to open RocksDB store at {}: {e}", cfg.storage.path))?;

    // ---------------------------
    // Gates + engine
    // ---------------------------

    // A real deployment would take these from its governance setup.
    let owner = Address::from_seed(b"demo-owner");
    let pauser = Address::from_seed(b"demo-pauser");

    let mut engine: DefaultCoprocessorEngine = CoprocessorEngine::new(
        store,
        StaticHostChainRegistry::new([cfg.demo.host_chain_id]),
        RoleAccessControl::new(owner, pauser),
        TracingEventSink,
    )
    .with_metrics(metrics.consensus.clone());

    let latest = engine
        .store()
        .latest_context_id()
        .map_err(|e| format!("failed to read latest context id: {e}"))?;
    if latest.is_none() {
        engine
            .bootstrap(
                FeatureSet(0),
                demo_committee("genesis", cfg.demo.genesis_committee_size),
            )
            .map_err(|e| format!("failed to bootstrap contexts: {e}"))?;
    }

    let active = engine.active_context().map_err(|e| e.to_string())?;
    tracing::info!(
        context = %active.id(),
        members = active.committee.members.len(),
        block_interval_ms = cfg.demo.block_interval_ms,
        "starting coprocessor demo node"
    );

    // ---------------------------
    // Main block loop
    // ---------------------------

    let mut interval = tokio::time::interval(Duration::from_millis(cfg.demo.block_interval_ms));
    let mut block = engine
        .store()
        .last_block()
        .map_err(|e| format!("failed to read last processed block: {e}"))?;
    if block > 0 {
        tracing::info!(block, "resuming block counter");
    }
    // Keeps fact handles unique across restarts on the same database.
    let run_id = current_unix_timestamp();

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(block, "shutting down");
                return Ok(());
            }
        }

        block += 1;

        match engine.refresh(block) {
            Ok(0) => {}
            Ok(transitions) => tracing::info!(block, transitions, "lifecycle refreshed"),
            Err(e) => tracing::warn!(block, error = %e, "refresh failed"),
        }

        if block == cfg.demo.rotation_at_block {
            let members = demo_committee(
                &format!("rotation-{block}"),
                cfg.demo.rotation_committee_size,
            );
            match engine.request_rotation(
                &owner,
                block,
                FeatureSet(1),
                cfg.lifecycle.block_periods(),
                members,
            ) {
                Ok(id) => tracing::info!(block, context = %id, "rotation requested"),
                Err(e) => tracing::warn!(block, error = %e, "rotation not scheduled"),
            }
        }

        attest_block(&mut engine, &cfg, run_id, block);

        if let Err(e) = engine.store().record_block(block) {
            tracing::warn!(block, error = %e, "failed to persist block counter");
        }
    }
}

/// Every live committee attests its own fact for `block`.
fn attest_block(
    engine: &mut DefaultCoprocessorEngine,
    cfg: &CoprocessorConfig,
    run_id: u64,
    block: u64,
) {
    let mut committees = Vec::new();
    if let Ok(active) = engine.active_context() {
        committees.push(("active", active));
    }
    if let Ok(suspended) = engine.suspended_context() {
        committees.push(("suspended", suspended));
    }

    for (phase, context) in committees {
        let attestation = demo_attestation(cfg, run_id, block, phase);
        for member in &context.committee.members {
            match engine.submit(member.tx_sender, &attestation) {
                Ok(submission) if submission.finalized_now => tracing::info!(
                    block,
                    phase,
                    fact_key = %attestation.fact_key,
                    context = %submission.record.context_id,
                    submitters = submission.record.submitters.len(),
                    "fact finalized"
                ),
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    block,
                    phase,
                    member = %member.name,
                    error = %e,
                    "submission failed"
                ),
            }
        }
    }
}

fn demo_attestation(cfg: &CoprocessorConfig, run_id: u64, block: u64, phase: &str) -> Attestation {
    let handle = format!("demo-ciphertext/{run_id}/{block}/{phase}");
    Attestation {
        fact_key: FactKey::for_chain(handle.as_bytes(), cfg.demo.host_chain_id),
        key_id: KeyId(1),
        ciphertext_digest: Hash256::compute(format!("{handle}/ct").as_bytes()),
        sns_ciphertext_digest: Hash256::compute(format!("{handle}/sns").as_bytes()),
    }
}

// In a real deployment members come from the rotation proposal; here they
// are derived deterministically from a label.
fn demo_committee(label: &str, size: usize) -> Vec<CoprocessorMember> {
    (0..size)
        .map(|i| {
            let name = format!("{label}-{i}");
            CoprocessorMember {
                tx_sender: Address::from_seed(format!("{name}/tx").as_bytes()),
                signer: Address::from_seed(format!("{name}/signer").as_bytes()),
                storage_url: format!("s3://coprocessor-demo/{name}"),
                name,
            }
        })
        .collect()
}

/// Returns the current wall-clock time as seconds since Unix epoch.
///
/// On error (system clock before epoch) this falls back to 0.
fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}
