//! Process bootstrap for the `aggregator-node` binary: loads
//! config, wires the storage, SMT, validator pool, BFT anchor client,
//! leader elector, follower mirror and RPC server into one set of
//! `tokio` tasks coordinated by a shared stop signal, the way the
//! teacher's `core/bin/via_server/src/main.rs` wires its own node.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use agg_bft::{BftAnchorClient, MockBftAnchorClient};
use agg_config::{FromEnv, GatewayConfig};
use agg_crypto::Keypair;
use agg_follower::FollowerMirror;
use agg_leader::{static_leader, LeaderElector};
use agg_round::RoundManager;
use agg_rpc::RpcState;
use agg_smt::ConcurrentSmt;
use agg_validator::ValidatorPool;
use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use uuid::Uuid;

/// The lock id every replica of this gateway contends for. A single
/// logical aggregator runs one lock, so this is a fixed name rather than a
/// config value.
const LEADER_LOCK_ID: &str = "aggregator-round-manager";

#[derive(Debug, Parser)]
#[command(author, version, about = "Aggregator gateway node", long_about = None)]
struct Cli {
    /// Path to a `.env`-style file loaded into the environment before
    /// config structs are parsed. Config itself is always read from the
    /// environment; this only changes where those variables come
    /// from, matching `via_server`'s `--config-path` override.
    #[arg(long)]
    config_path: Option<std::path::PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(path) = &cli.config_path {
        if let Err(err) = dotenv::from_path(path) {
            eprintln!("failed to load config file {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start tokio runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fatal: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("loading configuration")?;
    install_tracing(&config.observability)?;

    tracing::info!("starting aggregator-node");

    let storage = agg_storage::connect(&config.storage.storage_uri)
        .await
        .context("connecting to storage backend")?;
    let smt = Arc::new(ConcurrentSmt::new());

    let server_id = config
        .identity
        .server_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    tracing::info!(server_id = %server_id, "assigned server identity");

    let receipt_keypair = config
        .identity
        .receipt_signing_key
        .as_deref()
        .map(Keypair::from_secret_hex)
        .transpose()
        .context("parsing RECEIPT_SIGNING_KEY")?;

    let bft: Arc<dyn BftAnchorClient> = if config.bft.use_mock_bft {
        Arc::new(MockBftAnchorClient::new(config.chain.initial_block_hash.0))
    } else {
        anyhow::bail!(
            "USE_MOCK_BFT=false requires a real BFT anchor client, which is out of scope for this build \
             (the wire protocol to the external consensus is a named external collaborator, not implemented here)"
        );
    };

    let validator_pool = Arc::new(ValidatorPool::spawn(
        config.round.validator_pool_size(),
        config.round.commitment_batch_size as usize,
    ));

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    let standalone = config.high_availability.disable_high_availability;
    let leader_role = if standalone {
        tracing::info!("high availability disabled, running as permanent leader");
        static_leader()
    } else {
        let (elector, leader_role) = LeaderElector::new(
            LEADER_LOCK_ID,
            storage.clone(),
            config.high_availability.lock_ttl(),
            config.high_availability.heartbeat_interval(),
            config.high_availability.polling_interval(),
        );
        tasks.push(tokio::spawn(elector.run(stop_rx.clone())));
        leader_role
    };

    // Always runs, independent of current leadership (a REDESIGN decision,
    // see DESIGN.md): it keeps this replica's SMT a faithful copy of the
    // storage-durable leaf set, which is what makes a freshly-started
    // leader's root hash correct without a separate bootstrap path, and
    // makes a promotion from follower to leader mid-flight safe.
    let mirror = FollowerMirror::new(
        storage.clone(),
        smt.clone(),
        server_id.clone(),
        config.round.smt_lock_timeout(),
    );
    tasks.push(tokio::spawn(mirror.run(stop_rx.clone())));

    let round_manager = RoundManager::new(
        storage.clone(),
        smt.clone(),
        bft,
        config.bft.submit_timeout(),
        config.chain.clone(),
        config.round.clone(),
        leader_role.clone(),
    );
    tasks.push(tokio::spawn(round_manager.run(stop_rx.clone())));

    let rpc_state = RpcState::new(
        storage.clone(),
        smt.clone(),
        validator_pool,
        config.chain.clone(),
        leader_role,
        receipt_keypair,
        server_id,
        config.round.smt_lock_timeout(),
        standalone,
        config.server.concurrency_limit as usize,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let stop_rx_for_server = stop_rx.clone();

    tokio::select! {
        result = agg_rpc::run(addr, rpc_state, stop_rx_for_server) => {
            result.context("RPC server exited unexpectedly")?;
        }
        _ = wait_for_shutdown_signal() => {
            tracing::info!("shutdown signal received, stopping");
        }
    }

    let _ = stop_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }

    tracing::info!("aggregator-node shut down cleanly");
    Ok(())
}

/// Waits for `SIGINT`, `SIGTERM` or `SIGQUIT`, the graceful
/// shutdown trigger. Grounded on idiomatic `tokio::signal` usage rather
/// than a teacher file: the teacher's own signal handling lives inside
/// `node_framework`'s task-wiring layer, which this binary does not
/// reuse (see DESIGN.md).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        let mut sigquit = signal(SignalKind::quit()).expect("install SIGQUIT handler");

        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
            _ = sigquit.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// `tracing`/`tracing-subscriber` install: `LOG_LEVEL`
/// drives the filter, `LOG_FORMAT` picks plain vs. JSON, `LOG_TO_FILE`
/// plus `LOG_FILE` redirect output from stdout to a plain file handle —
/// no rolling/rotation, which the teacher's own `ObservabilityConfig`
/// doesn't do either without the full `zksync_vlog` stack this crate
/// doesn't pull in.
fn install_tracing(config: &agg_config::ObservabilityConfig) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = config.log_format == "json";

    if config.log_to_file {
        let path = config
            .log_file
            .as_deref()
            .context("LOG_TO_FILE=true requires LOG_FILE")?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {path}"))?;
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(move || file.try_clone().expect("clone log file handle"));
        if json {
            subscriber.json().init();
        } else {
            subscriber.init();
        }
    } else {
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
        if json {
            subscriber.json().init();
        } else {
            subscriber.init();
        }
    }
    Ok(())
}
