//! The node binary: loads configuration, wires up the chain registry and
//! admin HTTP interface, preloads and activates any configured chains,
//! then runs until a shutdown signal arrives.

mod args;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use covenant_chain::{
    chains::test_support::InMemoryChainRecordStore,
    prelude::{Chain, ChainSpawner, Chains},
};
use covenant_committee::prelude::LoopbackCommittee;
use covenant_config::Config;
use covenant_ledger::test_support::FakeLedgerClient;
use covenant_primitives::prelude::{AgentId, ChainId, Hname};
use covenant_state::prelude::ChainRecord;
use covenant_tasks::TaskManager;
use covenant_vm::NoopProcessor;
use tracing::{info, warn};

fn main() {
    if let Err(e) = main_inner() {
        eprintln!("FATAL ERROR: {e}");
        std::process::exit(1);
    }
}

fn main_inner() -> anyhow::Result<()> {
    let args: args::Args = argh::from_env();

    let raw_config = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading config file {}", args.config.display()))?;
    let mut config: Config = toml::from_str(&raw_config).context("parsing config file")?;
    args.override_config(&mut config).context("applying config overrides")?;

    covenant_common::logging::init(covenant_common::logging::LoggerConfig::with_base_name("covenant-node"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let task_manager = TaskManager::new(runtime.handle().clone());
    let executor = task_manager.executor();

    let ledger = Arc::new(FakeLedgerClient::default());
    let records = Arc::new(InMemoryChainRecordStore::default());
    let chains = Arc::new(Chains::new(ledger.clone(), records));

    let params = config.params();
    let spawner: ChainSpawner = {
        let ledger = ledger.clone();
        let executor = executor.clone();
        Arc::new(move |chain_id: ChainId| {
            Chain::spawn(
                chain_id,
                params.clone(),
                Arc::new(LoopbackCommittee::new()),
                ledger.clone(),
                Arc::new(NoopProcessor),
                AgentId::new(chain_id, Hname::of("fee-destination")),
                &executor,
            )
        })
    };

    for raw_id in &config.preload_chains {
        match ChainId::from_base58(raw_id) {
            Ok(id) => {
                if let Err(e) = chains.put_record(ChainRecord { chain_id: id, active: true }) {
                    warn!(chain = %raw_id, err = %e, "skipping duplicate preload chain record");
                }
            }
            Err(e) => warn!(chain = %raw_id, err = %e, "skipping malformed preload chain id"),
        }
    }
    {
        let spawner = spawner.clone();
        chains.activate_all_from_registry(move |id| spawner(id));
    }

    let bind_addr: std::net::SocketAddr = config
        .rpc
        .bind_addr
        .parse()
        .with_context(|| format!("invalid rpc.bind_addr {:?}", config.rpc.bind_addr))?;
    let router = covenant_rpc_api::routes::router(chains.clone(), spawner);
    {
        let mut shutdown = executor.shutdown_signal();
        executor.spawn_critical_async("admin-http", async move {
            let listener = tokio::net::TcpListener::bind(bind_addr)
                .await
                .with_context(|| format!("binding admin HTTP listener on {bind_addr}"))?;
            info!(%bind_addr, "admin HTTP interface listening");
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.wait().await })
                .await
                .context("admin HTTP server")?;
            Ok(())
        });
    }

    {
        let chains = chains.clone();
        let mut shutdown = executor.shutdown_signal();
        let tick_interval = params_tick_interval(&config);
        executor.spawn("chain-ticker", async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        for record in chains.records() {
                            if let Some(chain) = chains.get(record.chain_id) {
                                let _ = chain.tick();
                            }
                        }
                    }
                    _ = shutdown.wait() => break,
                }
            }
        });
    }

    task_manager.start_signal_listeners();
    let mut shutdown = task_manager.shutdown_signal();
    runtime.block_on(shutdown.wait());
    info!("shutdown signal received, dismissing all chains");
    chains.dismiss_all();
    task_manager.monitor(Some(Duration::from_secs(5)));
    covenant_common::logging::finalize();
    Ok(())
}

fn params_tick_interval(config: &Config) -> Duration {
    Duration::from_millis(config.timing.operator_tick_ms.min(config.timing.state_manager_tick_ms))
}
