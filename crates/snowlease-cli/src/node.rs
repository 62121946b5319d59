//! `snowlease run`: lease a worker id and emit IDs until told to stop.

use std::{io::Write, sync::Arc};

use snowlease::{
    CUSTOM_EPOCH, Error, LeaseGenerator, LeaseRegistry, MemoryRegistry, MonotonicClock, WallClock,
};
use tokio::time::{MissedTickBehavior, interval};

use crate::{
    config::{NodeConfig, RegistryKind},
    decode::IdRecord,
    shutdown_signal,
};

pub async fn run(config: NodeConfig) -> anyhow::Result<()> {
    match config.registry {
        RegistryKind::Memory => {
            let registry = Arc::new(MemoryRegistry::new(WallClock::default()));
            serve(config, registry).await
        }
        #[cfg(feature = "redis")]
        RegistryKind::Redis => {
            let registry = snowlease::RedisRegistry::connect(&config.redis_url).await?;
            registry.ping().await?;
            tracing::info!(url = %config.redis_url, "connected to redis");
            serve(config, registry).await
        }
        #[cfg(not(feature = "redis"))]
        RegistryKind::Redis => {
            anyhow::bail!("this build of snowlease was compiled without the `redis` feature")
        }
    }
}

async fn serve<R>(config: NodeConfig, registry: R) -> anyhow::Result<()>
where
    R: LeaseRegistry + 'static,
{
    log_startup_info(&config);

    let generator = LeaseGenerator::with_clock(
        config.generator.clone(),
        registry,
        config.identity.clone(),
        MonotonicClock::default(),
    )
    .await?;
    let keepalive = generator.spawn_keepalive();

    tracing::info!(
        worker_id = ?generator.worker_id(),
        identity = %generator.identity(),
        period = ?generator.keepalive_period(),
        "node running"
    );

    let emitter = emit(&generator, &config);
    tokio::select! {
        result = emitter => result?,
        () = shutdown_signal() => {
            tracing::info!("Shutdown signal received, terminating gracefully...");
        }
    }

    keepalive.shutdown().await;
    tracing::info!(
        status = %generator.status(),
        "node stopped; the lease expires on its own"
    );
    Ok(())
}

/// Prints one ID per interval until `count` IDs were written.
///
/// Lease loss is logged and skipped rather than treated as fatal; the
/// keepalive loop brings the generator back.
async fn emit<R>(
    generator: &LeaseGenerator<R, MonotonicClock>,
    config: &NodeConfig,
) -> anyhow::Result<()>
where
    R: LeaseRegistry,
{
    let mut ticker = interval(config.emit_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut emitted = 0;

    while config.count.is_none_or(|count| emitted < count) {
        ticker.tick().await;
        match generator.next_id_async().await {
            Ok(id) => {
                let mut stdout = std::io::stdout().lock();
                serde_json::to_writer(&mut stdout, &IdRecord::new(id, CUSTOM_EPOCH))?;
                writeln!(stdout)?;
                emitted += 1;
            }
            Err(Error::NotRunning) => {
                tracing::warn!(
                    last_error = ?generator.last_error(),
                    "generator not running, skipping"
                );
            }
            Err(err @ Error::ClockRollback { .. }) => {
                tracing::warn!(error = %err, "clock moved backward, skipping");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn log_startup_info(config: &NodeConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting snowlease node with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting snowlease node as {} over {} slots",
            config.identity,
            config.generator.max_workers
        );
    }
}
