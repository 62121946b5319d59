//! Background lease renewal.
//!
//! One task per [`Generator`] wakes every `lease_ttl - safety_margin` and runs
//! [`Generator::tick`], with the first wake-up taken from the lease held at
//! spawn time. Failures are absorbed here: the tick already flipped
//! the generator to `Stopped` and recorded the error, so the loop just waits
//! for the next period. Shutdown is cooperative via a [`CancellationToken`];
//! leases are left to expire on the registry side.

use core::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;

use crate::{Generator, IdEncoder, LeaseRegistry};

/// Controls a running keepalive task.
///
/// Dropping the handle detaches the task; call [`cancel`] or [`shutdown`] to
/// stop it.
///
/// [`cancel`]: KeepaliveHandle::cancel
/// [`shutdown`]: KeepaliveHandle::shutdown
#[derive(Debug)]
pub struct KeepaliveHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl KeepaliveHandle {
    /// Signals the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Signals the task to stop and waits until it has exited.
    ///
    /// A tick already in flight is abandoned at its next await point.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(_err) = self.task.await {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %_err, "keepalive task did not exit cleanly");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// The token that stops this task, for wiring into an application-wide
    /// shutdown tree.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

pub(crate) fn spawn<R, E>(generator: Generator<R, E>, period: Duration) -> KeepaliveHandle
where
    R: LeaseRegistry + 'static,
    E: IdEncoder + 'static,
{
    let token = CancellationToken::new();
    let start = Instant::now() + generator.until_renewal();
    let task = tokio::spawn(run(generator, start, period, token.clone()));
    KeepaliveHandle { token, task }
}

async fn run<R, E>(
    generator: Generator<R, E>,
    start: Instant,
    period: Duration,
    token: CancellationToken,
) where
    R: LeaseRegistry,
    E: IdEncoder,
{
    #[cfg(feature = "tracing")]
    tracing::debug!(?period, worker_id = ?generator.worker_id(), "keepalive started");

    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let was_running = generator.status().is_running();
                let outcome = tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    outcome = generator.tick() => outcome,
                };
                if outcome.is_ok() && !was_running {
                    #[cfg(feature = "tracing")]
                    tracing::info!(worker_id = ?generator.worker_id(), "generator recovered");
                }
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(identity = %generator.identity(), "keepalive stopped");
}
