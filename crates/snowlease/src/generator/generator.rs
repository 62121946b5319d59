use core::{fmt, time::Duration};
use std::sync::Arc;

use portable_atomic::{AtomicU8, AtomicU64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    AtomicEncoder, Error, GeneratorConfig, IdEncoder, IdSource, Identity, KeepaliveHandle,
    LeaseRegistry, LeaseSnowflakeId, Poll, Result, SnowflakeId, Status, TimeSource, WallClock,
    WorkerIdentityManager, encoder::WORKER_UNSET, mutex::Mutex,
};

/// A [`Generator`] over the default 1/41/10/12 layout and a lock-free
/// encoder.
pub type LeaseGenerator<R, T = WallClock> = Generator<R, AtomicEncoder<LeaseSnowflakeId, T>>;

/// Issues IDs under a worker id leased from a [`LeaseRegistry`].
///
/// The generator combines a [`WorkerIdentityManager`] with an [`IdEncoder`].
/// It starts `Running` once construction acquires a slot and falls back to
/// `Stopped` whenever a renewal fails, the registry reports another holder,
/// or the local lease deadline passes. While `Stopped`, [`next_id`] fails
/// fast with [`Error::NotRunning`]; the next successful [`tick`] restores
/// `Running`.
///
/// Cloning is cheap and every clone shares the same lease and encoder state.
/// ID generation only touches atomics, so callers never wait on a registry
/// round trip in flight.
///
/// ```
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
/// use std::sync::Arc;
/// use snowlease::{
///     GeneratorConfig, Identity, LeaseGenerator, MemoryRegistry, SnowflakeId, WallClock,
/// };
///
/// let registry = Arc::new(MemoryRegistry::new(WallClock::default()));
/// let generator = LeaseGenerator::with_clock(
///     GeneratorConfig::default().with_max_workers(4),
///     registry,
///     Identity::random(),
///     WallClock::default(),
/// )
/// .await
/// .unwrap();
///
/// let id = generator.next_id().unwrap();
/// assert_eq!(id.machine_id(), 0);
/// # });
/// ```
///
/// [`next_id`]: Generator::next_id
/// [`tick`]: Generator::tick
pub struct Generator<R, E = AtomicEncoder<LeaseSnowflakeId, WallClock>>
where
    R: LeaseRegistry,
    E: IdEncoder,
{
    inner: Arc<Shared<R, E>>,
}

struct Shared<R: LeaseRegistry, E: IdEncoder> {
    manager: WorkerIdentityManager<R>,
    encoder: E,
    status: AtomicU8,
    /// Encoder-clock millisecond at which the current lease must be assumed
    /// gone.
    lease_deadline: AtomicU64,
    /// Slot held before the last transition to `Stopped`.
    previous: AtomicU64,
    last_error: Mutex<Option<Error>>,
    lease_ttl: Duration,
    keepalive_period: Duration,
    /// Serializes ticks so two concurrent reconciliations cannot both
    /// acquire a slot.
    tick_lock: tokio::sync::Mutex<()>,
}

impl<R: LeaseRegistry, E: IdEncoder> Clone for Generator<R, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, T> Generator<R, AtomicEncoder<LeaseSnowflakeId, T>>
where
    R: LeaseRegistry,
    T: TimeSource + Send + Sync,
{
    /// Builds a generator over the default layout reading time from `clock`.
    ///
    /// # Errors
    ///
    /// See [`Generator::new`].
    pub async fn with_clock(
        config: GeneratorConfig,
        registry: R,
        identity: Identity,
        clock: T,
    ) -> Result<Self> {
        Self::new(config, registry, identity, AtomicEncoder::new(clock)).await
    }
}

impl<R, E> Generator<R, E>
where
    R: LeaseRegistry,
    E: IdEncoder,
{
    /// Validates `config` and acquires a worker slot.
    ///
    /// Acquisition is attempted up to `config.acquire_attempts` times,
    /// `config.acquire_backoff` apart. The returned generator is `Running`;
    /// the keepalive loop is not started (see [`spawn_keepalive`]).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `config` does not fit the encoder's
    ///   layout.
    /// - The last acquisition error ([`Error::NoAvailableWorkerId`] or
    ///   [`Error::RegistryUnavailable`]) once every attempt failed.
    ///
    /// [`spawn_keepalive`]: Generator::spawn_keepalive
    pub async fn new(
        config: GeneratorConfig,
        registry: R,
        identity: Identity,
        encoder: E,
    ) -> Result<Self> {
        config.validate::<E::Id>()?;

        let generator = Self {
            inner: Arc::new(Shared {
                manager: WorkerIdentityManager::new(registry, identity, &config),
                encoder,
                status: AtomicU8::new(Status::Stopped as u8),
                lease_deadline: AtomicU64::new(0),
                previous: AtomicU64::new(WORKER_UNSET),
                last_error: Mutex::new(None),
                lease_ttl: config.lease_ttl,
                keepalive_period: config.keepalive_period(),
                tick_lock: tokio::sync::Mutex::new(()),
            }),
        };

        let mut attempt = 1;
        loop {
            match generator.tick().await {
                Ok(()) => return Ok(generator),
                Err(err) if attempt < config.acquire_attempts && err.is_retryable() => {
                    attempt += 1;
                    tokio::time::sleep(config.acquire_backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// The current status.
    ///
    /// Reports `Stopped` once the local lease deadline has passed, even if
    /// the keepalive loop has not noticed yet.
    pub fn status(&self) -> Status {
        let inner = &*self.inner;
        let status = Status::from_u8(inner.status.load(Ordering::Acquire));
        if status.is_running()
            && inner.encoder.current_millis() >= inner.lease_deadline.load(Ordering::Acquire)
        {
            self.expire();
            return Status::Stopped;
        }
        status
    }

    /// The leased worker id while `Running`.
    pub fn worker_id(&self) -> Option<u64> {
        if self.status().is_running() {
            self.inner.encoder.worker_id()
        } else {
            None
        }
    }

    pub fn identity(&self) -> &Identity {
        self.inner.manager.identity()
    }

    /// The registry this generator leases from.
    pub fn registry(&self) -> &R {
        self.inner.manager.registry()
    }

    /// The most recent acquisition, renewal or lease-expiry failure.
    ///
    /// Cleared when a slot is (re-)acquired.
    pub fn last_error(&self) -> Option<Error> {
        self.with_last_error(|slot| slot.clone())
    }

    pub fn keepalive_period(&self) -> Duration {
        self.inner.keepalive_period
    }

    /// Attempts to encode the next ID without blocking.
    ///
    /// # Errors
    ///
    /// - [`Error::NotRunning`] while no lease is held, including when the
    ///   local lease deadline has passed.
    /// - Encoder errors, see [`IdEncoder::try_poll_id`].
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<Poll<E::Id>> {
        self.ensure_running()?;
        self.inner.encoder.try_poll_id().map_err(|err| match err {
            // Lost a race with a concurrent transition to `Stopped`.
            Error::WorkerIdUnset => Error::NotRunning,
            err => err,
        })
    }

    /// Returns the next ID, spinning through sequence exhaustion.
    ///
    /// # Errors
    ///
    /// See [`Generator::try_poll_id`]. [`Error::ClockRollback`] is returned
    /// to the caller rather than waited out.
    pub fn next_id(&self) -> Result<E::Id> {
        loop {
            match self.try_poll_id()? {
                Poll::Ready { id } => return Ok(id),
                Poll::Pending { yield_for: 0 } => core::hint::spin_loop(),
                Poll::Pending { .. } => std::thread::yield_now(),
            }
        }
    }

    /// Like [`next_id`], but waits out sequence exhaustion on the tokio
    /// timer.
    ///
    /// [`next_id`]: Generator::next_id
    pub async fn next_id_async(&self) -> Result<E::Id> {
        loop {
            match self.try_poll_id()? {
                Poll::Ready { id } => return Ok(id),
                Poll::Pending { yield_for: 0 } => tokio::task::yield_now().await,
                Poll::Pending { yield_for } => {
                    tokio::time::sleep(Duration::from_millis(yield_for)).await;
                }
            }
        }
    }

    /// Runs one reconciliation against the registry.
    ///
    /// While `Running` the held lease is renewed; while `Stopped` a slot is
    /// acquired, preferring the previously held one if the registry still
    /// names this process. On failure the generator ends up `Stopped` with
    /// the error recorded, and the error is also returned. A call that
    /// succeeds at the registry but returns after the local deadline of the
    /// new lease fails with [`Error::LeaseExpired`].
    pub async fn tick(&self) -> Result<()> {
        let inner = &*self.inner;
        let _serial = inner.tick_lock.lock().await;

        let started = inner.encoder.current_millis();
        let held = self.worker_id();
        let previous = inner.previous.load(Ordering::Acquire);
        let result = inner
            .manager
            .reconcile(held, (previous != WORKER_UNSET).then_some(previous))
            .await
            .and_then(|worker_id| self.check_deadline(worker_id, started));

        match result {
            Ok(worker_id) => {
                self.install(worker_id, started);
                if held.is_none() {
                    self.with_last_error(|slot| *slot = None);
                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        worker_id,
                        identity = %inner.manager.identity(),
                        key = %inner.manager.key(worker_id),
                        "acquired worker id"
                    );
                }
                Ok(())
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                match held {
                    Some(worker_id) => {
                        tracing::warn!(worker_id, error = %err, "lease renewal failed, stopping");
                    }
                    None => tracing::warn!(error = %err, "worker id acquisition failed"),
                }
                self.stop(err.clone());
                Err(err)
            }
        }
    }

    /// Starts the keepalive loop on the current tokio runtime.
    ///
    /// The loop calls [`tick`] every `lease_ttl - safety_margin` until the
    /// returned handle is cancelled. The first call is timed from the
    /// current lease, not from this call, and happens at once if the lease
    /// is already due or lost. Dropping the handle does not stop it.
    ///
    /// [`tick`]: Generator::tick
    pub fn spawn_keepalive(&self) -> KeepaliveHandle
    where
        R: 'static,
        E: 'static,
    {
        crate::keepalive::spawn(self.clone(), self.inner.keepalive_period)
    }

    /// Time until the held lease is due for renewal: the remaining lease
    /// minus the safety margin. Zero while `Stopped`.
    pub(crate) fn until_renewal(&self) -> Duration {
        let inner = &*self.inner;
        if !self.status().is_running() {
            return Duration::ZERO;
        }
        let remaining = inner
            .lease_deadline
            .load(Ordering::Acquire)
            .saturating_sub(inner.encoder.current_millis());
        let margin = inner.lease_ttl.saturating_sub(inner.keepalive_period);
        Duration::from_millis(remaining).saturating_sub(margin)
    }

    /// Rejects a lease whose local deadline passed while the registry call
    /// was in flight. The slot is remembered so the next tick resumes it.
    fn check_deadline(&self, worker_id: u64, started: u64) -> Result<u64> {
        let inner = &*self.inner;
        let deadline = started.saturating_add(inner.lease_ttl.as_millis() as u64);
        if inner.encoder.current_millis() < deadline {
            return Ok(worker_id);
        }
        inner.previous.store(worker_id, Ordering::Release);
        Err(Error::LeaseExpired { worker_id })
    }

    fn install(&self, worker_id: u64, started: u64) {
        let inner = &*self.inner;
        let ttl = inner.lease_ttl.as_millis() as u64;
        inner.encoder.assign_worker_id(worker_id);
        inner.previous.store(worker_id, Ordering::Release);
        inner
            .lease_deadline
            .store(started.saturating_add(ttl), Ordering::Release);
        inner
            .status
            .store(Status::Running as u8, Ordering::Release);
    }

    fn stop(&self, err: Error) {
        let inner = &*self.inner;
        inner
            .status
            .store(Status::Stopped as u8, Ordering::Release);
        inner.encoder.clear_worker_id();
        self.with_last_error(|slot| *slot = Some(err));
    }

    fn ensure_running(&self) -> Result<()> {
        if self.status().is_running() {
            Ok(())
        } else {
            Err(Error::NotRunning)
        }
    }

    #[cold]
    #[inline(never)]
    fn expire(&self) {
        let inner = &*self.inner;
        let worker_id = inner.encoder.worker_id();
        let stopped = inner
            .status
            .compare_exchange(
                Status::Running as u8,
                Status::Stopped as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        // Only the caller that performed the transition records it.
        if let (true, Some(worker_id)) = (stopped, worker_id) {
            #[cfg(feature = "tracing")]
            tracing::warn!(worker_id, "lease deadline passed without renewal, stopping");
            inner.encoder.clear_worker_id();
            self.with_last_error(|slot| *slot = Some(Error::LeaseExpired { worker_id }));
        }
    }

    fn with_last_error<O>(&self, f: impl FnOnce(&mut Option<Error>) -> O) -> O {
        #[cfg(feature = "parking-lot")]
        let mut slot = self.inner.last_error.lock();
        #[cfg(not(feature = "parking-lot"))]
        let mut slot = self
            .inner
            .last_error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut *slot)
    }
}

impl<R, E> IdSource for Generator<R, E>
where
    R: LeaseRegistry,
    E: IdEncoder,
{
    fn next_raw_id(&self) -> Result<u64> {
        self.next_id().map(|id| id.to_raw())
    }

    fn status(&self) -> Status {
        Generator::status(self)
    }

    fn worker_id(&self) -> Option<u64> {
        Generator::worker_id(self)
    }

    fn last_error(&self) -> Option<Error> {
        Generator::last_error(self)
    }
}

impl<R, E> fmt::Debug for Generator<R, E>
where
    R: LeaseRegistry,
    E: IdEncoder,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("status", &self.status())
            .field("worker_id", &self.worker_id())
            .field("identity", self.identity())
            .field("last_error", &self.last_error())
            .finish_non_exhaustive()
    }
}
