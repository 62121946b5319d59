use core::{future::Future, time::Duration};

use crate::{
    Error, GeneratorConfig, Identity, LeaseRegistry, RegistryError, Result, SlotOrder,
    WorkerKeyFormat,
};

/// Claims and keeps one worker slot in a [`LeaseRegistry`].
///
/// The manager holds no state about which slot it owns; callers pass the
/// slot they believe they hold to [`renew`] or [`reconcile`]. Every registry
/// call is bounded by the configured registry timeout, and a timeout is
/// reported as [`RegistryError::Timeout`].
///
/// [`renew`]: WorkerIdentityManager::renew
/// [`reconcile`]: WorkerIdentityManager::reconcile
#[derive(Debug)]
pub struct WorkerIdentityManager<R: LeaseRegistry> {
    registry: R,
    identity: Identity,
    key_format: WorkerKeyFormat,
    max_workers: u64,
    lease_ttl: Duration,
    registry_timeout: Duration,
    slot_order: SlotOrder,
}

impl<R: LeaseRegistry> WorkerIdentityManager<R> {
    pub fn new(registry: R, identity: Identity, config: &GeneratorConfig) -> Self {
        Self {
            registry,
            identity,
            key_format: config.key_format.clone(),
            max_workers: config.max_workers,
            lease_ttl: config.lease_ttl,
            registry_timeout: config.registry_timeout,
            slot_order: config.slot_order,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn key(&self, worker_id: u64) -> String {
        self.key_format.key(worker_id)
    }

    /// Scans the candidate slots and claims the first free one.
    ///
    /// A registry failure aborts the scan immediately, since continuing
    /// could not tell "taken" from "unreachable" for the remaining slots.
    ///
    /// # Errors
    ///
    /// - [`Error::NoAvailableWorkerId`] if every slot is held.
    /// - [`Error::RegistryUnavailable`] if any registry call fails.
    pub async fn acquire(&self) -> Result<u64> {
        for worker_id in self.slot_order.candidates(self.max_workers) {
            let key = self.key(worker_id);
            let created = self
                .bounded(
                    self.registry
                        .try_acquire(&key, self.identity.as_str(), self.lease_ttl),
                )
                .await?;
            if created {
                return Ok(worker_id);
            }
        }
        Err(Error::NoAvailableWorkerId {
            max_workers: self.max_workers,
        })
    }

    /// Refreshes the lease on `worker_id` and confirms it still names this
    /// process.
    ///
    /// # Errors
    ///
    /// - [`Error::LeaseLost`] if the key is gone or held by another identity.
    /// - [`Error::RegistryUnavailable`] if the registry call fails.
    pub async fn renew(&self, worker_id: u64) -> Result<()> {
        let key = self.key(worker_id);
        let holder = self
            .bounded(self.registry.renew_and_check(&key, self.lease_ttl))
            .await?;
        match holder {
            Some(holder) if holder == self.identity.as_str() => Ok(()),
            holder => Err(Error::LeaseLost { key, holder }),
        }
    }

    /// Renews `held` if it is `Some`, otherwise [`reacquire`]s starting from
    /// `previous`.
    ///
    /// Returns the slot held after the call.
    ///
    /// [`reacquire`]: WorkerIdentityManager::reacquire
    pub async fn reconcile(&self, held: Option<u64>, previous: Option<u64>) -> Result<u64> {
        match held {
            Some(worker_id) => self.renew(worker_id).await.map(|()| worker_id),
            None => self.reacquire(previous).await,
        }
    }

    /// Like [`acquire`], but first tries to resume `previous` if the registry
    /// still names this process as its holder.
    ///
    /// This lets a process that merely lost contact with the registry keep
    /// its old slot instead of leaking it until the TTL runs out. Any other
    /// outcome on `previous` falls through to the regular scan.
    ///
    /// [`acquire`]: WorkerIdentityManager::acquire
    pub async fn reacquire(&self, previous: Option<u64>) -> Result<u64> {
        if let Some(worker_id) = previous.filter(|&id| id < self.max_workers) {
            match self.renew(worker_id).await {
                Ok(()) => return Ok(worker_id),
                Err(Error::LeaseLost { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        self.acquire().await
    }

    async fn bounded<F, T>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T, RegistryError>>,
    {
        match tokio::time::timeout(self.registry_timeout, call).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(RegistryError::Timeout {
                after: self.registry_timeout,
            }
            .into()),
        }
    }
}
