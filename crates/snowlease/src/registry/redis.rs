use core::time::Duration;

use redis::aio::ConnectionManager;

use crate::{LeaseRegistry, RegistryError};

/// A [`LeaseRegistry`] backed by Redis.
///
/// - acquire: `SET key identity NX PX ttl`
/// - renew: `GETEX key PX ttl`
///
/// The connection manager reconnects on its own, so a registry outage shows
/// up as failed ticks rather than a dead client.
#[derive(Clone)]
pub struct RedisRegistry {
    conn: ConnectionManager,
}

impl RedisRegistry {
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379/0`).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unavailable`] if the URL is invalid or the
    /// first connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, RegistryError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = ConnectionManager::new(client).await.map_err(unavailable)?;
        Ok(Self { conn })
    }

    pub const fn from_connection_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Round-trips a `PING`, for readiness checks at startup.
    pub async fn ping(&self) -> Result<(), RegistryError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

impl LeaseRegistry for RedisRegistry {
    async fn try_acquire(
        &self,
        key: &str,
        identity: &str,
        ttl: Duration,
    ) -> Result<bool, RegistryError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(identity)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(reply.is_some())
    }

    async fn renew_and_check(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<String>, RegistryError> {
        let mut conn = self.conn.clone();
        redis::cmd("GETEX")
            .arg(key)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PX 0 is rejected by the server.
    (ttl.as_millis() as u64).max(1)
}

fn unavailable(err: redis::RedisError) -> RegistryError {
    RegistryError::unavailable(err.to_string())
}
