use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info};

use super::{Connection, ConnectionPool, connection::RedisConnection};
use crate::config::RedisConfig;
use crate::errors::BackendError;

// -----------------------------------------------------------------------------
// ----- PoolStats -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub address: String,
    pub max: usize,
    pub idle: usize,
    pub in_use: usize,
    pub available: usize,
    pub closed: bool,
}

// -----------------------------------------------------------------------------
// ----- RedisPool -------------------------------------------------------------

/// Bounded pool of cache connections. Connections are dialed lazily on the
/// first `acquire` that finds no idle one; each live connection holds one
/// semaphore slot until it is dropped.
#[derive(Debug)]
pub struct RedisPool {
    config: RedisConfig,
    idle: Mutex<VecDeque<RedisConnection>>,
    slots: Arc<Semaphore>,
    max_connections: usize,
    closed: AtomicBool,
}

impl RedisPool {
    pub fn new(config: RedisConfig) -> Self {
        let max = config.max_connections.max(1);
        Self {
            config,
            idle: Mutex::new(VecDeque::with_capacity(max)),
            slots: Arc::new(Semaphore::new(max)),
            max_connections: max,
            closed: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    pub async fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().await.len();
        let available = self.slots.available_permits();
        let in_use = self
            .max_connections
            .saturating_sub(available)
            .saturating_sub(idle);

        PoolStats {
            address: self.config.address.clone(),
            max: self.max_connections,
            idle,
            in_use,
            available,
            closed: self.closed.load(Ordering::Acquire),
        }
    }

    async fn open_new_connection(&self) -> Result<RedisConnection, BackendError> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BackendError::PoolClosed)?;

        let mut conn = RedisConnection::connect(&self.config).await?;
        conn.attach_slot(permit);

        debug!("opened cache connection to {}", self.config.address);
        Ok(conn)
    }
}

#[async_trait]
impl ConnectionPool for RedisPool {
    type Conn = RedisConnection;

    async fn acquire(&self) -> Result<RedisConnection, BackendError> {
        {
            let mut idle = self.idle.lock().await;
            if self.closed.load(Ordering::Acquire) {
                return Err(BackendError::PoolClosed);
            }
            if let Some(conn) = idle.pop_front() {
                return Ok(conn);
            }
        }

        self.open_new_connection().await
    }

    async fn release(&self, conn: RedisConnection) {
        let mut idle = self.idle.lock().await;
        if self.closed.load(Ordering::Acquire) {
            drop(idle);
            conn.close().await;
            return;
        }
        idle.push_back(conn);
    }

    async fn close_all(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.slots.close();

        let drained: Vec<RedisConnection> = self.idle.lock().await.drain(..).collect();
        let count = drained.len();
        for conn in drained {
            conn.close().await;
        }

        info!(
            "closed cache pool for {}: {count} idle connections dropped",
            self.config.address
        );
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
