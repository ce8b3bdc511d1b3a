//! Connections to the cache and the pool that lends them out.

pub mod connection;
pub mod pool;
pub(crate) mod transport;

use async_trait::async_trait;

use crate::errors::BackendError;
use crate::protocol::{Command, QueryResult};

pub use connection::RedisConnection;
pub use pool::{PoolStats, RedisPool};

// -----------------------------------------------------------------------------
// ----- Connection ------------------------------------------------------------

/// A single cache connection. Only one command is ever in flight on it.
#[async_trait]
pub trait Connection: Send + Sized + 'static {
    async fn execute(&mut self, command: &Command) -> QueryResult;

    async fn close(self);
}

// -----------------------------------------------------------------------------
// ----- ConnectionPool --------------------------------------------------------

#[async_trait]
pub trait ConnectionPool: Send + Sync + 'static {
    type Conn: Connection;

    async fn acquire(&self) -> Result<Self::Conn, BackendError>;

    /// Hands a healthy connection back. Once the pool is closed the
    /// connection is closed instead.
    async fn release(&self, conn: Self::Conn);

    async fn close_all(&self);
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
