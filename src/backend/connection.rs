use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use std::{future::Future, time::Duration};
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::timeout;

use super::{Connection, transport::Transport};
use crate::config::RedisConfig;
use crate::errors::BackendError;
use crate::protocol::{Command, QueryResult, resp};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const READ_CAPACITY: usize = 4 * 1024;

// -----------------------------------------------------------------------------
// ----- RedisConnection -------------------------------------------------------

/// One authenticated connection to the cache. Commands are strictly
/// request/response: one command is written, one reply is read back.
#[derive(Debug)]
pub struct RedisConnection {
    transport: Transport,
    inbox: BytesMut,
    outbox: BytesMut,
    io_timeout: Option<Duration>,

    // Pool slot held for as long as this connection is alive.
    #[allow(dead_code)]
    slot: Option<OwnedSemaphorePermit>,
}

// -----------------------------------------------------------------------------
// ----- RedisConnection: Static -----------------------------------------------

impl RedisConnection {
    /// Dials the cache, then runs AUTH and SELECT when configured.
    pub async fn connect(config: &RedisConfig) -> Result<Self, BackendError> {
        let transport = with_timeout(
            config.connect_timeout,
            Transport::connect(config.network, &config.address),
        )
        .await??;

        let mut conn = Self {
            transport,
            inbox: BytesMut::with_capacity(READ_CAPACITY),
            outbox: BytesMut::with_capacity(READ_CAPACITY),
            io_timeout: config.io_timeout,
            slot: None,
        };

        conn.handshake(config).await?;
        Ok(conn)
    }
}

// -----------------------------------------------------------------------------
// ----- RedisConnection: Private ----------------------------------------------

impl RedisConnection {
    pub(crate) fn attach_slot(&mut self, slot: OwnedSemaphorePermit) {
        self.slot = Some(slot);
    }

    async fn handshake(&mut self, config: &RedisConfig) -> Result<(), BackendError> {
        if let Some(password) = config.password_exposed() {
            self.exec(&Command::auth(config.username.as_deref(), password))
                .await
                .map_err(|e| BackendError::Auth(format!("AUTH rejected: {e}")))?;
        }

        if config.database != 0 {
            self.exec(&Command::select(config.database))
                .await
                .map_err(|e| {
                    BackendError::Auth(format!("SELECT {} rejected: {e}", config.database))
                })?;
        }

        Ok(())
    }

    async fn exec(&mut self, command: &Command) -> QueryResult {
        self.outbox.clear();
        resp::encode_command(command, &mut self.outbox);

        with_timeout(self.io_timeout, self.round_trip()).await?
    }

    async fn round_trip(&mut self) -> QueryResult {
        self.transport.write_all_buf(&mut self.outbox).await?;

        loop {
            if let Some((reply, used)) = resp::parse_reply(&self.inbox)? {
                self.inbox.advance(used);
                return reply.into_result();
            }

            self.inbox.reserve(READ_CAPACITY);
            let n = self.transport.read_buf(&mut self.inbox).await?;
            if n == 0 {
                return Err(BackendError::Closed);
            }
        }
    }
}

#[async_trait]
impl Connection for RedisConnection {
    async fn execute(&mut self, command: &Command) -> QueryResult {
        self.exec(command).await
    }

    async fn close(mut self) {
        let _ = self.transport.shutdown().await;
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

async fn with_timeout<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = T>,
) -> Result<T, BackendError> {
    match limit {
        Some(limit) => timeout(limit, fut)
            .await
            .map_err(|_| BackendError::Timeout(limit)),
        None => Ok(fut.await),
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
