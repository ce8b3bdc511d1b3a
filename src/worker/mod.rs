//! The session worker: the only task that ever touches a cache connection.
//!
//! Callers never see a connection. They push a `Query` into the request
//! channel and wait on its reply slot; the worker pops queries one at a time,
//! runs them on the connection it holds, and answers each exactly once.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::backend::{Connection, ConnectionPool};
use crate::errors::BackendError;
use crate::protocol::Query;

// -----------------------------------------------------------------------------
// ----- Worker ----------------------------------------------------------------

pub struct Worker<P: ConnectionPool> {
    pool: Arc<P>,
    queries: mpsc::Receiver<Query>,
    stop: watch::Receiver<bool>,
}

// -----------------------------------------------------------------------------
// ----- Worker: Static --------------------------------------------------------

impl<P: ConnectionPool> Worker<P> {
    pub fn new(pool: Arc<P>, queries: mpsc::Receiver<Query>, stop: watch::Receiver<bool>) -> Self {
        Self {
            pool,
            queries,
            stop,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Worker: Public --------------------------------------------------------

impl<P: ConnectionPool> Worker<P> {
    /// Serves queries until the stop flag is raised or every sender is gone.
    /// On the way out the held connection goes back to the pool and the pool
    /// is closed.
    pub async fn run(mut self) {
        let mut slot: Option<P::Conn> = None;
        if !*self.stop.borrow() {
            slot = self.lease().await;
        }

        info!("session worker started");

        loop {
            tokio::select! {
                biased;

                changed = self.stop.changed() => {
                    if changed.is_err() || *self.stop.borrow() {
                        break;
                    }
                }

                query = self.queries.recv() => {
                    match query {
                        Some(query) => self.serve(&mut slot, query).await,
                        None => break,
                    }
                }
            }
        }

        // Anything still queued is dropped unanswered, which its issuer
        // observes as WorkerStopped.
        self.queries.close();

        if let Some(conn) = slot.take() {
            self.pool.release(conn).await;
        }
        self.pool.close_all().await;

        info!("session worker stopped");
    }
}

// -----------------------------------------------------------------------------
// ----- Worker: Private -------------------------------------------------------

impl<P: ConnectionPool> Worker<P> {
    async fn serve(&self, slot: &mut Option<P::Conn>, query: Query) {
        let action = query.command().action().as_str();

        let result = match self.checkout(slot).await {
            Ok(conn) => conn.execute(query.command()).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            if e.poisons_connection() {
                warn!("{action} failed: {e}");

                if let Some(conn) = slot.take() {
                    conn.close().await;
                    *slot = self.lease().await;
                }
            }
        }

        if !query.respond(result) {
            debug!("{action} answered after its caller went away");
        }
    }

    /// The held connection, or a freshly acquired one when the slot is empty.
    async fn checkout<'a>(
        &self,
        slot: &'a mut Option<P::Conn>,
    ) -> Result<&'a mut P::Conn, BackendError> {
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.pool.acquire().await?,
        };
        Ok(slot.insert(conn))
    }

    async fn lease(&self) -> Option<P::Conn> {
        match self.pool.acquire().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!("could not acquire cache connection: {e}");
                None
            }
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
