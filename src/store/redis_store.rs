use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::http::{CookieSink, CookieSource, set_cookie_value};
use super::{Lookup, Store};
use crate::backend::{ConnectionPool, RedisPool};
use crate::config::StoreConfig;
use crate::config::store::{DEFAULT_COOKIE_NAME, DEFAULT_KEY_PREFIX};
use crate::errors::{BackendError, SessionError};
use crate::protocol::{Command, Query, QueryResult, Reply};
use crate::session::{Codec, CookieOptions, JsonCodec, Session};
use crate::worker::Worker;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

// Closest a bounded tokio channel gets to a rendezvous.
const QUERY_CHANNEL_CAPACITY: usize = 1;

// -----------------------------------------------------------------------------
// ----- StoreOptions ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub cookie_name: String,
    pub cookie: CookieOptions,
    pub key_prefix: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie: CookieOptions::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl From<&StoreConfig> for StoreOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            cookie: config.cookie.clone(),
            key_prefix: config.key_prefix.clone(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- RedisStore ------------------------------------------------------------

/// Cookie-keyed session store in front of a Redis-compatible cache.
///
/// Every backend call goes through a single worker task (see `run`/`spawn`)
/// which owns the only connection in use. The store itself just builds
/// queries and waits for their answers, so it can be shared freely behind an
/// `Arc`.
pub struct RedisStore<P: ConnectionPool = RedisPool> {
    pool: Arc<P>,
    codec: Arc<dyn Codec>,
    options: StoreOptions,
    queries: mpsc::Sender<Query>,
    stop: watch::Sender<bool>,
    worker: Mutex<Option<Worker<P>>>,
}

// -----------------------------------------------------------------------------
// ----- RedisStore: Static ----------------------------------------------------

impl RedisStore<RedisPool> {
    /// Builds the pool from config. Nothing is dialed until the worker runs.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(RedisPool::new(config.redis.clone()), StoreOptions::from(config))
    }
}

impl<P: ConnectionPool> RedisStore<P> {
    pub fn new(pool: P, options: StoreOptions) -> Self {
        Self::with_codec(pool, options, JsonCodec)
    }

    pub fn with_codec(pool: P, options: StoreOptions, codec: impl Codec) -> Self {
        let pool = Arc::new(pool);
        let (queries, rx) = mpsc::channel(QUERY_CHANNEL_CAPACITY);
        let (stop, stop_rx) = watch::channel(false);
        let worker = Worker::new(Arc::clone(&pool), rx, stop_rx);

        Self {
            pool,
            codec: Arc::new(codec),
            options,
            queries,
            stop,
            worker: Mutex::new(Some(worker)),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- RedisStore: Public ----------------------------------------------------

impl<P: ConnectionPool> RedisStore<P> {
    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn cookie_name(&self) -> &str {
        &self.options.cookie_name
    }

    /// Cache key holding the session behind `id`.
    pub fn key_for(&self, id: &str) -> String {
        format!("{}{id}", self.options.key_prefix)
    }

    /// Serves queries on the current task until `stop`. Only the first call
    /// does anything.
    pub async fn run(&self) {
        let worker = self.worker.lock().take();
        match worker {
            Some(worker) => worker.run().await,
            None => warn!("session worker already started or stopped"),
        }
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move { store.run().await })
    }

    /// Stops the worker and closes the pool. Queries issued afterwards fail
    /// with `WorkerStopped` or `PoolClosed`.
    pub async fn stop(&self) {
        if self.stop.send_replace(true) {
            return;
        }

        // A worker that never ran still owns the receiving end.
        drop(self.worker.lock().take());

        self.pool.close_all().await;
        info!("session store stopped");
    }

    pub async fn ping(&self) -> Result<(), SessionError> {
        match self.query(Command::ping()).await? {
            Reply::Status(_) => Ok(()),
            _ => Err(SessionError::UnexpectedReply { action: "PING" }),
        }
    }

    /// Removes the session from the cache and, on success, tells the client
    /// to drop its cookie.
    pub async fn delete<R>(&self, response: &mut R, session: &Session) -> Result<(), SessionError>
    where
        R: CookieSink + Send + ?Sized,
    {
        let header = set_cookie_value(&session.cookie.expired())?;
        self.query(Command::del(self.key_for(session.id()))).await?;
        response.append_set_cookie(header);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- RedisStore: Private ---------------------------------------------------

impl<P: ConnectionPool> RedisStore<P> {
    async fn query(&self, command: Command) -> QueryResult {
        let (query, pending) = Query::new(command);
        self.queries
            .send(query)
            .await
            .map_err(|_| BackendError::WorkerStopped)?;
        pending.wait().await
    }
}

// -----------------------------------------------------------------------------
// ----- RedisStore: Store -----------------------------------------------------

#[async_trait]
impl<P: ConnectionPool> Store for RedisStore<P> {
    fn new_session(&self, name: &str) -> Session {
        Session::new(name, &self.options.cookie)
    }

    async fn get<Q>(&self, request: &Q, name: &str) -> Lookup
    where
        Q: CookieSource + Sync + ?Sized,
    {
        let Some(id) = request.cookie(name).filter(|id| !id.is_empty()) else {
            return Lookup::failed(
                self.new_session(name),
                SessionError::CookieMissing {
                    name: name.to_string(),
                },
            );
        };

        let mut session = Session::with_id(name, id, &self.options.cookie);

        match self.query(Command::get(self.key_for(session.id()))).await {
            Ok(Reply::Bulk(payload)) => {
                match self.codec.decode(&payload) {
                    Ok(values) => session.values = values,
                    Err(e) => warn!("discarding unreadable session payload: {e}"),
                }
                Lookup::found(session)
            }
            Ok(_) => Lookup::failed(session, SessionError::UnexpectedReply { action: "GET" }),
            Err(e) => {
                if !e.is_not_found() {
                    debug!("session lookup failed: {e}");
                }
                Lookup::failed(session, e.into())
            }
        }
    }

    async fn set<R>(&self, response: &mut R, session: &Session) -> Result<(), SessionError>
    where
        R: CookieSink + Send + ?Sized,
    {
        let payload = self.codec.encode(&session.values)?;
        let header = set_cookie_value(&session.cookie)?;

        self.query(Command::setex(
            self.key_for(session.id()),
            session.cookie.max_age,
            payload,
        ))
        .await?;

        response.append_set_cookie(header);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
