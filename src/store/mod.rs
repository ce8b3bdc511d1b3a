//! Session persistence keyed by an HTTP cookie.

pub mod http;
pub mod redis_store;

use async_trait::async_trait;

use crate::errors::SessionError;
use crate::session::Session;

pub use self::http::{CookieSink, CookieSource};
pub use redis_store::{RedisStore, StoreOptions};

// -----------------------------------------------------------------------------
// ----- Store -----------------------------------------------------------------

#[async_trait]
pub trait Store: Send + Sync {
    /// A fresh session carrying the store's cookie defaults and a random id.
    fn new_session(&self, name: &str) -> Session;

    /// Loads the session named by the request's cookie. A session always comes
    /// back: on any error it is either a brand new one (cookie missing) or the
    /// shell built from the cookie with no values.
    async fn get<Q>(&self, request: &Q, name: &str) -> Lookup
    where
        Q: CookieSource + Sync + ?Sized;

    /// Persists the session's values and, once the write succeeded, appends
    /// its `Set-Cookie` header to the response.
    async fn set<R>(&self, response: &mut R, session: &Session) -> Result<(), SessionError>
    where
        R: CookieSink + Send + ?Sized;
}

// -----------------------------------------------------------------------------
// ----- Lookup ----------------------------------------------------------------

/// Outcome of `Store::get`.
#[derive(Debug)]
pub struct Lookup {
    pub session: Session,
    pub error: Option<SessionError>,
}

impl Lookup {
    pub fn found(session: Session) -> Self {
        Self {
            session,
            error: None,
        }
    }

    pub fn failed(session: Session, error: SessionError) -> Self {
        Self {
            session,
            error: Some(error),
        }
    }

    pub fn is_found(&self) -> bool {
        self.error.is_none()
    }

    /// True when the lookup failed only because there was nothing to load.
    pub fn is_new(&self) -> bool {
        self.error.as_ref().is_some_and(SessionError::is_new_session)
    }

    pub fn into_parts(self) -> (Session, Option<SessionError>) {
        (self.session, self.error)
    }

    /// The session when it was loaded, the error otherwise.
    pub fn into_result(self) -> Result<Session, SessionError> {
        match self.error {
            None => Ok(self.session),
            Some(e) => Err(e),
        }
    }
}
