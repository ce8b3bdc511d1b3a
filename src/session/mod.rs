//! The per-request session: a cookie plus the values stored behind it.

pub mod codec;
pub mod cookie;
pub mod value;

use rand::{Rng, distr::Alphanumeric};

pub use codec::{Codec, JsonCodec};
pub use cookie::{Cookie, CookieOptions};
pub use value::{Value, Values};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const ID_LEN: usize = 32;

// -----------------------------------------------------------------------------
// ----- Session ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub cookie: Cookie,
    pub values: Values,
}

// -----------------------------------------------------------------------------
// ----- Session: Static -------------------------------------------------------

impl Session {
    /// A brand new session with a random identifier.
    pub fn new(name: &str, options: &CookieOptions) -> Self {
        Self::with_id(name, generate_id(), options)
    }

    pub fn with_id(name: &str, id: impl Into<String>, options: &CookieOptions) -> Self {
        Self {
            cookie: Cookie::new(name, id, options),
            values: Values::new(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Session: Public -------------------------------------------------------

impl Session {
    pub fn id(&self) -> &str {
        &self.cookie.value
    }

    pub fn name(&self) -> &str {
        &self.cookie.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn generate_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
