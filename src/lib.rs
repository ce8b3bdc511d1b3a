pub mod backend;
pub mod config;
pub mod errors;
pub mod protocol;
pub mod session;
pub mod store;
pub mod worker;

pub use backend::{Connection, ConnectionPool, RedisPool};
pub use config::{Config, StoreConfig};
pub use errors::{BackendError, CodecError, ConfigError, SessionError};
pub use session::{Session, Value};
pub use store::{Lookup, RedisStore, Store, StoreOptions};
