pub mod cli;
#[allow(clippy::module_inception)]
pub mod config;
pub mod store;
pub mod types;

pub use cli::CliConfig;
pub use config::Config;
pub use store::{RedisConfig, StoreConfig};
pub use types::{LogLevel, Network};
