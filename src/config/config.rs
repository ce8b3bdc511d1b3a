use secrecy::SecretString;
use std::net::SocketAddr;

use super::{cli::CliConfig, store::StoreConfig, types::LogLevel};
use crate::errors::ConfigError;

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

/// Everything the demo server needs: CLI/env first, then the optional config
/// file, then the CLI overrides applied on top of the file.
#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: LogLevel,
    pub store: StoreConfig,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    pub async fn load() -> Result<Config, ConfigError> {
        let cli = CliConfig::from_args()?;
        Self::from_cli(cli).await
    }

    pub async fn from_cli(cli: CliConfig) -> Result<Config, ConfigError> {
        let mut store = match &cli.config_file_location {
            Some(path) => StoreConfig::from_file(path).await?,
            None => StoreConfig::default(),
        };

        if let Some(address) = cli.redis_address {
            store.redis.address = address;
        }
        if let Some(password) = cli.redis_password {
            store.redis.password = Some(SecretString::new(password.into_boxed_str()));
        }

        Ok(Config {
            listen_addr: cli.listen_addr,
            log_level: cli.log_level,
            store,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
