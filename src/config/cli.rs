use clap::Parser;
use std::{
    ffi::OsString,
    fs,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
};

use super::types::LogLevel;
use crate::errors::ConfigError;

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub listen_addr: SocketAddr,
    pub config_file_location: Option<PathBuf>,
    pub log_level: LogLevel,
    pub redis_address: Option<String>,
    pub redis_password: Option<String>,
}

impl CliConfig {
    pub fn from_args() -> Result<CliConfig, ConfigError> {
        Self::parse_from(std::env::args_os())
    }

    pub fn parse_from<I, T>(args: I) -> Result<CliConfig, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = Args::try_parse_from(args)
            .map_err(|e| ConfigError::Invalid(format!("invalid CLI/ENV: {e}")))?;

        let cfg = Self {
            listen_addr: SocketAddr::from((args.host, args.port)),
            config_file_location: args.config_file,
            log_level: args.log_level,
            redis_address: args.redis_address,
            redis_password: args.redis_password,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Private ----------------------------------------------------

impl CliConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.config_file_location {
            must_exist_file(path, "--config / sessioncrab.toml")?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "sessioncrab", version, about = "Redis-backed HTTP sessions")]
struct Args {
    // IPv4 or IPv6 literal the demo server binds to.
    #[arg(long = "host", short = 'H', env = "SESSIONCRAB_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(long = "port", short = 'p', env = "SESSIONCRAB_PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long = "log", default_value = "info")]
    log_level: LogLevel,

    // Optional; built-in defaults apply when absent.
    #[arg(long = "config", env = "SESSIONCRAB_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    // Overrides [redis].address from the config file.
    #[arg(long = "redis", env = "SESSIONCRAB_REDIS_ADDR")]
    redis_address: Option<String>,

    // Overrides [redis].password from the config file.
    #[arg(long = "redis-password", env = "SESSIONCRAB_REDIS_PASSWORD", hide_env_values = true)]
    redis_password: Option<String>,
}

// -----------------------------------------------------------------------------
// ----- Private Utils ---------------------------------------------------------

fn must_exist_file(path: &Path, hint: &str) -> Result<(), ConfigError> {
    let md = fs::metadata(path).map_err(|_| {
        ConfigError::Invalid(format!(
            "required file missing: {} (from {hint})",
            path.display()
        ))
    })?;

    if !md.is_file() {
        return Err(ConfigError::Invalid(format!(
            "path is not a file: {} (from {hint})",
            path.display()
        )));
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
