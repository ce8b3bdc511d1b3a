use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tokio::fs;

use super::types::Network;
use crate::errors::ConfigError;
use crate::session::cookie::{CookieOptions, DEFAULT_MAX_AGE};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_KEY_PREFIX: &str = "session_:";
pub const DEFAULT_COOKIE_NAME: &str = "session";
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:6379";
pub const DEFAULT_MAX_CONNECTIONS: usize = 3;

// -----------------------------------------------------------------------------
// ----- StoreConfig -----------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub redis: RedisConfig,
    pub cookie: CookieOptions,
    pub cookie_name: String,
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        ConfigFile::default().into_config()
    }
}

// -----------------------------------------------------------------------------
// ----- StoreConfig: Static ---------------------------------------------------

impl StoreConfig {
    pub async fn from_file(path: &Path) -> Result<StoreConfig, ConfigError> {
        let raw = fs::read_to_string(path).await.map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<StoreConfig, ConfigError> {
        let doc: ConfigFile = toml::from_str(raw).map_err(|e| ConfigError::Toml { source: e })?;
        validate(&doc)?;
        Ok(doc.into_config())
    }
}

// -----------------------------------------------------------------------------
// ----- RedisConfig -----------------------------------------------------------

/// Where the cache lives and how connections to it are opened.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub network: Network,
    pub address: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub database: u32,
    pub max_connections: usize,
    pub connect_timeout: Option<Duration>,
    pub io_timeout: Option<Duration>,
}

impl RedisConfig {
    pub fn tcp(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password: String = password.into();
        self.password = Some(SecretString::new(password.into_boxed_str()));
        self
    }

    pub fn password_exposed(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisSection::default().into_config()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    store: StoreSection,

    #[serde(default)]
    redis: RedisSection,

    #[serde(default)]
    cookie: CookieSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StoreSection {
    key_prefix: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RedisSection {
    network: Network,
    address: String,
    username: Option<String>,
    password: Option<String>,
    database: u32,
    max_connections: usize,

    #[serde(deserialize_with = "de_duration")]
    connect_timeout: Option<Duration>,

    #[serde(deserialize_with = "de_duration")]
    io_timeout: Option<Duration>,
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            network: Network::Tcp,
            address: DEFAULT_ADDRESS.to_string(),
            username: None,
            password: None,
            database: 0,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: None,
            io_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CookieSection {
    name: String,
    path: String,
    domain: Option<String>,

    #[serde(deserialize_with = "de_duration")]
    max_age: Option<Duration>,

    secure: bool,
    http_only: bool,
}

impl Default for CookieSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            path: "/".to_string(),
            domain: None,
            max_age: Some(Duration::from_secs(DEFAULT_MAX_AGE as u64)),
            secure: false,
            http_only: false,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Conversion --------------------------------------------------

impl ConfigFile {
    fn into_config(self) -> StoreConfig {
        let max_age = self
            .cookie
            .max_age
            .map(|age| i64::try_from(age.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(DEFAULT_MAX_AGE);

        StoreConfig {
            redis: self.redis.into_config(),
            cookie: CookieOptions {
                path: self.cookie.path,
                domain: self.cookie.domain,
                max_age,
                secure: self.cookie.secure,
                http_only: self.cookie.http_only,
            },
            cookie_name: self.cookie.name,
            key_prefix: self.store.key_prefix,
        }
    }
}

impl RedisSection {
    fn into_config(self) -> RedisConfig {
        RedisConfig {
            network: self.network,
            address: self.address,
            username: self.username,
            password: self
                .password
                .map(|p| SecretString::new(p.into_boxed_str())),
            database: self.database,
            max_connections: self.max_connections,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn validate(doc: &ConfigFile) -> Result<(), ConfigError> {
    if doc.redis.address.trim().is_empty() {
        return Err(ConfigError::Invalid("redis.address is empty".into()));
    }
    if doc.redis.max_connections == 0 {
        return Err(ConfigError::Invalid(
            "redis.max_connections must be at least 1".into(),
        ));
    }
    if doc.redis.username.is_some() && doc.redis.password.is_none() {
        return Err(ConfigError::Invalid(
            "redis.username requires redis.password".into(),
        ));
    }
    for (key, timeout) in [
        ("redis.connect_timeout", doc.redis.connect_timeout),
        ("redis.io_timeout", doc.redis.io_timeout),
    ] {
        if timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Invalid(format!(
                "{key} must be greater than zero; leave it out to wait forever"
            )));
        }
    }
    if doc.cookie.name.trim().is_empty() {
        return Err(ConfigError::Invalid("cookie.name is empty".into()));
    }
    if doc.cookie.max_age.is_some_and(|age| age.as_secs() == 0) {
        return Err(ConfigError::Invalid(
            "cookie.max_age must be at least one second".into(),
        ));
    }
    if doc.store.key_prefix.is_empty() {
        return Err(ConfigError::Invalid("store.key_prefix is empty".into()));
    }
    Ok(())
}

/// Accepts humantime strings ("30days", "250ms") or whole seconds.
fn de_duration<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{Error, Unexpected, Visitor};
    use std::fmt;

    struct OptVisitor;
    struct DurationVisitor;

    impl<'de> Visitor<'de> for OptVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration (e.g., \"5s\", \"30days\") or whole seconds")
        }
        fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_some<D2>(self, d2: D2) -> Result<Self::Value, D2::Error>
        where
            D2: serde::Deserializer<'de>,
        {
            d2.deserialize_any(DurationVisitor)
        }
    }

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration (e.g., \"5s\", \"30days\") or whole seconds")
        }

        fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
            if v < 0 {
                return Err(E::invalid_value(Unexpected::Signed(v), &self));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    d.deserialize_option(OptVisitor)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
