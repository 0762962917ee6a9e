use std::env;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hive_auth::{PublicKey, SecretKey};
use hive_log::LogConfig;
use serde::{Deserialize, Serialize};
use url::Url;

/// Defines the source of a config error.
#[derive(Debug, Default)]
enum ConfigErrorSource {
    /// An error occurring independently.
    #[default]
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field, either from a file or an override.
    Field(&'static str),
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    source: ConfigErrorSource,
    kind: ConfigErrorKind,
    inner: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            source: ConfigErrorSource::None,
            kind,
            inner: None,
        }
    }

    #[inline]
    fn wrap<E>(inner: E, kind: ConfigErrorKind) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            source: ConfigErrorSource::None,
            kind,
            inner: Some(Box::new(inner)),
        }
    }

    #[inline]
    fn for_field<E>(inner: E, field: &'static str) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::wrap(inner, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file<P: AsRef<Path>>(mut self, p: P) -> Self {
        self.source = ConfigErrorSource::File(p.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::Field(name);
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ConfigErrorSource::None => fmt::Display::fmt(&self.kind, f),
            ConfigErrorSource::File(file_name) => {
                write!(f, "{} (file {})", self.kind, file_name.display())
            }
            ConfigErrorSource::Field(name) => write!(f, "{} (field {})", self.kind, name),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Indicates config related errors.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config")]
    BadYaml,
    /// Parsing JSON failed.
    #[error("could not parse json config")]
    BadJson,
    /// Invalid config value.
    #[error("invalid config value")]
    InvalidValue,
}

/// The basename of configuration files.
const CONFIG_NAME: &str = "hive";

/// Default flush interval in seconds.
const DEFAULT_FLUSH_INTERVAL: u64 = 60;

/// Default interval at which the aggregation loop wakes up, in milliseconds.
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default number of events buffered between producers and the aggregation loop.
const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Structure used to hold information about configuration overrides via environment variables.
#[derive(Debug, Default)]
pub struct OverridableConfig {
    /// The name of the instrumented service.
    pub service: Option<String>,
    /// The deployment environment.
    pub env: Option<String>,
    /// The public key of the account.
    pub public_key: Option<String>,
    /// The secret key of the account.
    pub secret_key: Option<String>,
    /// The ingestion endpoint.
    pub endpoint: Option<String>,
    /// The flush interval in seconds.
    pub flush_interval: Option<String>,
}

impl OverridableConfig {
    /// Reads overrides from `HIVE_*` environment variables.
    ///
    /// Recognized variables are `HIVE_SERVICE`, `HIVE_ENV`, `HIVE_PUBLIC_KEY`, `HIVE_SECRET_KEY`,
    /// `HIVE_ENDPOINT` and `HIVE_FLUSH_INTERVAL`.
    pub fn from_env() -> Self {
        Self {
            service: env::var("HIVE_SERVICE").ok(),
            env: env::var("HIVE_ENV").ok(),
            public_key: env::var("HIVE_PUBLIC_KEY").ok(),
            secret_key: env::var("HIVE_SECRET_KEY").ok(),
            endpoint: env::var("HIVE_ENDPOINT").ok(),
            flush_interval: env::var("HIVE_FLUSH_INTERVAL").ok(),
        }
    }
}

/// The credentials used to sign payloads.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Credentials {
    /// The public key identifying the account.
    pub public_key: PublicKey,
    /// The secret key used to sign payloads.
    pub secret_key: SecretKey,
}

fn default_flush_interval() -> u64 {
    DEFAULT_FLUSH_INTERVAL
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Config struct.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Name of the instrumented service, attached to every metric as `service`.
    #[serde(default)]
    pub service: String,

    /// Deployment environment, attached to every metric as `env`.
    #[serde(default)]
    pub env: String,

    /// Keys used to identify and sign requests.
    pub credentials: Credentials,

    /// Base URL of the ingestion endpoint.
    pub endpoint: Url,

    /// Seconds between two flushes. Must be positive.
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u64,

    /// Milliseconds the aggregation loop waits for an event before checking the flush schedule.
    /// Must not exceed half the flush interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of events buffered before producers block.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Logging configuration, applied by `hive::init`.
    #[serde(default)]
    pub logging: LogConfig,
}

impl Config {
    /// Creates a config with default settings for the given account and endpoint.
    pub fn new(credentials: Credentials, endpoint: Url) -> Self {
        Self {
            service: String::new(),
            env: String::new(),
            credentials,
            endpoint,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            logging: LogConfig::default(),
        }
    }

    /// Loads a config from a given config folder.
    ///
    /// The folder must contain either `hive.yml` or `hive.json`. If both exist, the YAML file
    /// takes precedence. The loaded config is validated.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = env::current_dir()
            .map(|x| x.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let yaml_path = path.join(format!("{CONFIG_NAME}.yml"));
        let json_path = path.join(format!("{CONFIG_NAME}.json"));

        let config = if yaml_path.exists() {
            let f = fs::File::open(&yaml_path).map_err(|e| {
                ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&yaml_path)
            })?;
            serde_yaml::from_reader(io::BufReader::new(f))
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(&yaml_path))?
        } else {
            let f = fs::File::open(&json_path).map_err(|e| {
                ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&json_path)
            })?;
            serde_json::from_reader::<_, Config>(io::BufReader::new(f))
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadJson).file(&json_path))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a config from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::BadYaml))?;
        config.validate()?;
        Ok(config)
    }

    /// Creates and validates a config from a JSON value.
    ///
    /// This is mostly useful for tests.
    pub fn from_json_value(value: serde_json::Value) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_value(value)
            .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::BadJson))?;
        config.validate()?;
        Ok(config)
    }

    /// Override configuration with values coming from other sources, such as environment
    /// variables.
    pub fn apply_override(
        &mut self,
        overrides: OverridableConfig,
    ) -> Result<&mut Self, ConfigError> {
        if let Some(service) = overrides.service {
            self.service = service;
        }

        if let Some(env) = overrides.env {
            self.env = env;
        }

        if let Some(public_key) = overrides.public_key {
            self.credentials.public_key = public_key
                .parse()
                .map_err(|err| ConfigError::for_field(err, "public_key"))?;
        }

        if let Some(secret_key) = overrides.secret_key {
            self.credentials.secret_key = secret_key
                .parse()
                .map_err(|err| ConfigError::for_field(err, "secret_key"))?;
        }

        if let Some(endpoint) = overrides.endpoint {
            self.endpoint = endpoint
                .parse()
                .map_err(|err| ConfigError::for_field(err, "endpoint"))?;
        }

        if let Some(flush_interval) = overrides.flush_interval {
            self.flush_interval = flush_interval
                .trim()
                .parse()
                .map_err(|err| ConfigError::for_field(err, "flush_interval"))?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Checks that all values are within their valid ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval == 0 {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("flush_interval"));
        }

        // The loop must poll at least twice per flush interval to observe every flush window.
        if self.poll_interval_ms == 0
            || self.poll_interval_ms > self.flush_interval.saturating_mul(500)
        {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("poll_interval_ms"));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("queue_capacity"));
        }

        if self.endpoint.cannot_be_a_base() {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("endpoint"));
        }

        Ok(())
    }

    /// Returns the time between two flushes.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval)
    }

    /// Returns the maximum time the aggregation loop waits for an event.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the number of events buffered before producers block.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Returns the dimension prefix attached to every metric of this process.
    pub fn root_dimensions(&self) -> String {
        hive_metrics::root_dimensions(&self.service, &self.env)
    }

    /// Returns the public key of the account.
    pub fn public_key(&self) -> &PublicKey {
        &self.credentials.public_key
    }

    /// Returns the secret key of the account.
    pub fn secret_key(&self) -> &SecretKey {
        &self.credentials.secret_key
    }

    /// Returns the base URL of the ingestion endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> &LogConfig {
        &self.logging
    }
}
