//! Client library for publishing signed, aggregated metrics to a Hive ingestion endpoint.
//!
//! Applications record counters and samples through a [`MetricLogger`]. Events are aggregated in
//! the background by dimension set and metric, and delivered in fixed, wall-clock aligned
//! intervals as a signed text payload.
//!
//! Most applications initialize the process-wide logger once at startup with [`init`] and obtain
//! it anywhere else with [`logger`]. Until then, [`logger`] returns a no-op logger, so
//! instrumented code can run without any setup.
//!
//! # Example
//!
//! ```no_run
//! let config = hive::load_config("/etc/hive").unwrap();
//! hive::init(config);
//!
//! hive::logger().inc_counter("requests", 1.0);
//!
//! let login = hive::logger().extend_dimensions("api=Login");
//! login.record("latency", 42.0, "ms");
//! ```
//!
//! # Crates
//!
//! The library is split into several crates, which are re-exported here:
//!
//!  - [`auth`]: keys and payload signatures
//!  - [`config`]: configuration loading and validation
//!  - [`metrics`]: events, aggregation and the wire format
//!  - [`client`]: the event queue, aggregation service and publisher

#![warn(missing_docs)]

use std::path::Path;

use hive_log::LogError;
use once_cell::sync::OnceCell;

#[doc(inline)]
pub use hive_auth as auth;
#[doc(inline)]
pub use hive_client as client;
#[doc(inline)]
pub use hive_common as common;
#[doc(inline)]
pub use hive_config as config;
#[doc(inline)]
pub use hive_metrics as metrics;

pub use hive_client::{MetricLogger, Metrics};
pub use hive_config::{Config, ConfigError, Credentials};

static LOGGER: OnceCell<MetricLogger> = OnceCell::new();

/// Loads the config from a directory and applies overrides from `HIVE_*` environment variables.
///
/// See [`Config::from_path`] for the files that are read and
/// [`OverridableConfig::from_env`](hive_config::OverridableConfig::from_env) for the variables.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let mut config = Config::from_path(path)?;
    config.apply_override(hive_config::OverridableConfig::from_env())?;
    Ok(config)
}

/// Initializes logging and the process-wide metric logger.
///
/// Only the first call has an effect. Later calls return the existing logger and ignore their
/// config, but the config is still validated.
///
/// # Panics
///
/// Panics on every call with an invalid config, and if the aggregation service cannot be
/// started.
pub fn init(config: Config) -> &'static MetricLogger {
    if let Err(error) = config.validate() {
        hive_log::ensure_error(&error);
        panic!("invalid metric logger config: {}", LogError(&error));
    }

    LOGGER.get_or_init(|| {
        hive_log::init(config.logging());

        match MetricLogger::start(&config) {
            Ok(logger) => logger,
            Err(error) => panic!("failed to start metric logger: {}", LogError(&error)),
        }
    })
}

/// Returns the process-wide metric logger.
///
/// Before [`init`] has been called, this returns a no-op logger that discards all metrics.
pub fn logger() -> &'static MetricLogger {
    static NOOP: MetricLogger = MetricLogger::Noop;
    LOGGER.get().unwrap_or(&NOOP)
}
