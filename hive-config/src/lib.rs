//! Configuration for the Hive telemetry client.
//!
//! A [`Config`] can be built in code, parsed from YAML or JSON, or loaded from a `hive.yml` or
//! `hive.json` file in a configuration directory. Values from the environment can be layered on
//! top with [`OverridableConfig::from_env`] and [`Config::apply_override`].
//!
//! ```
//! use hive_config::Config;
//!
//! let config = Config::from_yaml_str(
//!     r#"
//! service: checkout
//! env: production
//! endpoint: https://ingest.example.com
//! credentials:
//!   public_key: PUBLIC_KEY
//!   secret_key: SECRET_KEY
//! "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.flush_interval().as_secs(), 60);
//! assert_eq!(config.root_dimensions(), "service=checkout,env=production,");
//! ```

#![warn(missing_docs)]

mod config;

pub use crate::config::*;
