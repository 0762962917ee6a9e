//! Metric collection and delivery for Hive.
//!
//! A [`MetricLogger`] is started from a [`Config`](hive_config::Config). It spawns an aggregation
//! service on a dedicated thread that consumes events from a bounded queue, merges them, and
//! periodically sends them to the ingestion endpoint as signed `PutMetric` requests.
//!
//! ```text
//! MetricLogger / Metrics  ->  EventQueue  ->  AggregatorService  ->  Publisher  ->  HTTP
//!      (producers)           (bounded)       (single consumer)     (own runtime)
//! ```
//!
//! Recording a metric never fails. Invalid values are dropped, and delivery errors are logged
//! and discarded.
//!
//! # Example
//!
//! ```no_run
//! use hive_client::MetricLogger;
//! use hive_config::{Config, Credentials};
//!
//! let credentials = Credentials {
//!     public_key: "PUBLIC_KEY".parse().unwrap(),
//!     secret_key: "SECRET_KEY".parse().unwrap(),
//! };
//! let mut config = Config::new(credentials, "https://ingest.example.com".parse().unwrap());
//! config.service = "checkout".to_owned();
//!
//! let logger = MetricLogger::start(&config).unwrap();
//! logger.inc_counter("orders", 1.0);
//!
//! let metrics = logger.extend_dimensions("api=PlaceOrder");
//! metrics.record("latency", 120.0, "ms");
//!
//! logger.flush();
//! ```

#![warn(missing_docs)]

mod logger;
mod publisher;
mod queue;
mod service;

pub use self::logger::*;
pub use self::publisher::*;
pub use self::queue::*;
pub use self::service::*;
