use std::io;
use std::sync::Arc;

use hive_common::{now_millis, unit};
use hive_config::{Config, ConfigError};
use hive_metrics::{FlushScheduler, MetricEvent, is_valid_value};

use crate::publisher::{PublishError, Publisher};
use crate::queue::EventQueue;
use crate::service::AggregatorService;

/// An error while starting a [`MetricLogger`].
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// The configuration is invalid.
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    /// The publisher could not be created.
    #[error("could not create publisher")]
    Publisher(#[from] PublishError),
    /// The aggregation thread could not be spawned.
    #[error("could not spawn aggregation thread")]
    Spawn(#[from] io::Error),
}

/// A producer bound to a fixed dimension string.
///
/// Handles are cheap to clone and can be shared between threads. All clones feed the same
/// aggregation service.
#[derive(Clone, Debug)]
pub struct MetricHandle {
    queue: EventQueue,
    dimensions: Arc<str>,
}

impl MetricHandle {
    fn new(queue: EventQueue, dimensions: String) -> Self {
        Self {
            queue,
            dimensions: dimensions.into(),
        }
    }

    /// Returns the raw dimension string attached to every event of this handle.
    pub fn dimensions(&self) -> &str {
        &self.dimensions
    }

    /// Adds `value` to the counter `name`.
    pub fn inc_counter(&self, name: &str, value: f64) {
        self.record(name, value, unit::COUNTER);
    }

    /// Records a sample of `name` in the given unit.
    ///
    /// Negative and non-finite values are ignored. Blocks while the event queue is full.
    pub fn record(&self, name: &str, value: f64, unit: impl AsRef<str>) {
        if !is_valid_value(value) {
            hive_log::trace!("ignoring invalid value {value} for metric {name}");
            return;
        }

        let event = MetricEvent::new(&*self.dimensions, name, value, unit.as_ref());
        self.queue.publish(event);
    }

    /// Returns a handle that appends `extra` to the dimensions of this handle.
    pub fn extend_dimensions(&self, extra: &str) -> Self {
        let dimensions = hive_metrics::extend_dimensions(&self.dimensions, extra);
        Self::new(self.queue.clone(), dimensions)
    }

    fn flush(&self) -> bool {
        self.queue.flush()
    }
}

/// A handle with additional dimensions, obtained from [`MetricLogger::extend_dimensions`].
#[derive(Clone, Debug, Default)]
pub enum Metrics {
    /// Discards all metrics.
    #[default]
    Noop,
    /// Sends metrics to a running aggregation service.
    Real(MetricHandle),
}

impl Metrics {
    /// Adds `value` to the counter `name`.
    pub fn inc_counter(&self, name: &str, value: f64) {
        if let Self::Real(handle) = self {
            handle.inc_counter(name, value);
        }
    }

    /// Records a sample of `name` in the given unit.
    pub fn record(&self, name: &str, value: f64, unit: impl AsRef<str>) {
        if let Self::Real(handle) = self {
            handle.record(name, value, unit);
        }
    }
}

/// The entry point for recording metrics.
///
/// A logger is either [`Noop`](Self::Noop), which silently discards everything, or backed by a
/// running aggregation service. Events carry the root dimensions built from the configured
/// `service` and `env`.
///
/// The aggregation service keeps running while the logger or any handle derived from it is
/// alive. After the last one has been dropped, it flushes the remaining metrics and stops.
#[derive(Clone, Debug, Default)]
pub enum MetricLogger {
    /// Discards all metrics.
    #[default]
    Noop,
    /// Sends metrics to a running aggregation service.
    Real(MetricHandle),
}

impl MetricLogger {
    /// Validates the config and starts the aggregation service.
    pub fn start(config: &Config) -> Result<Self, StartError> {
        config.validate()?;

        let (queue, rx) = EventQueue::bounded(config.queue_capacity());
        let publisher = Publisher::new(config)?;
        let scheduler = FlushScheduler::new(config.flush_interval(), now_millis());
        AggregatorService::new(rx, publisher, scheduler, config.poll_interval()).start()?;

        hive_log::info!(
            "metric logger started, flushing to {} every {}s",
            config.endpoint(),
            config.flush_interval
        );

        Ok(Self::Real(MetricHandle::new(queue, config.root_dimensions())))
    }

    /// Returns `true` if this logger discards all metrics.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }

    /// Adds `value` to the counter `name`.
    pub fn inc_counter(&self, name: &str, value: f64) {
        if let Self::Real(handle) = self {
            handle.inc_counter(name, value);
        }
    }

    /// Records a sample of `name` in the given unit.
    ///
    /// Negative and non-finite values are ignored.
    pub fn record(&self, name: &str, value: f64, unit: impl AsRef<str>) {
        if let Self::Real(handle) = self {
            handle.record(name, value, unit);
        }
    }

    /// Returns a handle that attaches `extra` after the root dimensions.
    ///
    /// `extra` is a comma separated list of `key=value` pairs, such as `api=Login,region=eu`.
    pub fn extend_dimensions(&self, extra: &str) -> Metrics {
        match self {
            Self::Noop => Metrics::Noop,
            Self::Real(handle) => Metrics::Real(handle.extend_dimensions(extra)),
        }
    }

    /// Flushes all metrics recorded so far and waits for delivery.
    ///
    /// Returns `false` if nothing was flushed because the logger is a no-op or the aggregation
    /// service has stopped.
    pub fn flush(&self) -> bool {
        match self {
            Self::Noop => false,
            Self::Real(handle) => handle.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use hive_common::MetricUnit;
    use hive_config::Credentials;
    use hive_test::MockIngest;
    use similar_asserts::assert_eq;

    use super::*;

    fn config(endpoint: &str) -> Config {
        let credentials = Credentials {
            public_key: "PUBLIC_KEY".parse().unwrap(),
            secret_key: "SECRET_KEY".parse().unwrap(),
        };
        let mut config = Config::new(credentials, endpoint.parse().unwrap());
        config.service = "GolangMonitoring".to_owned();
        config.env = "Test".to_owned();
        config.poll_interval_ms = 20;
        config
    }

    /// Sums all values of metric `name` across the given payload lines.
    fn sum(lines: &[String], name: &str) -> f64 {
        let prefix = format!("m.{name}=");
        lines
            .iter()
            .flat_map(|line| line.split(','))
            .filter_map(|part| part.strip_prefix(&prefix))
            .flat_map(|values| values.trim_end_matches(char::is_alphabetic).split('+'))
            .map(|value| value.parse::<f64>().unwrap())
            .sum()
    }

    #[test]
    fn test_noop() {
        let logger = MetricLogger::default();
        assert!(logger.is_noop());

        logger.inc_counter("requests", 1.0);
        logger.record("latency", 10.0, "ms");
        assert!(!logger.flush());

        let metrics = logger.extend_dimensions("api=Login");
        assert!(matches!(metrics, Metrics::Noop));
        metrics.inc_counter("requests", 1.0);
    }

    #[test]
    fn test_start_rejects_zero_interval() {
        let mut config = config("http://127.0.0.1:9");
        config.flush_interval = 0;
        assert!(matches!(
            MetricLogger::start(&config),
            Err(StartError::Config(_))
        ));
    }

    #[test]
    fn test_dimensions() {
        hive_test::setup();
        let logger = MetricLogger::start(&config("http://127.0.0.1:9")).unwrap();

        let MetricLogger::Real(handle) = &logger else {
            panic!("expected a running logger");
        };
        assert_eq!(handle.dimensions(), "service=GolangMonitoring,env=Test,");

        let Metrics::Real(extended) = logger.extend_dimensions("api=Login,location=Dublin") else {
            panic!("expected a running handle");
        };
        assert_eq!(
            extended.dimensions(),
            "service=GolangMonitoring,env=Test,api=Login,location=Dublin,"
        );
    }

    #[test]
    fn test_invalid_values_ignored() {
        hive_test::setup();
        let ingest = MockIngest::start();
        let mut config = config(&ingest.url());
        // An interval longer than the time since the epoch keeps scheduled flushes from firing.
        config.flush_interval = hive_common::UnixTimestamp::now().as_secs() + 3600;
        let logger = MetricLogger::start(&config).unwrap();

        logger.inc_counter("requests", -1.0);
        logger.record("latency", f64::NAN, "ms");
        logger.record("latency", f64::INFINITY, "ms");
        logger.record("latency", 5.0, "ms");
        assert!(logger.flush());

        let lines = ingest.lines();
        assert!(!lines.iter().any(|line| line.contains("m.requests")));
        assert_eq!(sum(&lines, "latency"), 5.0);
    }

    #[test]
    fn test_end_to_end() {
        hive_test::setup();
        let ingest = MockIngest::start();
        let mut config = config(&ingest.url());
        config.flush_interval = 2;
        config.poll_interval_ms = 500;

        let logger = MetricLogger::start(&config).unwrap();
        let metrics = logger.extend_dimensions("api=PublishMetrics,location=Dublin");

        for _ in 0..10 {
            logger.inc_counter("MyCounterRoot", 1.0);
            logger.record("MyTimerRoot", 100.0, "ms");
            metrics.inc_counter("MyCounter", 2.0);
            metrics.record("MyTimer", 200.0, MetricUnit::MilliSecond);
            thread::sleep(Duration::from_millis(500));
        }

        thread::sleep(Duration::from_secs(3));
        let scheduled = ingest.requests().len();
        assert!(scheduled >= 2, "only {scheduled} scheduled flushes");
        assert!(logger.flush());

        let lines = ingest.lines();
        assert_eq!(sum(&lines, "MyCounterRoot"), 10.0);
        assert_eq!(sum(&lines, "MyTimerRoot"), 1000.0);
        assert_eq!(sum(&lines, "MyCounter"), 20.0);
        assert_eq!(sum(&lines, "MyTimer"), 2000.0);

        for request in ingest.requests() {
            assert!(request.verify(&"SECRET_KEY".parse().unwrap()));
            for line in request.lines() {
                assert!(line.contains("d.env=Test,"), "{line}");
                assert!(line.contains("d.service=GolangMonitoring"), "{line}");
            }
        }
    }
}
