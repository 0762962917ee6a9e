//! Metric aggregation, flush scheduling and wire encoding for Hive.
//!
//! Producers describe measurements as [`MetricEvent`]s. A single consumer merges them into an
//! [`Accumulator`], which keeps one running sum per counter and every sample of all other
//! metrics, grouped by dimension string. A [`FlushScheduler`] decides when a flush window opens.
//! At that point the accumulator is detached with [`Accumulator::take`], normalized into
//! [`NormalizedMetrics`] and encoded into the line based wire format.
//!
//! # Wire Format
//!
//! Every dimension bucket is encoded on its own line:
//!
//! ```text
//! d.api=PublishMetric,d.service=GoGo,m.Latency=250.000000+800.000000ms,m.NumOfSuccess=50.000000
//! ```
//!
//! Dimensions are sorted by key and prefixed with `d.`, metrics follow with an `m.` prefix. Sample
//! values are joined with `+` and followed by the unit. Counters carry no unit.
//!
//! # Example
//!
//! ```
//! use hive_metrics::{Accumulator, MetricEvent, NormalizedMetrics};
//!
//! let mut accumulator = Accumulator::new();
//! accumulator.insert(MetricEvent::new("service=api,", "requests", 1.0, "c"));
//! accumulator.insert(MetricEvent::new("service=api,", "requests", 2.0, "c"));
//!
//! let payload = NormalizedMetrics::from_accumulator(accumulator.take()).encode();
//! assert_eq!(payload.body, "d.service=api,m.requests=3.000000\n");
//! assert_eq!(payload.metric_count, 1);
//! ```

#![warn(missing_docs)]

mod accumulator;
mod codec;
mod dimensions;
mod event;
mod scheduler;

pub use self::accumulator::*;
pub use self::codec::*;
pub use self::dimensions::*;
pub use self::event::*;
pub use self::scheduler::*;
