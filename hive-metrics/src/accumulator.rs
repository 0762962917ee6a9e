use std::fmt;
use std::mem;

use hashbrown::HashMap;

use crate::event::{MetricEvent, MetricKey};

/// Metrics of a single dimension bucket.
pub type MetricValues = HashMap<MetricKey, Vec<f64>>;

/// In-memory aggregate of all events received during one flush window.
///
/// Events are grouped by their raw dimension string and their [`MetricKey`]. A counter keeps a
/// single running sum, every other metric keeps all of its samples in arrival order.
///
/// The accumulator is owned by a single consumer. At every flush it is detached with
/// [`take`](Self::take) and the detached generation is never written to again.
#[derive(Clone, Default)]
pub struct Accumulator {
    buckets: HashMap<String, MetricValues>,
}

impl Accumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges an event into the accumulator.
    ///
    /// Returns `false` and leaves the accumulator untouched if the event's value is invalid.
    pub fn insert(&mut self, event: MetricEvent) -> bool {
        if !event.is_valid() {
            hive_log::trace!(
                metric = %event.name,
                value = event.value,
                "dropping invalid metric value"
            );
            return false;
        }

        let key = event.key();
        let bucket = self.buckets.entry(event.dimensions).or_default();

        match bucket.get_mut(&key) {
            Some(values) if key.is_counter() => match values.first_mut() {
                Some(sum) => *sum += event.value,
                None => values.push(event.value),
            },
            Some(values) => values.push(event.value),
            None => {
                bucket.insert(key, vec![event.value]);
            }
        }

        true
    }

    /// Detaches the current contents, leaving an empty accumulator behind.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Returns the number of dimension buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no event has been merged.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Returns the number of distinct metrics across all buckets.
    pub fn metric_count(&self) -> usize {
        self.buckets.values().map(HashMap::len).sum()
    }

    /// Returns the values recorded for a metric key under a raw dimension string.
    pub fn get(&self, dimensions: &str, key: &str) -> Option<&[f64]> {
        self.buckets
            .get(dimensions)
            .and_then(|bucket| bucket.get(key))
            .map(Vec::as_slice)
    }

    /// Iterates over all buckets by raw dimension string.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValues)> {
        self.buckets
            .iter()
            .map(|(dimensions, bucket)| (dimensions.as_str(), bucket))
    }
}

impl IntoIterator for Accumulator {
    type Item = (String, MetricValues);
    type IntoIter = hashbrown::hash_map::IntoIter<String, MetricValues>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.into_iter()
    }
}

impl fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accumulator")
            .field("buckets", &self.len())
            .field("metrics", &self.metric_count())
            .finish()
    }
}
