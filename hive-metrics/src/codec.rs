use std::collections::BTreeMap;
use std::fmt::Write;

use crate::accumulator::Accumulator;
use crate::dimensions::DimensionSet;
use crate::event::MetricKey;

/// A serialized batch of metrics, ready to be signed and sent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Payload {
    /// The encoded lines, one per dimension bucket.
    pub body: String,
    /// The number of metric entries written across all lines.
    pub metric_count: usize,
}

impl Payload {
    /// Returns the body as bytes. Signatures are computed over these bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.body.as_bytes()
    }

    /// Returns `true` if the payload has no lines.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// A detached accumulator with canonical dimensions.
///
/// Buckets whose dimensions canonicalize to the same string are merged: counters are summed, all
/// other metrics are concatenated. Buckets without a single valid dimension are dropped.
///
/// Buckets and metrics are kept sorted, so encoding the same snapshot always yields the same
/// payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedMetrics {
    buckets: BTreeMap<String, BTreeMap<MetricKey, Vec<f64>>>,
}

impl NormalizedMetrics {
    /// Normalizes a detached accumulator.
    pub fn from_accumulator(accumulator: Accumulator) -> Self {
        Self::from_buckets(accumulator)
    }

    /// Normalizes buckets of metrics keyed by their raw dimension string.
    pub fn from_buckets<B, M>(buckets: B) -> Self
    where
        B: IntoIterator<Item = (String, M)>,
        M: IntoIterator<Item = (MetricKey, Vec<f64>)>,
    {
        let mut normalized = Self::default();

        for (raw, metrics) in buckets {
            let dimensions = DimensionSet::canonicalize(&raw);
            if dimensions.is_empty() {
                hive_log::trace!(dimensions = %raw, "dropping bucket without valid dimensions");
                continue;
            }

            let target = normalized.buckets.entry(dimensions).or_default();
            for (key, values) in metrics {
                let key = key.trimmed();
                if key.name().trim().is_empty() {
                    continue;
                }

                let is_counter = key.is_counter();
                let merged = target.entry(key).or_default();

                match values.first().copied() {
                    Some(sum) if is_counter => match merged.first_mut() {
                        Some(total) => *total += sum,
                        None => merged.push(sum),
                    },
                    _ => merged.extend(values),
                }
            }
        }

        normalized
    }

    /// Returns the number of dimension buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if there are no buckets.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Returns the values of a metric under a canonical dimension string.
    pub fn get(&self, dimensions: &str, key: &str) -> Option<&[f64]> {
        self.buckets
            .get(dimensions)
            .and_then(|bucket| bucket.get(key))
            .map(Vec::as_slice)
    }

    /// Encodes all buckets into the line format.
    ///
    /// Every bucket yields one line: the canonical dimensions followed by one
    /// `,m.<name>=<v1>+...+<vn><unit>` entry per metric. Values are written with six decimal
    /// places. A metric without values is written as `,m.<name>=`.
    pub fn encode(&self) -> Payload {
        let mut payload = Payload::default();

        for (dimensions, metrics) in &self.buckets {
            payload.body.push_str(dimensions);

            for (key, values) in metrics {
                let (name, unit) = key.wire_parts();
                payload.body.push_str(",m.");
                payload.body.push_str(name);
                payload.body.push('=');

                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        payload.body.push('+');
                    }
                    write!(payload.body, "{value:.6}").ok();
                }

                if !values.is_empty() {
                    payload.body.push_str(unit);
                }

                payload.metric_count += 1;
            }

            payload.body.push('\n');
        }

        payload
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::event::MetricEvent;

    type RawBuckets = Vec<(String, Vec<(MetricKey, Vec<f64>)>)>;

    /// Two locations, each reported under several spellings of the same dimensions.
    fn spelled_buckets(index: usize, buckets: &mut RawBuckets) {
        let spelling = |template: &str| template.replace("{index}", &index.to_string());
        let metric = |key: &str, values: &[f64]| (MetricKey::from_raw(key), values.to_vec());

        buckets.push((
            spelling("   LoCation  = Dublin{index} , Service = GoGo  , aPi = PublishMetric "),
            vec![],
        ));
        buckets.push((
            spelling("   Location  = Dublin{index} , Service = GoGo  , api = PublishMetric "),
            vec![metric("  Latency|ms ", &[250.0, 800.0, 9.0])],
        ));
        buckets.push((
            spelling("   LoCation  = Dublin{index} , aPi = PublishMetric, Service = GoGo  ,  "),
            vec![metric("  NumOfSuccess|c ", &[20.0])],
        ));
        buckets.push((
            spelling("   Service = GoGo  ,LocaTIon  = Dublin{index} ,  api = PublishMetric "),
            vec![
                metric("   Latency|ms ", &[700.0, 1000.0]),
                metric("    Latency|ms ", &[]),
            ],
        ));
        buckets.push((
            spelling("   SERvice = GoGo ,, LoCation  = Dublin{index} , aPi = PublishMetric,   ,  "),
            vec![
                metric("  NumOfSuccess|c ", &[]),
                metric("   NumOfSuccess|c ", &[30.0]),
            ],
        ));
    }

    #[test]
    fn test_normalize_merges_spellings() {
        let mut buckets = RawBuckets::new();
        spelled_buckets(0, &mut buckets);
        spelled_buckets(1, &mut buckets);

        let normalized = NormalizedMetrics::from_buckets(buckets);
        assert_eq!(normalized.len(), 2);

        for location in ["Dublin0", "Dublin1"] {
            let dimensions = format!("d.api=PublishMetric,d.location={location},d.service=GoGo");
            assert_eq!(
                normalized.get(&dimensions, "NumOfSuccess|c"),
                Some(&[50.0][..])
            );

            let mut latency = normalized
                .get(&dimensions, "Latency|ms")
                .unwrap()
                .to_vec();
            latency.sort_by(f64::total_cmp);
            assert_eq!(latency, vec![9.0, 250.0, 700.0, 800.0, 1000.0]);
        }

        let payload = normalized.encode();
        assert_eq!(payload.metric_count, 4);

        let lines: Vec<_> = payload.body.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "");
        assert!(lines[0].contains("Dublin0"));
        assert!(lines[1].contains("Dublin1"));

        for line in &lines[..2] {
            let parts: Vec<_> = line.split(',').collect();
            assert_eq!(parts.len(), 5);
            assert_eq!(parts[0], "d.api=PublishMetric");
            assert!(parts[1].starts_with("d.location=Dublin"));
            assert_eq!(parts[2], "d.service=GoGo");
            assert!(parts[3].starts_with("m.Latency="));
            assert!(parts[3].ends_with("ms"));
            assert_eq!(parts[3].matches('+').count(), 4);
            assert_eq!(parts[4], "m.NumOfSuccess=50.000000");
        }
    }

    #[test]
    fn test_encode_snapshot() {
        let mut accumulator = Accumulator::new();
        let dims = "service=GoGo,env=Test,api=PublishMetric,location=Dublin,";
        accumulator.insert(MetricEvent::new(dims, "NumOfSuccess", 20.0, "c"));
        accumulator.insert(MetricEvent::new(dims, "Latency", 250.0, "ms"));
        accumulator.insert(MetricEvent::new(dims, "Latency", 9.5, "ms"));
        accumulator.insert(MetricEvent::new(dims, "Ratio", 0.25, ""));
        accumulator.insert(MetricEvent::new("service=GoGo,env=Test,", "Uptime", 3.0, "h"));

        let payload = NormalizedMetrics::from_accumulator(accumulator).encode();
        assert_eq!(payload.metric_count, 4);
        insta::assert_snapshot!(payload.body.trim_end(), @r"
        d.api=PublishMetric,d.env=Test,d.location=Dublin,d.service=GoGo,m.Latency=250.000000+9.500000ms,m.NumOfSuccess=20.000000,m.Ratio=0.250000
        d.env=Test,d.service=GoGo,m.Uptime=3.000000h
        ");
    }

    #[test]
    fn test_sample_count_preserved() {
        let mut accumulator = Accumulator::new();
        for value in 0..7 {
            accumulator.insert(MetricEvent::new("service=GoGo,", "Latency", value as f64, "ms"));
        }

        let payload = NormalizedMetrics::from_accumulator(accumulator).encode();
        let (_, values) = payload.body.trim_end().split_once("m.Latency=").unwrap();
        assert_eq!(values.split('+').count(), 7);
        assert!(values.ends_with("6.000000ms"));
    }

    #[test]
    fn test_drops_buckets_without_dimensions() {
        let mut accumulator = Accumulator::new();
        accumulator.insert(MetricEvent::new("", "requests", 1.0, "c"));
        accumulator.insert(MetricEvent::new("=,novalue=", "requests", 1.0, "c"));

        let normalized = NormalizedMetrics::from_accumulator(accumulator);
        assert!(normalized.is_empty());
        assert_eq!(normalized.encode(), Payload::default());
    }

    #[test]
    fn test_drops_empty_metric_names() {
        let mut accumulator = Accumulator::new();
        accumulator.insert(MetricEvent::new("service=GoGo,", "   ", 1.0, "c"));
        accumulator.insert(MetricEvent::new("service=GoGo,", "", 5.0, "ms"));
        accumulator.insert(MetricEvent::new("service=GoGo,", "requests", 2.0, "c"));

        let payload = NormalizedMetrics::from_accumulator(accumulator).encode();
        assert_eq!(payload.metric_count, 1);
        assert_eq!(payload.body, "d.service=GoGo,m.requests=2.000000\n");
    }

    #[test]
    fn test_empty_values_and_buckets() {
        let buckets: RawBuckets = vec![
            ("service=GoGo".to_owned(), vec![]),
            (
                "service=Other".to_owned(),
                vec![
                    (MetricKey::from_raw("requests|c"), vec![]),
                    (MetricKey::from_raw("latency|ms"), vec![]),
                    (MetricKey::from_raw("   "), vec![1.0]),
                ],
            ),
        ];

        let payload = NormalizedMetrics::from_buckets(buckets).encode();
        assert_eq!(payload.metric_count, 2);
        assert_eq!(
            payload.body,
            "d.service=GoGo\nd.service=Other,m.latency=,m.requests=\n"
        );
    }
}
