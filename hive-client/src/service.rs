use std::io;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use hive_common::now_millis;
use hive_metrics::{Accumulator, FlushScheduler};

use crate::publisher::{FlushMode, Publisher};
use crate::queue::Message;

/// The single consumer of the event queue.
///
/// The service owns the live [`Accumulator`]. It waits up to one poll interval for a message,
/// merges it, and then polls the [`FlushScheduler`]. When a flush window opens, the accumulator is
/// detached and handed to the [`Publisher`] without waiting for delivery.
///
/// Once all producers are gone, the service flushes what is left, waits for delivery and exits.
pub struct AggregatorService {
    rx: Receiver<Message>,
    accumulator: Accumulator,
    scheduler: FlushScheduler,
    publisher: Publisher,
    poll_interval: Duration,
}

impl AggregatorService {
    /// Creates a new service consuming `rx`.
    pub fn new(
        rx: Receiver<Message>,
        publisher: Publisher,
        scheduler: FlushScheduler,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rx,
            accumulator: Accumulator::new(),
            scheduler,
            publisher,
            poll_interval,
        }
    }

    /// Starts the service on a dedicated thread.
    pub fn start(self) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("hive-aggregator".to_owned())
            .spawn(move || self.run())
    }

    fn flush(&mut self, mode: FlushMode) {
        let snapshot = self.accumulator.take();
        hive_log::trace!(
            buckets = snapshot.len(),
            metrics = snapshot.metric_count(),
            ?mode,
            "flushing metrics"
        );
        self.publisher.publish(snapshot, mode);
    }

    fn run(mut self) {
        hive_log::debug!("aggregation service started");

        loop {
            match self.rx.recv_timeout(self.poll_interval) {
                Ok(Message::Event(event)) => {
                    self.accumulator.insert(event);
                }
                Ok(Message::Flush(ack)) => {
                    self.flush(FlushMode::Blocking);
                    ack.send(()).ok();
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if self.scheduler.poll(now_millis()) {
                self.flush(FlushMode::NonBlocking);
            }
        }

        if !self.accumulator.is_empty() {
            self.flush(FlushMode::Blocking);
        }
        self.publisher.wait_pending();

        hive_log::debug!("aggregation service stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use hive_config::{Config, Credentials};
    use hive_metrics::MetricEvent;
    use hive_test::MockIngest;

    use super::*;
    use crate::queue::EventQueue;

    /// Returns a scheduler that does not fire for the duration of a test.
    ///
    /// With an interval longer than the time since the epoch, the clock stays in the second half
    /// of the first interval.
    fn never_flush() -> FlushScheduler {
        let now = now_millis();
        FlushScheduler::new(Duration::from_millis(now + 3_600_000), now)
    }

    fn start(
        ingest: &MockIngest,
        scheduler: FlushScheduler,
    ) -> (EventQueue, thread::JoinHandle<()>) {
        let credentials = Credentials {
            public_key: "PUBLIC_KEY".parse().unwrap(),
            secret_key: "SECRET_KEY".parse().unwrap(),
        };
        let config = Config::new(credentials, ingest.url().parse().unwrap());

        let (queue, rx) = EventQueue::bounded(100);
        let publisher = Publisher::new(&config).unwrap();
        let service = AggregatorService::new(rx, publisher, scheduler, Duration::from_millis(20));

        (queue, service.start().unwrap())
    }

    #[test]
    fn test_flush_on_request() {
        hive_log::init_test!();
        let ingest = MockIngest::start();
        let (queue, handle) = start(&ingest, never_flush());

        queue.publish(MetricEvent::new("service=GoGo,", "requests", 1.0, "c"));
        queue.publish(MetricEvent::new("service=GoGo,", "requests", 2.0, "c"));
        assert!(queue.flush());

        let requests = ingest.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, "d.service=GoGo,m.requests=3.000000\n");

        drop(queue);
        handle.join().unwrap();
    }

    #[test]
    fn test_final_flush_on_disconnect() {
        hive_log::init_test!();
        let ingest = MockIngest::start();
        let (queue, handle) = start(&ingest, never_flush());

        queue.publish(MetricEvent::new("service=GoGo,", "latency", 12.0, "ms"));
        drop(queue);
        handle.join().unwrap();

        let requests = ingest.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, "d.service=GoGo,m.latency=12.000000ms\n");
    }

    #[test]
    fn test_no_final_flush_when_empty() {
        hive_log::init_test!();
        let ingest = MockIngest::start();
        let (queue, handle) = start(&ingest, never_flush());

        drop(queue);
        handle.join().unwrap();
        assert!(ingest.requests().is_empty());
    }

    #[test]
    fn test_no_event_flushed_twice() {
        hive_log::init_test!();
        let ingest = MockIngest::start();
        let scheduler = FlushScheduler::new(Duration::from_millis(200), now_millis());
        let (queue, handle) = start(&ingest, scheduler);

        for index in 0..40 {
            let name = format!("event{index}");
            queue.publish(MetricEvent::new("service=GoGo,", name, 1.0, "c"));
            thread::sleep(Duration::from_millis(10));
        }

        drop(queue);
        handle.join().unwrap();

        let mut seen = BTreeSet::new();
        for line in ingest.lines() {
            for part in line.split(',').filter(|part| part.starts_with("m.")) {
                assert!(seen.insert(part.to_owned()), "{part} flushed twice");
            }
        }
        assert_eq!(seen.len(), 40);
    }
}
