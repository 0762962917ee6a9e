use crossbeam_channel::{Receiver, Sender};
use hive_metrics::MetricEvent;

/// A message consumed by the aggregation service.
#[derive(Debug)]
pub enum Message {
    /// A metric event to merge into the accumulator.
    Event(MetricEvent),
    /// Flush immediately and blocking, then acknowledge on the given channel.
    Flush(Sender<()>),
}

/// The producer side of the bounded queue feeding the aggregation service.
///
/// Publishing blocks while the queue is full. Once the service has stopped, messages are
/// discarded.
#[derive(Clone, Debug)]
pub struct EventQueue {
    tx: Sender<Message>,
}

impl EventQueue {
    /// Creates a queue with the given capacity, returning the consumer side along with it.
    pub fn bounded(capacity: usize) -> (Self, Receiver<Message>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }

    /// Publishes an event, blocking while the queue is full.
    pub fn publish(&self, event: MetricEvent) {
        if self.tx.send(Message::Event(event)).is_err() {
            hive_log::debug!("aggregation service stopped, dropping metric");
        }
    }

    /// Requests a flush and blocks until it has completed.
    ///
    /// Returns `false` if the aggregation service is no longer running.
    pub fn flush(&self) -> bool {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);

        if self.tx.send(Message::Flush(ack_tx)).is_err() {
            hive_log::debug!("aggregation service stopped, skipping flush");
            return false;
        }

        ack_rx.recv().is_ok()
    }
}
