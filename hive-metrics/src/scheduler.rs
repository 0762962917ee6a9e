use std::time::Duration;

/// State of the [`FlushScheduler`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlushState {
    /// Waiting for the next flush window to open.
    Armed,
    /// A flush has been triggered in the current window.
    Fired,
}

/// Decides when accumulated metrics are flushed, based on wall-clock time.
///
/// Time is divided into windows of the flush interval. The first half of every window (at least
/// one millisecond) is the flush window. The first poll that observes the flush window fires
/// exactly once; the scheduler re-arms on the first poll that falls outside of it.
///
/// Because windows are aligned to the Unix epoch rather than to the start of the process, all
/// processes with the same interval flush at roughly the same time. A poll interval of at most
/// half the flush interval is required to observe every window.
#[derive(Clone, Debug)]
pub struct FlushScheduler {
    interval_ms: u64,
    state: FlushState,
    last_flush_ms: u64,
}

impl FlushScheduler {
    /// Creates an armed scheduler at the given time in milliseconds since the Unix epoch.
    ///
    /// Intervals below one millisecond are raised to one millisecond.
    pub fn new(interval: Duration, now_ms: u64) -> Self {
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);

        Self {
            interval_ms: interval_ms.max(1),
            state: FlushState::Armed,
            last_flush_ms: now_ms,
        }
    }

    /// Returns the flush interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Returns the current state.
    pub fn state(&self) -> FlushState {
        self.state
    }

    /// Returns the time of the last flush, or the creation time if no flush has fired.
    pub fn last_flush_ms(&self) -> u64 {
        self.last_flush_ms
    }

    /// Returns `true` if `now_ms` lies in the first half of its interval.
    fn in_window(&self, now_ms: u64) -> bool {
        let window = (self.interval_ms / 2).max(1);
        now_ms % self.interval_ms < window
    }

    /// Evaluates the scheduler at the given time.
    ///
    /// Returns `true` if a flush must be performed now.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.in_window(now_ms) {
            self.state = FlushState::Armed;
            return false;
        }

        if self.state == FlushState::Armed && now_ms > self.last_flush_ms {
            self.state = FlushState::Fired;
            self.last_flush_ms = now_ms;
            return true;
        }

        false
    }
}
