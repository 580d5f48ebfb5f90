use tokio::time::{interval, Duration, Interval, MissedTickBehavior};

/// Time-windowed accumulator
/// Samples are pushed as they are produced and taken as one batch per window;
/// drive it with `tokio::select!` on [`EventBatcher::ticker`]
pub struct EventBatcher<T> {
    batch: Vec<T>,
    ticker: Interval,
    window_ms: u64,
    total_batches: u64,
    total_events: u64,
}

impl<T> EventBatcher<T> {
    /// Create a new batcher with specified time window (milliseconds, at least 1)
    pub fn new(window_ms: u64) -> Self {
        let window_ms = window_ms.max(1);
        let mut ticker = interval(Duration::from_millis(window_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            batch: Vec::new(),
            ticker,
            window_ms,
            total_batches: 0,
            total_events: 0,
        }
    }

    /// Add an event to the current batch
    pub fn push(&mut self, event: T) {
        self.batch.push(event);
        self.total_events += 1;
    }

    /// Take the current batch, leaving an empty one
    pub fn take(&mut self) -> Vec<T> {
        if !self.batch.is_empty() {
            self.total_batches += 1;
        }
        std::mem::take(&mut self.batch)
    }

    /// Current batch size
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Get reference to ticker for use in tokio::select!
    pub fn ticker(&mut self) -> &mut Interval {
        &mut self.ticker
    }

    /// Get window duration
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Non-empty batches taken so far
    pub fn total_batches(&self) -> u64 {
        self.total_batches
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }
}
