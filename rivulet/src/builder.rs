//! High-level builder API for following a feed

use crate::{
    BufferConfig, BufferUpdate, DecoderKind, ServerSentDataSource, SharedStreamingBuffer,
    SnapshotSink, StreamingBuffer, SubscriptionStats, TransportConfig, UpdateMode,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

/// High-level builder for a buffer fed by a server-sent events endpoint
///
/// # Example
///
/// ```rust,no_run
/// use rivulet::prelude::*;
///
/// # fn main() -> Result<()> {
/// let subscription = SubscriptionBuilder::new()
///     .url("http://localhost:5050/data")
///     .capacity(100)
///     .mode(UpdateMode::Append)
///     .fields(["x", "y"])
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SubscriptionBuilder {
    url: Option<String>,
    transport: TransportConfig,
    buffer: BufferConfig,
}

impl Default for SubscriptionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionBuilder {
    /// Create a new builder: unbounded append buffer, `[[x, y], ...]` payloads
    pub fn new() -> Self {
        Self {
            url: None,
            transport: TransportConfig::new(""),
            buffer: BufferConfig::default(),
        }
    }

    /// Set the event stream URL (required)
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Maximum retained records (default: unbounded)
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.buffer.capacity = Some(capacity);
        self
    }

    /// Set the update mode (default: append)
    pub fn mode(mut self, mode: UpdateMode) -> Self {
        self.buffer.mode = mode;
        self
    }

    /// Field names of every record (default: x, y)
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transport = self.transport.with_fields(fields);
        self
    }

    /// Payload layout (default: tuples)
    pub fn decoder(mut self, decoder: DecoderKind) -> Self {
        self.transport = self.transport.with_decoder(decoder);
        self
    }

    /// Only decode events with this `event:` name
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.transport = self.transport.with_event(event);
        self
    }

    /// Reconnect after the server drops the stream (default: true)
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.transport = self.transport.with_reconnect(enabled);
        self
    }

    /// Give up after this many consecutive failed attempts (default: never)
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.transport = self.transport.with_max_retries(retries);
        self
    }

    /// Reconnect delays in milliseconds
    pub fn backoff(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.transport = self.transport.with_backoff(initial_ms, max_ms);
        self
    }

    /// Set buffer settings from configuration, e.g. a `[buffer]` table
    ///
    /// Fields named here take precedence over [`fields`](Self::fields).
    pub fn buffer_config(mut self, config: BufferConfig) -> Self {
        if let Some(fields) = config.fields.clone() {
            self.transport = self.transport.with_fields(fields);
        }
        self.buffer = config;
        self
    }

    /// Build the subscription
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the URL is not set
    /// - capacity is zero or the field list is invalid
    /// - the HTTP client cannot be created
    pub fn build(self) -> Result<Subscription> {
        let url = self
            .url
            .context("Event stream URL is required. Call .url(url)")?;

        let mut transport = self.transport;
        transport.url = url;

        let schema = transport
            .schema()
            .context("Invalid field list")?;
        let buffer = StreamingBuffer::from_config(&self.buffer)
            .context("Invalid buffer configuration")?
            .with_schema(schema);

        let source = ServerSentDataSource::new(transport)
            .context("Failed to create event stream client")?;

        Ok(Subscription { source, buffer })
    }
}

/// A feed wired to an empty buffer, ready to run
#[derive(Debug)]
pub struct Subscription {
    source: ServerSentDataSource,
    buffer: StreamingBuffer,
}

impl Subscription {
    pub fn source(&self) -> &ServerSentDataSource {
        &self.source
    }

    pub fn buffer(&self) -> &StreamingBuffer {
        &self.buffer
    }

    /// Follow the feed on a background task
    ///
    /// Read the buffer from anywhere through the returned handle. The
    /// receiver reports applied and rejected batches and ends with `Closed`.
    /// Updates that find the channel full are dropped rather than pausing the
    /// feed, and dropping the receiver does not stop it.
    pub fn spawn(self) -> (Arc<SharedStreamingBuffer>, mpsc::Receiver<BufferUpdate>) {
        let buffer = Arc::new(SharedStreamingBuffer::new(self.buffer));
        let updates = rivulet_source::spawn_subscription(self.source.subscribe(), Arc::clone(&buffer));
        (buffer, updates)
    }

    /// Follow the feed on the current task, rendering each new view
    ///
    /// Returns the final buffer along with the counters once the feed ends.
    pub async fn run(self, sink: &dyn SnapshotSink) -> (StreamingBuffer, SubscriptionStats) {
        let Subscription { source, mut buffer } = self;
        let stats = rivulet_source::drive(source.subscribe(), &mut buffer, sink).await;
        (buffer, stats)
    }
}
