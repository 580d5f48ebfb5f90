use rivulet_buffer::{Batch, Schema, SharedStreamingBuffer, StreamingBuffer};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::signal;

/// One emitted SSE event, shared by every connected client
#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub id: u64,
    pub batch: Batch,
}

/// Shared application state passed to all handlers
///
/// The emitter task is the only writer: it applies each batch to `mirror`
/// and then publishes it on `feed`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub mirror: Arc<SharedStreamingBuffer>,
    pub feed: broadcast::Sender<FeedEvent>,
    pub schema: Schema,
}

impl AppState {
    pub fn new(config: Config) -> ApiResult<Self> {
        let schema = Schema::new(signal::FIELDS)?;

        if let Some(fields) = &config.buffer.fields {
            if fields.as_slice() != schema.fields() {
                return Err(ApiError::Config(format!(
                    "buffer.fields must be {} for the emitted signal",
                    schema
                )));
            }
        }

        let buffer = StreamingBuffer::from_config(&config.buffer)?.with_schema(schema.clone());
        let (feed, _) = broadcast::channel(config.emitter.channel_capacity);

        tracing::info!(
            capacity = %buffer.capacity(),
            mode = %buffer.mode(),
            "server-side mirror created"
        );

        Ok(Self {
            config: Arc::new(config),
            mirror: Arc::new(SharedStreamingBuffer::new(buffer)),
            feed,
            schema,
        })
    }

    /// Clients currently attached to `/data`
    pub fn subscribers(&self) -> usize {
        self.feed.receiver_count()
    }
}
