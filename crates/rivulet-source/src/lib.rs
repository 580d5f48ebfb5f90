pub mod buffer_utils;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod subscription;

pub use buffer_utils::{
    parse_sse_stream, BatchLineParser, CircularLineBuffer, EventBatcher, EventStream, SseFrame,
    SseLineParser,
};
pub use client::ServerSentDataSource;
pub use config::TransportConfig;
pub use error::{Result, SourceError};
pub use events::{BufferUpdate, SourceEvent};
pub use subscription::{drive, spawn_subscription, SnapshotSink, SubscriptionStats};
