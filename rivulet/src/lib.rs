//! # Rivulet - streaming buffers for live plots
//!
//! Rivulet keeps the most recent points of a push-based data feed in a
//! bounded buffer and hands consistent snapshots to whatever renders them:
//! - **Two update disciplines**: `append` (ring buffer, oldest evicted first)
//!   and `replace` (each batch is the new contents)
//! - **Schema checked**: every record of a batch must carry the buffer's
//!   fields, otherwise the batch is rejected and nothing changes
//! - **Server-sent events**: a reconnecting SSE client with backoff and
//!   `Last-Event-ID` resume
//! - **Cheap snapshots**: reference counted, safe to read from other threads
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rivulet::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (buffer, mut updates) = SubscriptionBuilder::new()
//!         .url("http://localhost:5050/data")
//!         .capacity(100)
//!         .mode(UpdateMode::Append)
//!         .build()?
//!         .spawn();
//!
//!     while let Some(update) = updates.recv().await {
//!         println!("{:?} -> {} points", update, buffer.snapshot().len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Without the network
//!
//! ```rust
//! use rivulet::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let schema = Schema::new(["x", "y"])?;
//! let mut buffer = StreamingBuffer::new(Capacity::bounded(3)?, UpdateMode::Append);
//!
//! buffer.apply(Batch::from_rows(&schema, [[1.0, 1.0]])?)?;
//! let view = buffer.apply(Batch::from_rows(&schema, [[2.0, 2.0], [3.0, 3.0], [4.0, 4.0]])?)?;
//!
//! assert_eq!(view.column("x"), Some(vec![2.0, 3.0, 4.0]));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **rivulet-buffer**: records, schemas, the buffer itself and payload decoders
//! - **rivulet-source**: SSE framing, the reconnecting client and subscription tasks
//!
//! A runnable emitter lives in the `rivulet-api` crate of the repository.

// Re-export all public APIs
pub use rivulet_buffer as buffer;
pub use rivulet_source as source;

// Re-export commonly used types
pub use rivulet_buffer::{
    Batch, BufferConfig, BufferError, Capacity, DecoderKind, Record, Schema,
    SharedStreamingBuffer, Snapshot, StreamingBuffer, UpdateMode,
};
pub use rivulet_source::{
    BufferUpdate, ServerSentDataSource, SnapshotSink, SourceError, SourceEvent,
    SubscriptionStats, TransportConfig,
};

/// High-level builder for wiring a feed to a buffer
pub mod builder;

/// Convenient prelude with commonly used types
pub mod prelude {
    pub use crate::builder::{Subscription, SubscriptionBuilder};
    pub use crate::buffer::{
        Batch, BufferConfig, Capacity, DecoderKind, Record, Schema, Snapshot, StreamingBuffer,
        UpdateMode,
    };
    pub use crate::source::{BufferUpdate, SnapshotSink, TransportConfig};
    pub use anyhow::Result;
}
