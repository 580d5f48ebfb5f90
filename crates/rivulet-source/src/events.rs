use rivulet_buffer::Batch;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the transport hands to the pipeline after framing and decoding
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// One decoded batch, with the SSE event id when the server sent one
    Batch { id: Option<String>, batch: Batch },

    /// Server-requested reconnection delay (`retry:` field)
    Retry(Duration),

    /// Event id of a frame that produced no batch (id-only, filtered out or
    /// undecodable); it still moves the resume point
    Id(String),

    /// Server signalled the end of the stream
    Done,
}

/// Progress of a subscription, reported once per incoming item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BufferUpdate {
    /// Batch applied; `len` is the buffer length afterwards
    Applied {
        version: u64,
        incoming: usize,
        len: usize,
    },

    /// Batch or payload refused; the buffer is unchanged
    Rejected { reason: String },

    /// Transport problem (connect failure, dropped connection)
    TransportError { message: String },

    /// Subscription finished
    Closed { applied: u64, rejected: u64 },
}
