//! Bounded streaming buffer for push-based data sources.
//!
//! A [`StreamingBuffer`] keeps the most recent records of a stream under one
//! of two update disciplines ([`UpdateMode::Append`] or
//! [`UpdateMode::Replace`]) and exposes an immutable [`Snapshot`] to
//! consumers. [`SharedStreamingBuffer`] adds safe concurrent reads, and the
//! [`decode`] module turns wire payloads into schema-checked [`Batch`]es.

pub mod buffer;
pub mod config;
pub mod decode;
pub mod error;
pub mod record;
pub mod shared;

pub use buffer::{Snapshot, StreamingBuffer};
pub use config::{BufferConfig, Capacity, UpdateMode};
pub use decode::{BatchDecoder, ColumnDecoder, DecoderKind, ObjectDecoder, TupleDecoder};
pub use error::{BufferError, DecodeError, Result};
pub use record::{Batch, Record, Schema};
pub use shared::SharedStreamingBuffer;
