use std::sync::{Mutex, PoisonError, RwLock};

use crate::buffer::{Snapshot, StreamingBuffer};
use crate::config::{Capacity, UpdateMode};
use crate::error::Result;
use crate::record::Batch;

/// [`StreamingBuffer`] that a producer task and any number of readers can share
///
/// Writers are serialized by a mutex. After each apply the new view is
/// published by swapping the snapshot behind a `RwLock`, so a reader only ever
/// sees the state before or after a batch.
#[derive(Debug)]
pub struct SharedStreamingBuffer {
    writer: Mutex<StreamingBuffer>,
    view: RwLock<Snapshot>,
}

impl SharedStreamingBuffer {
    pub fn new(buffer: StreamingBuffer) -> Self {
        let view = buffer.snapshot();
        Self {
            writer: Mutex::new(buffer),
            view: RwLock::new(view),
        }
    }

    pub fn apply(&self, batch: Batch) -> Result<Snapshot> {
        let mut buffer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = buffer.apply(batch)?;

        // Publish while still holding the writer lock so views appear in apply order
        *self.view.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();

        Ok(snapshot)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn capacity(&self) -> Capacity {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity()
    }

    pub fn mode(&self) -> UpdateMode {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mode()
    }
}

impl From<StreamingBuffer> for SharedStreamingBuffer {
    fn from(buffer: StreamingBuffer) -> Self {
        Self::new(buffer)
    }
}
