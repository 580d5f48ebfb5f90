use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::config::{BufferConfig, Capacity, UpdateMode};
use crate::error::{BufferError, Result};
use crate::record::{Batch, Record, Schema};

/// Smallest record store allocated on growth
const MIN_SEGMENT: usize = 64;

/// Write-once record slots shared by a buffer and the snapshots it hands out
///
/// The buffer only fills slots past its current end, so the `[start, end)`
/// range a snapshot was published with never changes under it.
struct Segment {
    slots: Box<[OnceLock<Record>]>,
}

impl Segment {
    fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            slots: (0..capacity).map(|_| OnceLock::new()).collect(),
        })
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn range(&self, start: usize, end: usize) -> Iter<'_> {
        Iter {
            slots: self.slots[start..end].iter(),
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Records of a [`Snapshot`] in order, oldest first
#[derive(Clone)]
pub struct Iter<'a> {
    slots: std::slice::Iter<'a, OnceLock<Record>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Record;

    fn next(&mut self) -> Option<Self::Item> {
        self.slots.next().and_then(OnceLock::get)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.slots.next_back().and_then(OnceLock::get)
    }
}

impl ExactSizeIterator for Iter<'_> {}

/// Immutable materialized view of a buffer
///
/// Taking and cloning a snapshot is O(1): it shares record storage with the
/// buffer, so consumers can hold on to one while the producer keeps applying
/// batches.
#[derive(Clone)]
pub struct Snapshot {
    schema: Option<Schema>,
    segment: Arc<Segment>,
    start: usize,
    end: usize,
    version: u64,
}

impl Snapshot {
    /// Field names in order; `None` until a schema is fixed or the first batch lands
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Number of non-empty batches applied before this view was taken
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        if index >= self.len() {
            return None;
        }
        self.segment.slots[self.start + index].get()
    }

    /// Most recent record
    pub fn last(&self) -> Option<&Record> {
        self.iter().next_back()
    }

    pub fn iter(&self) -> Iter<'_> {
        self.segment.range(self.start, self.end)
    }

    pub fn to_vec(&self) -> Vec<Record> {
        self.iter().cloned().collect()
    }

    /// Values of one field in record order (the columnar form renderers consume)
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.schema.as_ref()?.index_of(name)?;
        Some(self.iter().map(|r| r.values()[index]).collect())
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Record;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.schema == other.schema
            && self.iter().eq(other.iter())
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("schema", &self.schema)
            .field("records", &Rows(self))
            .field("version", &self.version)
            .finish()
    }
}

/// Record sequence of a snapshot, for nesting inside other output
struct Rows<'a>(&'a Snapshot);

impl fmt::Debug for Rows<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl Serialize for Rows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields: &[String] = self.schema.as_ref().map(Schema::fields).unwrap_or(&[]);
        let mut state = serializer.serialize_struct("Snapshot", 3)?;
        state.serialize_field("fields", fields)?;
        state.serialize_field("records", &Rows(self))?;
        state.serialize_field("version", &self.version)?;
        state.end()
    }
}

/// Bounded, ordered buffer of the most recent records of a stream
///
/// Each call to [`apply`](Self::apply) takes one batch and updates the
/// contents according to the [`UpdateMode`]:
///
/// - `Append`: records are pushed to the tail and the oldest ones are evicted
///   from the head once `capacity` is exceeded (FIFO ring buffer).
/// - `Replace`: the batch replaces the contents; if it is longer than
///   `capacity` only its last `capacity` records are kept.
///
/// A batch is validated completely before anything is mutated, so a rejected
/// batch leaves the buffer exactly as it was.
///
/// Records live in a write-once segment that snapshots share. New records go
/// past the current end and eviction only moves the start forward. When the
/// segment is full the live records move to a fresh one twice their size, so
/// an apply costs O(batch) amortized however long the buffer is.
///
/// ```
/// use rivulet_buffer::{Capacity, Record, StreamingBuffer, UpdateMode};
///
/// let mut buffer = StreamingBuffer::new(Capacity::bounded(2).unwrap(), UpdateMode::Append);
/// let point = |x: f64| Record::from_pairs([("x", x), ("y", x)]).unwrap();
///
/// buffer.apply(vec![point(1.0), point(2.0), point(3.0)].into()).unwrap();
/// assert_eq!(buffer.snapshot().column("x"), Some(vec![2.0, 3.0]));
/// ```
#[derive(Debug)]
pub struct StreamingBuffer {
    capacity: Capacity,
    mode: UpdateMode,
    schema: Option<Schema>,
    segment: Arc<Segment>,
    start: usize,
    end: usize,
    version: u64,
}

impl StreamingBuffer {
    pub fn new(capacity: Capacity, mode: UpdateMode) -> Self {
        Self {
            capacity,
            mode,
            schema: None,
            segment: Segment::with_capacity(0),
            start: 0,
            end: 0,
            version: 0,
        }
    }

    /// Validate raw settings and build an empty buffer
    pub fn from_config(config: &BufferConfig) -> Result<Self> {
        let buffer = Self::new(config.capacity()?, config.mode);
        Ok(match config.schema()? {
            Some(schema) => buffer.with_schema(schema),
            None => buffer,
        })
    }

    /// Fix the schema up front instead of adopting the first batch's
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Apply one batch and return the new view
    ///
    /// Empty batches are no-ops. Fails with [`BufferError::SchemaMismatch`]
    /// if any record's fields differ from the established schema.
    pub fn apply(&mut self, batch: Batch) -> Result<Snapshot> {
        if batch.is_empty() {
            tracing::trace!("empty batch ignored");
            return Ok(self.snapshot());
        }

        let Some(schema) = self.schema.clone().or_else(|| batch.schema().cloned()) else {
            return Ok(self.snapshot());
        };
        Self::validate(&batch, &schema)?;
        let incoming = batch.len();
        let previous = self.len();

        // Records that would be evicted by this same batch are never stored
        let mut records = batch.into_records();
        let skip = self.capacity.excess(incoming);
        records.drain(..skip);

        let keep = match self.mode {
            UpdateMode::Append => {
                let total = previous + records.len();
                total - self.capacity.excess(total) - records.len()
            }
            UpdateMode::Replace => 0,
        };
        self.write(keep, records);

        self.schema = Some(schema);
        self.version += 1;

        tracing::debug!(
            mode = %self.mode,
            incoming,
            evicted = previous + incoming - self.len(),
            len = self.len(),
            version = self.version,
            "batch applied"
        );

        Ok(self.snapshot())
    }

    /// Current view; no side effects
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            schema: self.schema.clone(),
            segment: Arc::clone(&self.segment),
            start: self.start,
            end: self.end,
            version: self.version,
        }
    }

    fn validate(batch: &Batch, expected: &Schema) -> Result<()> {
        if let Some(bad) = batch.iter().find(|r| r.schema() != expected) {
            tracing::warn!(
                expected = %expected,
                found = %bad.schema(),
                "batch rejected"
            );
            return Err(BufferError::SchemaMismatch {
                expected: expected.clone(),
                found: bad.schema().clone(),
            });
        }
        Ok(())
    }

    /// Keep the newest `keep` current records followed by `records`
    fn write(&mut self, keep: usize, records: Vec<Record>) {
        if self.end + records.len() <= self.segment.capacity() {
            self.start = self.end - keep;
            for record in records {
                // Slots past `end` have never been published
                let _ = self.segment.slots[self.end].set(record);
                self.end += 1;
            }
            return;
        }

        let len = keep + records.len();
        let segment = Segment::with_capacity((2 * len).max(MIN_SEGMENT));
        let survivors = self
            .segment
            .range(self.end - keep, self.end)
            .cloned()
            .chain(records);
        for (slot, record) in segment.slots.iter().zip(survivors) {
            let _ = slot.set(record);
        }

        tracing::trace!(len, capacity = segment.capacity(), "record segment grown");
        self.segment = segment;
        self.start = 0;
        self.end = len;
    }
}
