use async_trait::async_trait;
use futures::{Stream, StreamExt};
use rivulet_buffer::{Batch, SharedStreamingBuffer, Snapshot, StreamingBuffer};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{Result, SourceError};
use crate::events::{BufferUpdate, SourceEvent};

/// Consumer of buffer views, e.g. a renderer
///
/// Called once after every applied batch with the new view.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn render(&self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

/// Counters for one run of a subscription
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    pub applied: u64,
    pub rejected: u64,
    pub transport_errors: u64,
}

impl SubscriptionStats {
    fn record(&mut self, update: &BufferUpdate) {
        match update {
            BufferUpdate::Applied { .. } => self.applied += 1,
            BufferUpdate::Rejected { .. } => self.rejected += 1,
            BufferUpdate::TransportError { .. } => self.transport_errors += 1,
            BufferUpdate::Closed { .. } => {}
        }
    }
}

impl From<SourceError> for BufferUpdate {
    fn from(e: SourceError) -> Self {
        if e.is_payload_error() {
            BufferUpdate::Rejected {
                reason: e.to_string(),
            }
        } else {
            BufferUpdate::TransportError {
                message: e.to_string(),
            }
        }
    }
}

enum Step {
    Update(BufferUpdate, Option<Snapshot>),
    Skip,
    Finished,
}

fn step(
    item: Result<SourceEvent>,
    apply: impl FnOnce(Batch) -> rivulet_buffer::Result<Snapshot>,
) -> Step {
    match item {
        Ok(SourceEvent::Batch { batch, .. }) => {
            let incoming = batch.len();
            match apply(batch) {
                Ok(snapshot) => Step::Update(
                    BufferUpdate::Applied {
                        version: snapshot.version(),
                        incoming,
                        len: snapshot.len(),
                    },
                    Some(snapshot),
                ),
                Err(e) => Step::Update(SourceError::from(e).into(), None),
            }
        }
        Ok(SourceEvent::Retry(_) | SourceEvent::Id(_)) => Step::Skip,
        Ok(SourceEvent::Done) => Step::Finished,
        Err(e) => Step::Update(e.into(), None),
    }
}

/// Apply every batch of `events` to a shared buffer from a background task
///
/// Batches are applied one at a time in arrival order until the stream ends.
/// Each batch or error produces one [`BufferUpdate`] on the returned channel,
/// followed by a final `Closed`. Notifications never hold up the feed: when
/// the channel is full they are dropped, and once the receiver is gone the
/// task keeps applying without them.
pub fn spawn_subscription<S>(
    events: S,
    buffer: Arc<SharedStreamingBuffer>,
) -> mpsc::Receiver<BufferUpdate>
where
    S: Stream<Item = Result<SourceEvent>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1000);

    tokio::spawn(async move {
        let mut events = Box::pin(events);
        let mut stats = SubscriptionStats::default();
        let mut notify = Notifier::new(tx);

        while let Some(item) = events.next().await {
            let update = match step(item, |batch| buffer.apply(batch)) {
                Step::Update(update, _) => update,
                Step::Skip => continue,
                Step::Finished => break,
            };
            stats.record(&update);
            notify.send(update);
        }

        notify.send(BufferUpdate::Closed {
            applied: stats.applied,
            rejected: stats.rejected,
        });
        tracing::debug!(
            applied = stats.applied,
            rejected = stats.rejected,
            dropped = notify.dropped,
            "subscription finished"
        );
    });

    rx
}

/// Best-effort sender for subscription updates
struct Notifier {
    tx: mpsc::Sender<BufferUpdate>,
    dropped: u64,
    detached: bool,
}

impl Notifier {
    fn new(tx: mpsc::Sender<BufferUpdate>) -> Self {
        Self {
            tx,
            dropped: 0,
            detached: false,
        }
    }

    fn send(&mut self, update: BufferUpdate) {
        match self.tx.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(update)) => {
                self.dropped += 1;
                tracing::trace!(?update, "update channel full, dropping update");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                if !self.detached {
                    self.detached = true;
                    tracing::debug!("update receiver dropped, applying without notifications");
                }
                self.dropped += 1;
            }
        }
    }
}

/// Run a subscription inline, handing each new view to `sink`
///
/// Sink failures are logged and do not stop the feed.
pub async fn drive<S>(
    events: S,
    buffer: &mut StreamingBuffer,
    sink: &dyn SnapshotSink,
) -> SubscriptionStats
where
    S: Stream<Item = Result<SourceEvent>>,
{
    let mut events = Box::pin(events);
    let mut stats = SubscriptionStats::default();

    while let Some(item) = events.next().await {
        let (update, snapshot) = match step(item, |batch| buffer.apply(batch)) {
            Step::Update(update, snapshot) => (update, snapshot),
            Step::Skip => continue,
            Step::Finished => break,
        };
        stats.record(&update);

        if let Some(snapshot) = snapshot {
            if let Err(e) = sink.render(&snapshot).await {
                tracing::warn!(error = %e, version = snapshot.version(), "sink failed to render snapshot");
            }
            continue;
        }

        match update {
            BufferUpdate::Rejected { reason } => tracing::warn!(reason = %reason, "batch rejected"),
            BufferUpdate::TransportError { message } => {
                tracing::warn!(error = %message, "transport error")
            }
            _ => {}
        }
    }

    tracing::info!(
        applied = stats.applied,
        rejected = stats.rejected,
        transport_errors = stats.transport_errors,
        "subscription finished"
    );
    stats
}
