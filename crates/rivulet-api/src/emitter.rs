use rivulet_buffer::Batch;
use rivulet_source::EventBatcher;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::error::ApiResult;
use crate::signal;
use crate::state::{AppState, FeedEvent};

/// Start the background task that samples the signal and feeds `/data`
pub fn spawn(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(run(state))
}

/// Sample on one clock, flush on another
///
/// Every sample tick appends one point to the current window. Every flush
/// tick turns the window into a single event. A sample due at the same
/// instant as a flush lands in the window being flushed, so equal intervals
/// give exactly one point per event. Runs until the task is
/// aborted; there is no natural end to the feed.
pub async fn run(state: Arc<AppState>) {
    let config = &state.config.emitter;
    let mut sampler = interval(Duration::from_millis(config.sample_interval_ms));
    sampler.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut batcher = EventBatcher::<[f64; 2]>::new(config.flush_interval_ms);
    let mut next_id: u64 = 1;

    tracing::info!(
        sample_interval_ms = config.sample_interval_ms,
        flush_interval_ms = batcher.window_ms(),
        "emitter started"
    );

    loop {
        // Sample before flushing when both clocks fire together
        let flush = tokio::select! {
            biased;
            _ = sampler.tick() => false,
            _ = batcher.ticker().tick() => true,
        };

        if !flush {
            batcher.push(signal::sample(signal::now_seconds(), signal::noise()));
            continue;
        }
        if batcher.is_empty() {
            continue;
        }

        match publish(&state, next_id, batcher.take()) {
            Ok(receivers) => {
                tracing::trace!(id = next_id, receivers, "event published");
                next_id += 1;
            }
            Err(e) => tracing::error!(error = %e, "failed to publish batch"),
        }
    }
}

/// Mirror the rows, then hand them to every connected client
///
/// The mirror is updated first so `/snapshot` is never behind an event a
/// client has already seen. Returns the number of clients reached.
pub fn publish(state: &AppState, id: u64, rows: Vec<[f64; 2]>) -> ApiResult<usize> {
    let batch = Batch::from_rows(&state.schema, rows)?;
    let snapshot = state.mirror.apply(batch.clone())?;

    tracing::debug!(
        id,
        points = batch.len(),
        buffered = snapshot.len(),
        version = snapshot.version(),
        "batch emitted"
    );

    // no receivers is not an error, the next client picks up from here
    Ok(state.feed.send(FeedEvent { id, batch }).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn state(capacity: usize) -> AppState {
        let mut config: Config = toml::from_str(include_str!("../config/default.toml")).unwrap();
        config.buffer.capacity = Some(capacity);
        AppState::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_publish_mirrors_before_broadcast() {
        let state = state(3);
        let mut rx = state.feed.subscribe();

        let reached = publish(&state, 1, vec![[1.0, 1.0], [2.0, 2.0]]).unwrap();
        assert_eq!(reached, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.id, 1);
        assert_eq!(event.batch.len(), 2);
        assert_eq!(state.mirror.snapshot().column("x"), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_publish_without_clients() {
        let state = state(2);
        assert_eq!(publish(&state, 1, vec![[1.0, 1.0]]).unwrap(), 0);
        assert_eq!(publish(&state, 2, vec![[2.0, 2.0], [3.0, 3.0]]).unwrap(), 0);
        assert_eq!(state.mirror.snapshot().column("y"), Some(vec![2.0, 3.0]));
    }

    #[tokio::test]
    async fn test_run_emits_windows() {
        let mut config: Config = toml::from_str(include_str!("../config/default.toml")).unwrap();
        config.emitter.sample_interval_ms = 5;
        config.emitter.flush_interval_ms = 20;
        let state = Arc::new(AppState::new(config).unwrap());
        let mut rx = state.feed.subscribe();

        let handle = spawn(Arc::clone(&state));
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        handle.abort();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(!first.batch.is_empty());
        assert!(state.mirror.snapshot().version() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coinciding_ticks_sample_first() {
        let mut config: Config = toml::from_str(include_str!("../config/default.toml")).unwrap();
        config.emitter.sample_interval_ms = 20;
        config.emitter.flush_interval_ms = 20;
        let state = Arc::new(AppState::new(config).unwrap());
        let mut rx = state.feed.subscribe();

        let handle = spawn(Arc::clone(&state));
        let mut sizes = Vec::new();
        for expected_id in 1..=20 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.id, expected_id);
            sizes.push(event.batch.len());
        }
        handle.abort();

        assert_eq!(sizes, vec![1; 20]);
    }
}
