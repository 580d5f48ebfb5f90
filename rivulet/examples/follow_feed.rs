//! Follow a live feed and print the buffer as it changes
//!
//! # Usage
//!
//! ```bash
//! # Start the emitter in another terminal
//! cargo run -p rivulet-api
//!
//! # Follow it
//! FEED_URL=http://localhost:5050/data cargo run --example follow_feed
//! ```

use async_trait::async_trait;
use rivulet::prelude::*;

/// Prints the newest point and the spread of the buffered x values
struct ConsoleSink;

#[async_trait]
impl SnapshotSink for ConsoleSink {
    async fn render(&self, snapshot: &Snapshot) -> Result<()> {
        let Some(latest) = snapshot.last() else {
            return Ok(());
        };
        let xs = snapshot.column("x").unwrap_or_default();
        let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        println!(
            "v{:<5} {:>3} points  latest {:?}  x in [{:.2}, {:.2}]",
            snapshot.version(),
            snapshot.len(),
            latest.values(),
            min,
            max
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let url = std::env::var("FEED_URL").unwrap_or_else(|_| "http://localhost:5050/data".to_string());

    let subscription = SubscriptionBuilder::new()
        .url(url)
        .capacity(100)
        .mode(UpdateMode::Append)
        .max_retries(5)
        .build()?;

    let (_, stats) = subscription.run(&ConsoleSink).await;
    println!(
        "feed ended: {} applied, {} rejected, {} transport errors",
        stats.applied, stats.rejected, stats.transport_errors
    );

    Ok(())
}
