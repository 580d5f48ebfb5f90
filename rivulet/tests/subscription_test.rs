use async_trait::async_trait;
use mockito::Server;
use rivulet::prelude::*;
use std::sync::Mutex;

const FEED: &str = "data: [[1, 1]]\n\ndata: [[2, 2], [3, 3], [4, 4]]\n\ndata: [[\"oops\", 5]]\n\ndata: [[5, 5]]\n\ndata: [DONE]\n\n";

async fn feed_server() -> (mockito::ServerGuard, mockito::Mock) {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/data")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(FEED)
        .create_async()
        .await;
    (server, mock)
}

#[tokio::test]
async fn test_spawned_subscription_appends() {
    let (server, mock) = feed_server().await;

    let (buffer, mut updates) = SubscriptionBuilder::new()
        .url(format!("{}/data", server.url()))
        .capacity(3)
        .mode(UpdateMode::Append)
        .build()
        .unwrap()
        .spawn();

    let mut last = None;
    while let Some(update) = updates.recv().await {
        last = Some(update);
    }

    assert_eq!(
        last,
        Some(BufferUpdate::Closed {
            applied: 3,
            rejected: 1
        })
    );
    let view = buffer.snapshot();
    assert_eq!(view.column("x"), Some(vec![3.0, 4.0, 5.0]));
    assert_eq!(view.version(), 3);
    mock.assert_async().await;
}

#[derive(Default)]
struct LenSink {
    lens: Mutex<Vec<usize>>,
}

#[async_trait]
impl SnapshotSink for LenSink {
    async fn render(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.lens.lock().unwrap().push(snapshot.len());
        Ok(())
    }
}

#[tokio::test]
async fn test_inline_run_replaces() {
    let (server, _mock) = feed_server().await;
    let sink = LenSink::default();

    let subscription = SubscriptionBuilder::new()
        .url(format!("{}/data", server.url()))
        .capacity(2)
        .mode(UpdateMode::Replace)
        .build()
        .unwrap();
    let (buffer, stats) = subscription.run(&sink).await;

    assert_eq!(stats.applied, 3);
    assert_eq!(stats.rejected, 1);
    assert_eq!(*sink.lens.lock().unwrap(), vec![1, 2, 1]);
    assert_eq!(buffer.snapshot().column("y"), Some(vec![5.0]));
}
