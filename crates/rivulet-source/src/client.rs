use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use rivulet_buffer::{BatchDecoder, Schema};
use std::sync::Arc;
use std::time::Duration;

use crate::buffer_utils::{parse_sse_stream, BatchLineParser, EventStream};
use crate::config::TransportConfig;
use crate::error::{Result, SourceError};
use crate::events::SourceEvent;

const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Client side of a server-sent events data feed
///
/// Each SSE `data` payload is decoded into one batch. [`subscribe`](Self::subscribe)
/// keeps the feed alive across dropped connections according to the
/// [`TransportConfig`] retry policy.
#[derive(Clone)]
pub struct ServerSentDataSource {
    client: reqwest::Client,
    config: Arc<TransportConfig>,
    decoder: Arc<dyn BatchDecoder>,
}

impl ServerSentDataSource {
    pub fn new(config: TransportConfig) -> Result<Self> {
        config.validate()?;
        let decoder: Arc<dyn BatchDecoder> = config.decoder.build(config.schema()?).into();

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
            decoder,
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        self.decoder.schema()
    }

    /// Open one connection and return its events
    ///
    /// The stream ends when the server closes the connection or sends the
    /// done marker. No reconnection happens here.
    pub async fn connect(&self, last_event_id: Option<&str>) -> Result<EventStream> {
        let mut request = self
            .client
            .get(&self.config.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        if let Some(id) = last_event_id {
            request = request.header(LAST_EVENT_ID, id);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status().as_u16(),
                url: self.config.url.clone(),
            });
        }

        tracing::info!(url = %self.config.url, "event stream opened");

        let mut parser = BatchLineParser::new(Arc::clone(&self.decoder));
        if let Some(event) = &self.config.event {
            parser = parser.with_event(event.clone());
        }

        Ok(parse_sse_stream(response.bytes_stream(), parser))
    }

    /// Batches across reconnects
    ///
    /// Errors are yielded and the feed continues. Payload errors leave the
    /// connection open; transport errors trigger a reconnect after the
    /// backoff delay. The stream ends after a done marker, when reconnect is
    /// disabled and the connection closes, or once `max_retries` consecutive
    /// attempts have failed. `Retry` hints and batch-less `Id`s are consumed
    /// here; every event id seen becomes the next `Last-Event-ID`.
    pub fn subscribe(&self) -> EventStream {
        let source = self.clone();

        Box::pin(async_stream::stream! {
            let config = Arc::clone(&source.config);
            let mut failures: u32 = 0;
            let mut last_id: Option<String> = None;
            let mut retry_hint: Option<Duration> = None;

            loop {
                match source.connect(last_id.as_deref()).await {
                    Ok(mut events) => {
                        while let Some(item) = events.next().await {
                            match item {
                                Ok(SourceEvent::Retry(delay)) => retry_hint = Some(delay),
                                Ok(SourceEvent::Id(id)) => last_id = Some(id),
                                Ok(SourceEvent::Done) => {
                                    tracing::info!(url = %config.url, "event stream finished");
                                    yield Ok(SourceEvent::Done);
                                    return;
                                }
                                Ok(SourceEvent::Batch { id, batch }) => {
                                    failures = 0;
                                    if id.is_some() {
                                        last_id = id.clone();
                                    }
                                    yield Ok(SourceEvent::Batch { id, batch });
                                }
                                Err(e) => yield Err(e),
                            }
                        }
                        tracing::warn!(url = %config.url, "event stream closed by server");
                    }
                    Err(e) => {
                        tracing::warn!(url = %config.url, error = %e, "connect failed");
                        yield Err(e);
                    }
                }

                if !config.reconnect {
                    return;
                }

                failures += 1;
                if let Some(max) = config.max_retries {
                    if failures > max {
                        yield Err(SourceError::RetriesExhausted { attempts: max });
                        return;
                    }
                }

                let delay = config.backoff(failures, retry_hint);
                tracing::debug!(attempt = failures, delay_ms = delay.as_millis() as u64, "reconnecting");
                tokio::time::sleep(delay).await;
            }
        })
    }
}

impl std::fmt::Debug for ServerSentDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSentDataSource")
            .field("url", &self.config.url)
            .field("schema", self.schema())
            .finish()
    }
}
