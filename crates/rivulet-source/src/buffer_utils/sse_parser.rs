use futures::{Stream, StreamExt};
use rivulet_buffer::BatchDecoder;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use super::buffering::CircularLineBuffer;
use crate::error::{Result, SourceError};
use crate::events::SourceEvent;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<SourceEvent>> + Send>>;

/// One dispatched server-sent event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

/// Accumulates field lines until a blank line dispatches the event
#[derive(Debug, Default)]
pub struct FrameAssembler {
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    retry: Option<u64>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (terminator already stripped)
    /// Returns a frame when the line completes an event
    pub fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment (also used as keep-alive)
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let frame = SseFrame {
            event: self.event.take(),
            data: self.data.join("\n"),
            id: self.id.take(),
            retry: self.retry.take(),
        };
        let had_data = !std::mem::take(&mut self.data).is_empty();

        if had_data || frame.retry.is_some() || frame.id.is_some() {
            Some(frame)
        } else {
            None
        }
    }
}

/// Strategy pattern for turning SSE frames into source events
pub trait SseLineParser: Send {
    /// Parse the data of one frame into source events
    fn parse_frame(&self, frame: &SseFrame) -> Result<Vec<SourceEvent>>;

    /// Check if this data signals end of stream
    fn is_done_marker(&self, data: &str) -> bool {
        data == "[DONE]"
    }
}

/// Decodes frame data into batches with a [`BatchDecoder`]
pub struct BatchLineParser {
    decoder: Arc<dyn BatchDecoder>,
    event: Option<String>,
}

impl BatchLineParser {
    pub fn new(decoder: Arc<dyn BatchDecoder>) -> Self {
        Self {
            decoder,
            event: None,
        }
    }

    /// Only frames with this `event:` name carry batches; others are skipped.
    /// Unnamed frames are always accepted.
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }
}

impl SseLineParser for BatchLineParser {
    fn parse_frame(&self, frame: &SseFrame) -> Result<Vec<SourceEvent>> {
        if let (Some(wanted), Some(got)) = (&self.event, &frame.event) {
            if wanted != got {
                tracing::trace!(event = %got, "frame skipped");
                return Ok(Vec::new());
            }
        }

        let batch = self.decoder.decode(&frame.data)?;
        Ok(vec![SourceEvent::Batch {
            id: frame.id.clone(),
            batch,
        }])
    }
}

/// Generic SSE stream parser using circular buffer
/// Works over any chunked byte stream (e.g. `reqwest::Response::bytes_stream`)
pub fn parse_sse_stream<S, B, E, P>(bytes: S, parser: P) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    P: SseLineParser + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(bytes);
        let mut buffer = CircularLineBuffer::with_capacity(4096);
        let mut frames = FrameAssembler::new();

        'chunks: while let Some(chunk_result) = byte_chunks.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(SourceError::Stream(e.to_string()));
                    continue;
                }
            };
            buffer.extend(chunk.as_ref());

            // Process all complete lines in buffer
            while let Some(line_result) = buffer.next_line() {
                let line = match line_result {
                    Ok(line) => line,
                    Err(e) => {
                        yield Err(e);
                        continue;
                    }
                };

                let Some(frame) = frames.push_line(&line) else {
                    continue;
                };

                if let Some(ms) = frame.retry {
                    yield Ok(SourceEvent::Retry(Duration::from_millis(ms)));
                }

                if frame.data.is_empty() {
                    if let Some(id) = frame.id {
                        yield Ok(SourceEvent::Id(id));
                    }
                    continue;
                }

                if parser.is_done_marker(&frame.data) {
                    yield Ok(SourceEvent::Done);
                    break 'chunks;
                }

                let parsed = parser.parse_frame(&frame);
                let id_carried = parsed
                    .as_ref()
                    .is_ok_and(|events| events.iter().any(carries_id));
                match parsed {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(e) => yield Err(e),
                }

                if !id_carried {
                    if let Some(id) = frame.id {
                        yield Ok(SourceEvent::Id(id));
                    }
                }
            }
        }
    })
}

fn carries_id(event: &SourceEvent) -> bool {
    matches!(event, SourceEvent::Batch { id: Some(_), .. } | SourceEvent::Id(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use rivulet_buffer::{Schema, TupleDecoder};

    fn parser() -> BatchLineParser {
        let schema = Schema::new(["x", "y"]).unwrap();
        BatchLineParser::new(Arc::new(TupleDecoder::new(schema)))
    }

    async fn collect(chunks: Vec<&'static str>, parser: BatchLineParser) -> Vec<Result<SourceEvent>> {
        let bytes = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, std::io::Error>(c.as_bytes().to_vec())),
        );
        parse_sse_stream(bytes, parser).collect().await
    }

    fn batch_values(event: &SourceEvent) -> Vec<Vec<f64>> {
        match event {
            SourceEvent::Batch { batch, .. } => {
                batch.iter().map(|r| r.values().to_vec()).collect()
            }
            other => panic!("Expected Batch, got {:?}", other),
        }
    }

    #[test]
    fn test_assembler_fields() {
        let mut assembler = FrameAssembler::new();

        assert!(assembler.push_line(": keep-alive").is_none());
        assert!(assembler.push_line("event: points").is_none());
        assert!(assembler.push_line("id: 7").is_none());
        assert!(assembler.push_line("data:[[1,").is_none());
        assert!(assembler.push_line("data: 2]]").is_none());

        let frame = assembler.push_line("").unwrap();
        assert_eq!(frame.event.as_deref(), Some("points"));
        assert_eq!(frame.id.as_deref(), Some("7"));
        assert_eq!(frame.data, "[[1,\n2]]");
    }

    #[test]
    fn test_assembler_blank_lines_without_data() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.push_line("").is_none());
        assert!(assembler.push_line(":comment").is_none());
        assert!(assembler.push_line("").is_none());
    }

    #[test]
    fn test_assembler_retry_only() {
        let mut assembler = FrameAssembler::new();
        assembler.push_line("retry: 2500");
        let frame = assembler.push_line("").unwrap();
        assert_eq!(frame.retry, Some(2500));
        assert!(frame.data.is_empty());
    }

    #[tokio::test]
    async fn test_parse_split_chunks() {
        let events = collect(vec!["data: [[1, 2]]\n", "\nda", "ta: [[3, 4], [5, 6]]\r\n\r\n"], parser()).await;

        assert_eq!(events.len(), 2);
        assert_eq!(batch_values(events[0].as_ref().unwrap()), vec![vec![1.0, 2.0]]);
        assert_eq!(
            batch_values(events[1].as_ref().unwrap()),
            vec![vec![3.0, 4.0], vec![5.0, 6.0]]
        );
    }

    #[tokio::test]
    async fn test_parse_done_marker_ends_stream() {
        let events = collect(
            vec!["data: [[1, 2]]\n\ndata: [DONE]\n\ndata: [[9, 9]]\n\n"],
            parser(),
        )
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Ok(SourceEvent::Done)));
    }

    #[tokio::test]
    async fn test_bad_payload_does_not_stop_stream() {
        let events = collect(vec!["data: [[1]]\n\ndata: [[1, 2]]\n\n"], parser()).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Err(e) if e.is_payload_error()));
        assert!(events[1].is_ok());
    }

    #[tokio::test]
    async fn test_retry_and_id_forwarded() {
        let events = collect(vec!["retry: 1000\nid: 42\ndata: [[1, 2]]\n\n"], parser()).await;

        assert!(matches!(events[0], Ok(SourceEvent::Retry(d)) if d == Duration::from_millis(1000)));
        match &events[1] {
            Ok(SourceEvent::Batch { id, .. }) => assert_eq!(id.as_deref(), Some("42")),
            other => panic!("Expected Batch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_event_filter() {
        let events = collect(
            vec!["event: status\ndata: hello\n\nevent: points\ndata: [[1, 2]]\n\n"],
            parser().with_event("points"),
        )
        .await;

        assert_eq!(events.len(), 1);
        assert!(events[0].is_ok());
    }

    #[tokio::test]
    async fn test_ids_without_batches_forwarded() {
        let events = collect(
            vec![
                "id: 1\n\n",
                "event: status\nid: 2\ndata: hello\n\n",
                "id: 3\ndata: [[1]]\n\n",
                "event: points\nid: 4\ndata: [[1, 2]]\n\n",
            ],
            parser().with_event("points"),
        )
        .await;

        assert_eq!(events.len(), 5);
        assert!(matches!(&events[0], Ok(SourceEvent::Id(id)) if id == "1"));
        assert!(matches!(&events[1], Ok(SourceEvent::Id(id)) if id == "2"));
        assert!(matches!(&events[2], Err(e) if e.is_payload_error()));
        assert!(matches!(&events[3], Ok(SourceEvent::Id(id)) if id == "3"));
        match &events[4] {
            Ok(SourceEvent::Batch { id, .. }) => assert_eq!(id.as_deref(), Some("4")),
            other => panic!("Expected Batch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_incomplete_trailing_event_discarded() {
        let events = collect(vec!["data: [[1, 2]]\n\ndata: [[3, 4]]"], parser()).await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_reported() {
        let bytes = stream::iter(vec![
            Ok(b"data: [[1, 2]]\n\n".to_vec()),
            Err("connection reset"),
        ]);
        let events: Vec<_> = parse_sse_stream(bytes, parser()).collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], Err(SourceError::Stream(msg)) if msg == "connection reset"));
    }
}
