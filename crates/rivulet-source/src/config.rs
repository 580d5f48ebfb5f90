use rivulet_buffer::{DecoderKind, Schema};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SourceError};

fn default_fields() -> Vec<String> {
    vec!["x".to_string(), "y".to_string()]
}

fn default_reconnect() -> bool {
    true
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

/// Connection and retry policy of a server-sent events subscription
///
/// Pacing and backoff belong to the transport; the buffer never sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Endpoint serving `text/event-stream`
    pub url: String,
    #[serde(default)]
    pub decoder: DecoderKind,
    /// Field names of the incoming records, in order
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
    /// Only frames with this `event:` name carry data (unnamed frames always do)
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default = "default_reconnect")]
    pub reconnect: bool,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Consecutive failed attempts before giving up; `None` retries forever
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            decoder: DecoderKind::default(),
            fields: default_fields(),
            event: None,
            reconnect: default_reconnect(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_retries: None,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    pub fn with_decoder(mut self, decoder: DecoderKind) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    pub fn with_backoff(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.max_backoff_ms = max_ms;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn schema(&self) -> Result<Schema> {
        Ok(Schema::new(self.fields.clone())?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(SourceError::Config("url must not be empty".to_string()));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(SourceError::Config(format!(
                "max_backoff_ms ({}) is below initial_backoff_ms ({})",
                self.max_backoff_ms, self.initial_backoff_ms
            )));
        }
        self.schema().map(|_| ())
    }

    /// Delay before reconnect attempt `attempt` (1-based)
    ///
    /// Doubles per attempt from the base delay and is capped at
    /// `max_backoff_ms`. A server `retry:` hint replaces the base delay.
    pub fn backoff(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let base = hint.map_or(self.initial_backoff_ms, |d| d.as_millis() as u64);
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        Duration::from_millis(base.saturating_mul(factor).min(self.max_backoff_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = TransportConfig::new("http://localhost:5050/data").with_backoff(100, 1_000);

        assert_eq!(config.backoff(1, None), Duration::from_millis(100));
        assert_eq!(config.backoff(2, None), Duration::from_millis(200));
        assert_eq!(config.backoff(4, None), Duration::from_millis(800));
        assert_eq!(config.backoff(5, None), Duration::from_millis(1_000));
        assert_eq!(config.backoff(60, None), Duration::from_millis(1_000));
    }

    #[test]
    fn test_backoff_uses_server_hint() {
        let config = TransportConfig::new("http://localhost:5050/data").with_backoff(100, 10_000);
        assert_eq!(
            config.backoff(2, Some(Duration::from_millis(3_000))),
            Duration::from_millis(6_000)
        );
    }

    #[test]
    fn test_validate() {
        assert!(TransportConfig::new("").validate().is_err());
        assert!(TransportConfig::new("http://a")
            .with_backoff(500, 100)
            .validate()
            .is_err());
        assert!(TransportConfig::new("http://a")
            .with_fields(["x", "x"])
            .validate()
            .is_err());
        assert!(TransportConfig::new("http://a").validate().is_ok());
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"url": "http://localhost:5050/data", "decoder": "columns"}"#)
                .unwrap();

        assert_eq!(config.decoder, DecoderKind::Columns);
        assert_eq!(config.fields, vec!["x", "y"]);
        assert!(config.reconnect);
        assert_eq!(config.max_retries, None);
    }
}
