use rivulet_buffer::{BufferError, DecodeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid UTF-8 in event stream: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Gave up after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SourceError {
    /// Payload-level problems: the event is dropped but the connection stays usable
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            SourceError::Utf8(_) | SourceError::Decode(_) | SourceError::Buffer(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
