use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::error::{BufferError, Result};
use crate::record::Schema;

/// Update discipline applied to each incoming batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UpdateMode {
    /// Ring buffer: new records go to the tail, oldest are evicted first
    #[default]
    Append,
    /// Each batch replaces the previous contents
    Replace,
}

impl UpdateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Append => "append",
            UpdateMode::Replace => "replace",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateMode {
    type Err = BufferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(UpdateMode::Append),
            "replace" => Ok(UpdateMode::Replace),
            other => Err(BufferError::InvalidConfiguration(format!(
                "unrecognized update mode '{}' (expected 'append' or 'replace')",
                other
            ))),
        }
    }
}

impl TryFrom<String> for UpdateMode {
    type Error = BufferError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<UpdateMode> for String {
    fn from(mode: UpdateMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Maximum number of records a buffer retains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Capacity {
    Bounded(NonZeroUsize),
    #[default]
    Unbounded,
}

impl Capacity {
    pub fn bounded(max: usize) -> Result<Self> {
        NonZeroUsize::new(max).map(Capacity::Bounded).ok_or_else(|| {
            BufferError::InvalidConfiguration("capacity must be a positive integer".to_string())
        })
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Capacity::Bounded(n) => Some(n.get()),
            Capacity::Unbounded => None,
        }
    }

    /// Number of records to drop so that `len` fits
    pub(crate) fn excess(&self, len: usize) -> usize {
        self.limit().map_or(0, |max| len.saturating_sub(max))
    }
}

impl TryFrom<Option<usize>> for Capacity {
    type Error = BufferError;

    fn try_from(value: Option<usize>) -> Result<Self> {
        match value {
            Some(max) => Capacity::bounded(max),
            None => Ok(Capacity::Unbounded),
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Bounded(n) => write!(f, "{}", n),
            Capacity::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Raw buffer settings as they appear in configuration files
///
/// Validation happens in [`crate::StreamingBuffer::from_config`], so a bad
/// value never yields a buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum retained records; omitted means unbounded
    #[serde(default, alias = "max_size")]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub mode: UpdateMode,
    /// Field names fixed up front; omitted means the first batch decides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl BufferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_mode(mut self, mode: UpdateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn capacity(&self) -> Result<Capacity> {
        Capacity::try_from(self.capacity)
    }

    pub fn schema(&self) -> Result<Option<Schema>> {
        self.fields.clone().map(Schema::new).transpose()
    }
}
