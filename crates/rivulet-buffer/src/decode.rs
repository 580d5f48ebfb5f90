//! Batch decoders
//!
//! A decoder turns one wire payload (the `data` of a server-sent event) into a
//! schema-checked [`Batch`]. Three JSON layouts are supported:
//!
//! - tuples: `[[x, y], [x, y]]`
//! - columns: `{"x": [..], "y": [..]}`
//! - objects: `[{"x": .., "y": ..}]`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{BufferError, DecodeError};
use crate::record::{Batch, Record, Schema};

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Strategy for decoding one payload into a batch
pub trait BatchDecoder: Send + Sync {
    fn decode(&self, payload: &str) -> DecodeResult<Batch>;

    /// Schema every decoded record carries
    fn schema(&self) -> &Schema;
}

/// Which payload layout a stream uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    #[default]
    Tuples,
    Columns,
    Objects,
}

impl DecoderKind {
    pub fn build(self, schema: Schema) -> Box<dyn BatchDecoder> {
        match self {
            DecoderKind::Tuples => Box::new(TupleDecoder::new(schema)),
            DecoderKind::Columns => Box::new(ColumnDecoder::new(schema)),
            DecoderKind::Objects => Box::new(ObjectDecoder::new(schema)),
        }
    }
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecoderKind::Tuples => "tuples",
            DecoderKind::Columns => "columns",
            DecoderKind::Objects => "objects",
        })
    }
}

impl FromStr for DecoderKind {
    type Err = BufferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tuples" => Ok(DecoderKind::Tuples),
            "columns" => Ok(DecoderKind::Columns),
            "objects" => Ok(DecoderKind::Objects),
            other => Err(BufferError::InvalidConfiguration(format!(
                "unrecognized decoder '{}'",
                other
            ))),
        }
    }
}

fn number(field: &str, value: &Value) -> DecodeResult<f64> {
    value.as_f64().ok_or_else(|| DecodeError::NonNumeric {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn array<'a>(value: &'a Value, what: &str) -> DecodeResult<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| DecodeError::Shape(format!("expected {}, got {}", what, kind_of(value))))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Positional tuples: `[[x, y], ...]`
#[derive(Debug, Clone)]
pub struct TupleDecoder {
    schema: Schema,
}

impl TupleDecoder {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

impl BatchDecoder for TupleDecoder {
    fn decode(&self, payload: &str) -> DecodeResult<Batch> {
        let value: Value = serde_json::from_str(payload)?;
        let rows = array(&value, "an array of tuples")?;
        let fields = self.schema.fields();

        rows.iter()
            .enumerate()
            .map(|(index, row)| -> DecodeResult<Record> {
                let row = array(row, "a tuple")?;
                if row.len() != fields.len() {
                    return Err(DecodeError::Width {
                        index,
                        expected: fields.len(),
                        found: row.len(),
                        schema: self.schema.clone(),
                    });
                }
                let values = fields
                    .iter()
                    .zip(row)
                    .map(|(field, v)| number(field, v))
                    .collect::<DecodeResult<Vec<_>>>()?;
                Ok(Record::new(self.schema.clone(), values)?)
            })
            .collect()
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Columns keyed by field name: `{"x": [..], "y": [..]}`
#[derive(Debug, Clone)]
pub struct ColumnDecoder {
    schema: Schema,
}

impl ColumnDecoder {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

impl BatchDecoder for ColumnDecoder {
    fn decode(&self, payload: &str) -> DecodeResult<Batch> {
        let value: Value = serde_json::from_str(payload)?;
        let object = value.as_object().ok_or_else(|| {
            DecodeError::Shape(format!("expected an object of columns, got {}", kind_of(&value)))
        })?;
        check_keys(object, &self.schema)?;

        let columns = self
            .schema
            .fields()
            .iter()
            .map(|field| -> DecodeResult<Vec<f64>> {
                let column = array(&object[field.as_str()], "a column array")?;
                column.iter().map(|v| number(field, v)).collect::<DecodeResult<Vec<_>>>()
            })
            .collect::<DecodeResult<Vec<_>>>()?;

        let rows = columns.first().map_or(0, Vec::len);
        for (field, column) in self.schema.fields().iter().zip(&columns) {
            if column.len() != rows {
                return Err(DecodeError::RaggedColumns {
                    field: field.clone(),
                    expected: rows,
                    found: column.len(),
                });
            }
        }

        (0..rows)
            .map(|i| -> DecodeResult<Record> {
                let values: Vec<f64> = columns.iter().map(|c| c[i]).collect();
                Ok(Record::new(self.schema.clone(), values)?)
            })
            .collect()
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Objects keyed by field name: `[{"x": .., "y": ..}, ...]`
///
/// Key order on the wire does not matter; values are placed in schema order.
#[derive(Debug, Clone)]
pub struct ObjectDecoder {
    schema: Schema,
}

impl ObjectDecoder {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

impl BatchDecoder for ObjectDecoder {
    fn decode(&self, payload: &str) -> DecodeResult<Batch> {
        let value: Value = serde_json::from_str(payload)?;
        let items = array(&value, "an array of objects")?;

        items
            .iter()
            .map(|item| -> DecodeResult<Record> {
                let object = item.as_object().ok_or_else(|| {
                    DecodeError::Shape(format!("expected an object, got {}", kind_of(item)))
                })?;
                check_keys(object, &self.schema)?;
                let values = self
                    .schema
                    .fields()
                    .iter()
                    .map(|field| number(field, &object[field.as_str()]))
                    .collect::<DecodeResult<Vec<_>>>()?;
                Ok(Record::new(self.schema.clone(), values)?)
            })
            .collect()
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Keys must be exactly the schema's field names
fn check_keys(object: &Map<String, Value>, schema: &Schema) -> DecodeResult<()> {
    let matches = object.len() == schema.width()
        && schema.fields().iter().all(|f| object.contains_key(f.as_str()));
    if matches {
        return Ok(());
    }

    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();
    let found = Schema::new(keys.into_iter().cloned()).map_err(|_| {
        DecodeError::Shape(format!("expected fields {}, got an object without usable keys", schema))
    })?;
    Err(BufferError::SchemaMismatch {
        expected: schema.clone(),
        found,
    }
    .into())
}
