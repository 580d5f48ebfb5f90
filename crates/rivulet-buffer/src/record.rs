use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{BufferError, Result};

/// Ordered list of field names shared by every record of a stream
///
/// Two schemas are equal when they name the same fields in the same order.
/// Cloning is cheap (reference counted).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    fields: Arc<[String]>,
}

impl Schema {
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();

        if fields.is_empty() {
            return Err(BufferError::InvalidConfiguration(
                "schema must name at least one field".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for name in &fields {
            if name.is_empty() {
                return Err(BufferError::InvalidConfiguration(
                    "field names must not be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(BufferError::InvalidConfiguration(format!(
                    "duplicate field name '{}'",
                    name
                )));
            }
        }

        Ok(Self {
            fields: fields.into(),
        })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields per record
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.fields.join(", "))
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.fields.iter())
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let fields = Vec::<String>::deserialize(deserializer)?;
        Schema::new(fields).map_err(de::Error::custom)
    }
}

/// One data point: an ordered tuple of named numeric fields
///
/// Records are immutable once built. The values are stored positionally and
/// the names live in the shared [`Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Schema,
    values: Arc<[f64]>,
}

impl Record {
    pub fn new(schema: Schema, values: impl Into<Vec<f64>>) -> Result<Self> {
        let values: Vec<f64> = values.into();
        if values.len() != schema.width() {
            return Err(BufferError::Arity {
                expected: schema.width(),
                found: values.len(),
            });
        }
        Ok(Self {
            schema,
            values: values.into(),
        })
    }

    /// Build a record and its schema from `(name, value)` pairs
    ///
    /// ```
    /// use rivulet_buffer::Record;
    ///
    /// let point = Record::from_pairs([("x", 1.0), ("y", 2.5)]).unwrap();
    /// assert_eq!(point.get("y"), Some(2.5));
    /// ```
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<f64>) =
            pairs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        Self::new(Schema::new(names)?, values)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema.index_of(name).map(|i| self.values[i])
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.schema
            .fields()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Wire form is the positional tuple, e.g. `[x, y]`
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values.iter())
    }
}

/// An ordered group of records delivered together by the source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a batch of positional rows against one schema
    pub fn from_rows<I, R>(schema: &Schema, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: Into<Vec<f64>>,
    {
        rows.into_iter()
            .map(|row| Record::new(schema.clone(), row))
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Schema of the first record, if any
    pub fn schema(&self) -> Option<&Schema> {
        self.records.first().map(Record::schema)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl From<Vec<Record>> for Batch {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<Record> for Batch {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Batch {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
