//! Native values and the date/time wrappers carried by the tagged format.

pub mod grammar;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::error::{FaunaError, FaunaResult};

/// A reference to a built-in or user-defined module, e.g. `Date` or `Users`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Module(String);

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference to a stored document: collection name plus id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentReference {
    pub coll: String,
    pub id: String,
}

impl DocumentReference {
    pub fn new(coll: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            coll: coll.into(),
            id: id.into(),
        }
    }

    /// Parse the `collection:id` form. Splits on the first `:`.
    pub fn parse(input: &str) -> FaunaResult<Self> {
        match input.split_once(':') {
            Some((coll, id)) if !coll.is_empty() => Ok(Self::new(coll, id)),
            _ => Err(FaunaError::InvalidDocumentRef(input.to_string())),
        }
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.coll, self.id)
    }
}

/// A calendar date without time or zone, kept in its canonical `YYYY-MM-DD` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateStub {
    date_string: String,
}

impl DateStub {
    /// Validate a plain date string.
    pub fn parse(date_string: &str) -> FaunaResult<Self> {
        if !grammar::is_plain_date(date_string) {
            return Err(FaunaError::InvalidDate(date_string.to_string()));
        }
        Ok(Self {
            date_string: date_string.to_string(),
        })
    }

    /// Validate a wire payload, which must be a JSON string.
    pub fn from_json(payload: &serde_json::Value) -> FaunaResult<Self> {
        match payload {
            serde_json::Value::String(s) => Self::parse(s),
            other => Err(FaunaError::not_a_string(other)),
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            date_string: date.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn to_date(&self) -> FaunaResult<NaiveDate> {
        NaiveDate::parse_from_str(&self.date_string, "%Y-%m-%d")
            .map_err(|_| FaunaError::InvalidDate(self.date_string.clone()))
    }

    pub fn as_str(&self) -> &str {
        &self.date_string
    }
}

impl FromStr for DateStub {
    type Err = FaunaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DateStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateStub(\"{}\")", self.date_string)
    }
}

/// An instant in time, kept in its full ISO-8601 form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeStub {
    iso_string: String,
}

impl TimeStub {
    /// Validate an ISO date-time string with zone.
    pub fn parse(iso_string: &str) -> FaunaResult<Self> {
        if !grammar::is_date_time(iso_string) {
            return Err(FaunaError::InvalidTime(iso_string.to_string()));
        }
        Ok(Self {
            iso_string: iso_string.to_string(),
        })
    }

    /// Validate a wire payload, which must be a JSON string.
    pub fn from_json(payload: &serde_json::Value) -> FaunaResult<Self> {
        match payload {
            serde_json::Value::String(s) => Self::parse(s),
            other => Err(FaunaError::not_a_string(other)),
        }
    }

    /// Millisecond precision, `Z` suffix.
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self {
            iso_string: datetime.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn to_datetime(&self) -> FaunaResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.iso_string)
            .or_else(|_| DateTime::parse_from_str(&self.iso_string, "%Y-%m-%dT%H:%M:%S%.f%z"))
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| FaunaError::InvalidTime(self.iso_string.clone()))
    }

    pub fn as_str(&self) -> &str {
        &self.iso_string
    }
}

impl FromStr for TimeStub {
    type Err = FaunaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeStub(\"{}\")", self.iso_string)
    }
}

/// A decoded, in-memory value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Floating point number (`@int` and `@double` on the wire)
    Number(f64),
    /// Wide integer (`@long` on the wire); must fit in 64 bits to encode
    Long(i128),
    /// String
    String(String),
    /// Calendar date
    Date(DateStub),
    /// Instant in time
    Time(TimeStub),
    /// Document reference
    Doc(DocumentReference),
    /// Module reference
    Module(Module),
    /// Ordered sequence
    Array(Vec<Value>),
    /// String-keyed mapping
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Long(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(n) => i64::try_from(*n).ok(),
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                Some(*n as i64)
            }
            _ => None,
        }
    }

    /// Field lookup on an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// A plain-JSON view for display: wrapper types collapse to strings or
    /// simple objects and type fidelity is dropped.
    pub fn to_plain_json(&self) -> serde_json::Value {
        use serde_json::json;

        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| json!(n.to_string())),
            Value::Long(n) => match i64::try_from(*n) {
                Ok(n) => json!(n),
                Err(_) => json!(n.to_string()),
            },
            Value::String(s) => json!(s),
            Value::Date(d) => json!(d.as_str()),
            Value::Time(t) => json!(t.as_str()),
            Value::Doc(doc) => json!({ "coll": doc.coll, "id": doc.id }),
            Value::Module(m) => json!(m.name()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_plain_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_plain_json()))
                    .collect(),
            ),
        }
    }
}

/// Largest integer an `f64` holds exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        crate::tagged::encode(self)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n as i128)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Long(n as i128)
    }
}

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Value::Long(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateStub> for Value {
    fn from(d: DateStub) -> Self {
        Value::Date(d)
    }
}

impl From<TimeStub> for Value {
    fn from(t: TimeStub) -> Self {
        Value::Time(t)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(DateStub::from_date(d))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::Time(TimeStub::from_datetime(dt))
    }
}

impl From<DocumentReference> for Value {
    fn from(doc: DocumentReference) -> Self {
        Value::Doc(doc)
    }
}

impl From<Module> for Value {
    fn from(m: Module) -> Self {
        Value::Module(m)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(map: BTreeMap<String, T>) -> Self {
        Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(map: HashMap<String, T>) -> Self {
        Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Plain (untagged) JSON into native values. Integers that fit 32 bits
/// become numbers, wider ones longs.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) if i32::try_from(i).is_ok() => Value::Number(i as f64),
                Some(i) => Value::Long(i as i128),
                None => match n.as_u64() {
                    Some(u) => Value::Long(u as i128),
                    None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
                },
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}
