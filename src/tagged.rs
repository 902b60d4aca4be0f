//! Tagged-type wire codec.
//!
//! Plain JSON cannot tell a 32-bit int from a 64-bit long, a date from a
//! string, or a document reference from an object. The wire therefore wraps
//! such values in single-key objects whose key is a tag:
//!
//! | Tag       | Payload                  | Native                  |
//! |-----------|--------------------------|-------------------------|
//! | `@int`    | decimal string           | [`Value::Number`]       |
//! | `@long`   | decimal string           | [`Value::Long`]         |
//! | `@double` | decimal string           | [`Value::Number`]       |
//! | `@date`   | `YYYY-MM-DD`             | [`Value::Date`]         |
//! | `@time`   | ISO-8601 date-time       | [`Value::Time`]         |
//! | `@mod`    | module name              | [`Value::Module`]       |
//! | `@doc`    | `coll:id` or object      | [`Value::Doc`] / object |
//! | `@ref`    | reference descriptor     | payload                 |
//! | `@set`    | set descriptor           | payload                 |
//! | `@object` | object with `@` keys     | [`Value::Object`]       |
//!
//! Arrays are never wrapped. Numeric payloads are strings so the receiver
//! never parses them through a lossy float path.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};

use crate::error::{FaunaError, FaunaResult};
use crate::values::{DateStub, DocumentReference, MAX_SAFE_INTEGER, Module, TimeStub, Value};

/// Marks a wrapper object's type-tag key.
pub const TAG_PREFIX: char = '@';

pub const LONG_MIN: i128 = i64::MIN as i128;
pub const LONG_MAX: i128 = i64::MAX as i128;

/// A recognized wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Mod,
    Doc,
    Ref,
    Set,
    Int,
    Long,
    Double,
    Date,
    Time,
    Object,
}

impl Tag {
    /// Decode priority: when an object carries several tag keys, the first
    /// one in this list wins.
    pub const PRIORITY: [Tag; 10] = [
        Tag::Mod,
        Tag::Doc,
        Tag::Ref,
        Tag::Set,
        Tag::Int,
        Tag::Long,
        Tag::Double,
        Tag::Date,
        Tag::Time,
        Tag::Object,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Tag::Mod => "@mod",
            Tag::Doc => "@doc",
            Tag::Ref => "@ref",
            Tag::Set => "@set",
            Tag::Int => "@int",
            Tag::Long => "@long",
            Tag::Double => "@double",
            Tag::Date => "@date",
            Tag::Time => "@time",
            Tag::Object => "@object",
        }
    }

    /// Find the highest-priority tag present in `map` along with its payload.
    pub fn detect(map: &Map<String, Json>) -> Option<(Tag, &Json)> {
        Self::PRIORITY
            .iter()
            .find_map(|tag| map.get(tag.key()).map(|payload| (*tag, payload)))
    }

    fn wrap(self, payload: Json) -> Json {
        let mut map = Map::with_capacity(1);
        map.insert(self.key().to_string(), payload);
        Json::Object(map)
    }
}

// ==================== Encoding ====================

/// Encode a native value into tagged JSON.
pub fn encode(value: &Value) -> FaunaResult<Json> {
    match value {
        Value::Null => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::String(s) => Ok(Json::String(s.clone())),
        Value::Number(n) => encode_number(*n),
        Value::Long(n) => encode_long(*n),
        Value::Date(d) => Ok(Tag::Date.wrap(Json::String(d.as_str().to_string()))),
        Value::Time(t) => Ok(Tag::Time.wrap(Json::String(t.as_str().to_string()))),
        Value::Doc(doc) => Ok(Tag::Doc.wrap(Json::String(doc.to_string()))),
        Value::Module(m) => Ok(Tag::Mod.wrap(Json::String(m.name().to_string()))),
        Value::Array(items) => items
            .iter()
            .map(encode)
            .collect::<FaunaResult<Vec<_>>>()
            .map(Json::Array),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            let mut wrapped = false;
            for (key, item) in map {
                wrapped |= key.starts_with(TAG_PREFIX);
                out.insert(key.clone(), encode(item)?);
            }
            let out = Json::Object(out);
            Ok(if wrapped { Tag::Object.wrap(out) } else { out })
        }
    }
}

/// Pick the numeric tag for a float: whole numbers in 32-bit range are
/// `@int`, whole numbers the float holds exactly are `@long`, the rest `@double`.
pub fn number_tag(n: f64) -> FaunaResult<Tag> {
    if n.is_infinite() {
        return Err(FaunaError::NotFinite(n));
    }
    if n.is_nan() || n.fract() != 0.0 {
        return Ok(Tag::Double);
    }
    if n >= i32::MIN as f64 && n <= i32::MAX as f64 {
        Ok(Tag::Int)
    } else if n.abs() <= MAX_SAFE_INTEGER {
        Ok(Tag::Long)
    } else {
        Ok(Tag::Double)
    }
}

pub fn encode_number(n: f64) -> FaunaResult<Json> {
    let tag = number_tag(n)?;
    let payload = match tag {
        Tag::Int | Tag::Long => (n as i64).to_string(),
        _ => n.to_string(),
    };
    Ok(tag.wrap(Json::String(payload)))
}

pub fn encode_long(n: i128) -> FaunaResult<Json> {
    if !(LONG_MIN..=LONG_MAX).contains(&n) {
        return Err(FaunaError::PrecisionLoss(n.to_string()));
    }
    Ok(Tag::Long.wrap(Json::String(n.to_string())))
}

// ==================== Decoding ====================

/// Decode tagged JSON text into a native value.
pub fn decode(input: &str) -> FaunaResult<Value> {
    let json: Json = serde_json::from_str(input)?;
    decode_value(json)
}

/// Decode tagged JSON bytes into a native value.
pub fn decode_slice(input: &[u8]) -> FaunaResult<Value> {
    let json: Json = serde_json::from_slice(input)?;
    decode_value(json)
}

/// Decode an already-parsed tagged JSON tree.
pub fn decode_value(json: Json) -> FaunaResult<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(b)),
        Json::Number(n) => Ok(Value::from(Json::Number(n))),
        Json::String(s) => Ok(Value::String(s)),
        Json::Array(items) => items
            .into_iter()
            .map(decode_value)
            .collect::<FaunaResult<Vec<_>>>()
            .map(Value::Array),
        Json::Object(mut map) => match Tag::detect(&map).map(|(tag, _)| tag) {
            Some(tag) => {
                let payload = map.remove(tag.key()).unwrap_or(Json::Null);
                decode_tagged(tag, payload)
            }
            None => decode_fields(map),
        },
    }
}

fn decode_fields(map: Map<String, Json>) -> FaunaResult<Value> {
    map.into_iter()
        .map(|(key, item)| Ok((key, decode_value(item)?)))
        .collect::<FaunaResult<BTreeMap<_, _>>>()
        .map(Value::Object)
}

fn decode_tagged(tag: Tag, payload: Json) -> FaunaResult<Value> {
    match tag {
        Tag::Mod => match payload {
            Json::String(name) => Ok(Value::Module(Module::new(name))),
            other => Err(FaunaError::invalid_tag(
                tag.key(),
                format!("expected a module name, got {other}"),
            )),
        },
        Tag::Doc => match payload {
            Json::String(s) => DocumentReference::parse(&s).map(Value::Doc),
            Json::Object(map) => decode_fields(map),
            other => Err(FaunaError::InvalidDocumentRef(other.to_string())),
        },
        Tag::Ref | Tag::Set => decode_value(payload),
        Tag::Int | Tag::Double => {
            let digits = numeric_payload(tag, &payload)?;
            digits
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|e| FaunaError::invalid_tag(tag.key(), format!("'{digits}': {e}")))
        }
        Tag::Long => {
            let digits = numeric_payload(tag, &payload)?;
            digits
                .parse::<i128>()
                .map(Value::Long)
                .map_err(|e| FaunaError::invalid_tag(tag.key(), format!("'{digits}': {e}")))
        }
        Tag::Date => DateStub::from_json(&payload).map(Value::Date),
        Tag::Time => TimeStub::from_json(&payload).map(Value::Time),
        Tag::Object => match payload {
            Json::Object(map) => decode_fields(map),
            other => decode_value(other),
        },
    }
}

fn numeric_payload(tag: Tag, payload: &Json) -> FaunaResult<&str> {
    payload.as_str().ok_or_else(|| {
        FaunaError::invalid_tag(tag.key(), format!("expected a decimal string, got {payload}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(pairs: &[(&str, Value)]) -> Value {
        Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_number_boundaries() {
        assert_eq!(encode_number(2147483647.0).unwrap(), json!({ "@int": "2147483647" }));
        assert_eq!(encode_number(-2147483648.0).unwrap(), json!({ "@int": "-2147483648" }));
        assert_eq!(encode_number(2147483648.0).unwrap(), json!({ "@long": "2147483648" }));
        assert_eq!(encode_number(-2147483649.0).unwrap(), json!({ "@long": "-2147483649" }));
        assert_eq!(
            encode_number(9007199254740991.0).unwrap(),
            json!({ "@long": "9007199254740991" })
        );
        assert_eq!(number_tag(9007199254740992.0).unwrap(), Tag::Double);
        assert_eq!(encode_number(1.5).unwrap(), json!({ "@double": "1.5" }));
        assert_eq!(encode_number(-0.0).unwrap(), json!({ "@int": "0" }));
        assert_eq!(encode_number(f64::NAN).unwrap(), json!({ "@double": "NaN" }));
    }

    #[test]
    fn test_infinity_fails() {
        assert!(matches!(encode_number(f64::INFINITY), Err(FaunaError::NotFinite(_))));
        assert!(matches!(
            encode(&Value::Number(f64::NEG_INFINITY)),
            Err(FaunaError::NotFinite(_))
        ));
    }

    #[test]
    fn test_long_range() {
        assert_eq!(
            encode(&Value::Long(9223372036854775807)).unwrap(),
            json!({ "@long": "9223372036854775807" })
        );
        assert_eq!(
            encode(&Value::Long(-9223372036854775808)).unwrap(),
            json!({ "@long": "-9223372036854775808" })
        );
        let err = encode(&Value::Long(9223372036854775808)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Precision loss when converting 9223372036854775808 to a Fauna type"
        );
        assert!(encode(&Value::Long(-9223372036854775809)).is_err());
    }

    #[test]
    fn test_tag_prefixed_keys_wrap() {
        let wrapped = encode(&object(&[("@foo", Value::Number(1.0))])).unwrap();
        assert_eq!(wrapped, json!({ "@object": { "@foo": { "@int": "1" } } }));

        let plain = encode(&object(&[("foo", Value::Number(1.0))])).unwrap();
        assert_eq!(plain, json!({ "foo": { "@int": "1" } }));
    }

    #[test]
    fn test_wrapping_does_not_propagate() {
        let inner = object(&[("@inner", Value::Bool(true))]);
        let outer = object(&[("outer", inner)]);
        assert_eq!(
            encode(&outer).unwrap(),
            json!({ "outer": { "@object": { "@inner": true } } })
        );
    }

    #[test]
    fn test_arrays_are_bare() {
        let v = Value::Array(vec![Value::Number(1.0), Value::from("a"), Value::Null]);
        assert_eq!(encode(&v).unwrap(), json!([{ "@int": "1" }, "a", null]));
    }

    #[test]
    fn test_decode_doc() {
        assert_eq!(
            decode(r#"{"@doc": "Coll:123"}"#).unwrap(),
            Value::Doc(DocumentReference::new("Coll", "123"))
        );
        assert_eq!(
            decode(r#"{"@doc": {"coll": "Coll", "id": "123", "extra": "x"}}"#).unwrap(),
            object(&[
                ("coll", Value::from("Coll")),
                ("id", Value::from("123")),
                ("extra", Value::from("x")),
            ])
        );
        assert!(matches!(
            decode(r#"{"@doc": "Coll"}"#),
            Err(FaunaError::InvalidDocumentRef(_))
        ));
        assert!(matches!(
            decode(r#"{"@doc": 5}"#),
            Err(FaunaError::InvalidDocumentRef(_))
        ));
    }

    #[test]
    fn test_decode_priority() {
        // @mod outranks @int regardless of key order.
        let v = decode(r#"{"@int": "1", "@mod": "Users"}"#).unwrap();
        assert_eq!(v, Value::Module(Module::new("Users")));

        let v = decode(r#"{"@time": "2023-01-01T00:00:00Z", "@long": "7"}"#).unwrap();
        assert_eq!(v, Value::Long(7));
    }

    #[test]
    fn test_decode_numbers() {
        assert_eq!(decode(r#"{"@int": "42"}"#).unwrap(), Value::Number(42.0));
        assert_eq!(decode(r#"{"@double": "1.25"}"#).unwrap(), Value::Number(1.25));
        assert_eq!(
            decode(r#"{"@long": "-9223372036854775808"}"#).unwrap(),
            Value::Long(-9223372036854775808)
        );
        assert_eq!(
            decode(r#"{"@long": "9223372036854775808"}"#).unwrap(),
            Value::Long(9223372036854775808)
        );
        assert!(matches!(
            decode(r#"{"@long": 12}"#),
            Err(FaunaError::InvalidTag { tag: "@long", .. })
        ));
        assert!(decode(r#"{"@int": "abc"}"#).is_err());
    }

    #[test]
    fn test_decode_dates() {
        assert_eq!(
            decode(r#"{"@date": "2023-03-09"}"#).unwrap(),
            Value::Date(DateStub::parse("2023-03-09").unwrap())
        );
        let err = decode(r#"{"@time": "yesterday"}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected an ISO date string but received 'yesterday'"
        );
        assert!(matches!(
            decode(r#"{"@date": 20230309}"#),
            Err(FaunaError::Type { .. })
        ));
    }

    #[test]
    fn test_decode_object_unwraps_one_level() {
        let v = decode(r#"{"@object": {"@int": {"@int": "1"}, "b": null}}"#).unwrap();
        assert_eq!(v, object(&[("@int", Value::Number(1.0)), ("b", Value::Null)]));
    }

    #[test]
    fn test_decode_ref_and_set_pass_through() {
        let v = decode(r#"{"@ref": {"id": "1", "coll": {"@mod": "Users"}}}"#).unwrap();
        assert_eq!(
            v,
            object(&[
                ("id", Value::from("1")),
                ("coll", Value::Module(Module::new("Users"))),
            ])
        );

        let v = decode(r#"{"@set": "opaque-cursor"}"#).unwrap();
        assert_eq!(v, Value::from("opaque-cursor"));
    }

    #[test]
    fn test_decode_nested_and_null() {
        let v = decode(r#"{"data": [{"n": {"@int": "1"}}, null], "none": null}"#).unwrap();
        assert_eq!(
            v,
            object(&[
                (
                    "data",
                    Value::Array(vec![object(&[("n", Value::Number(1.0))]), Value::Null])
                ),
                ("none", Value::Null),
            ])
        );
    }

    #[test]
    fn test_decode_malformed_json() {
        assert!(matches!(decode("{not json"), Err(FaunaError::Json(_))));
    }
}
