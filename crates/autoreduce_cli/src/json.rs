//! Conversions between JSON and documents.

use autoreduce_codec::Value;
use serde_json::{Map, Number, Value as Json};
use thiserror::Error;

/// JSON that has no document representation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JsonError {
    /// Documents have no floating-point type.
    #[error("floating-point number {0} is not supported")]
    Float(String),

    /// Integer outside the `i64` range.
    #[error("integer {0} is out of range")]
    OutOfRange(String),
}

/// Convert a JSON value to a document value.
pub fn to_value(json: &Json) -> Result<Value, JsonError> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => number(n)?,
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(items) => Value::Array(items.iter().map(to_value).collect::<Result<_, _>>()?),
        Json::Object(fields) => Value::object(
            fields
                .iter()
                .map(|(name, value)| Ok((name.as_str(), to_value(value)?)))
                .collect::<Result<Vec<_>, JsonError>>()?,
        ),
    })
}

fn number(n: &Number) -> Result<Value, JsonError> {
    if let Some(i) = n.as_i64() {
        Ok(Value::Integer(i))
    } else if n.is_u64() {
        Err(JsonError::OutOfRange(n.to_string()))
    } else {
        Err(JsonError::Float(n.to_string()))
    }
}

/// Convert a document value to JSON. Byte strings become arrays of numbers
/// and non-text map keys are rendered with their JSON form.
pub fn from_value(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(i) => Json::from(*i),
        Value::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        Value::Text(s) => Json::String(s.clone()),
        Value::Array(items) => Json::Array(items.iter().map(from_value).collect()),
        Value::Map(pairs) => {
            let mut fields = Map::new();
            for (key, value) in pairs {
                let name = match key {
                    Value::Text(s) => s.clone(),
                    other => from_value(other).to_string(),
                };
                fields.insert(name, from_value(value));
            }
            Json::Object(fields)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_convert_both_ways() {
        let json = json!({"Category": "A", "Price": 10, "Tags": ["x", null, true]});
        let value = to_value(&json).unwrap();
        assert_eq!(value.get("Price"), Some(&Value::Integer(10)));
        assert_eq!(from_value(&value), json);
    }

    #[test]
    fn floats_are_rejected() {
        assert_eq!(
            to_value(&json!({"Price": 1.5})),
            Err(JsonError::Float("1.5".to_string()))
        );
        assert!(matches!(
            to_value(&json!(u64::MAX)),
            Err(JsonError::OutOfRange(_))
        ));
    }
}
