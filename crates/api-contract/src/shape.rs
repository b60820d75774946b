use std::collections::BTreeMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scalar {
    Null,
    Boolean,
    Number,
    String,
    /// Nesting beyond the depth limit.
    Object,
}

impl Scalar {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Boolean => "boolean",
            Scalar::Number => "number",
            Scalar::String => "string",
            Scalar::Object => "object",
        }
    }
}

/// Type-only skeleton of a JSON value.
///
/// Serialises the way the tools report shapes: scalars as type names, arrays as
/// `{"$array": <element>}` and empty arrays as `"array"`.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Scalar(Scalar),
    Object(BTreeMap<String, Shape>),
    Array(Box<Shape>),
    AnyArray,
}

impl Shape {
    /// Arrays take the shape of their first element.
    pub fn extract(value: &Value, max_depth: usize) -> Shape {
        Self::extract_at(value, 0, max_depth)
    }

    fn extract_at(value: &Value, depth: usize, max_depth: usize) -> Shape {
        if depth > max_depth {
            return Shape::Scalar(Scalar::Object);
        }
        match value {
            Value::Null => Shape::Scalar(Scalar::Null),
            Value::Bool(_) => Shape::Scalar(Scalar::Boolean),
            Value::Number(_) => Shape::Scalar(Scalar::Number),
            Value::String(_) => Shape::Scalar(Scalar::String),
            Value::Array(items) => match items.first() {
                Some(first) => Shape::Array(Box::new(Self::extract_at(first, depth + 1, max_depth))),
                None => Shape::AnyArray,
            },
            Value::Object(map) => Shape::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::extract_at(v, depth + 1, max_depth)))
                    .collect(),
            ),
        }
    }

    /// Coarse type name used in violation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Shape::Scalar(s) => s.as_str(),
            Shape::Object(_) => "object",
            Shape::Array(_) | Shape::AnyArray => "array",
        }
    }

    /// Union of object fields; on any other mismatch the established side wins.
    pub fn merge(&self, incoming: &Shape) -> Shape {
        match (self, incoming) {
            (Shape::Object(existing), Shape::Object(new)) => {
                let mut merged = existing.clone();
                for (key, shape) in new {
                    let next = match merged.get(key) {
                        Some(current) => current.merge(shape),
                        None => shape.clone(),
                    };
                    merged.insert(key.clone(), next);
                }
                Shape::Object(merged)
            }
            (Shape::Array(existing), Shape::Array(new)) => Shape::Array(Box::new(existing.merge(new))),
            (Shape::AnyArray, Shape::Array(new)) => Shape::Array(new.clone()),
            _ => self.clone(),
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Shape>> {
        match self {
            Shape::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for Shape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Shape::Scalar(s) => serializer.serialize_str(s.as_str()),
            Shape::AnyArray => serializer.serialize_str("array"),
            Shape::Array(inner) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$array", inner)?;
                map.end()
            }
            Shape::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn extracts_wire_form() {
        let shape = Shape::extract(
            &json!({"id": 1, "tags": ["a"], "empty": [], "meta": null, "ok": true}),
            3,
        );
        assert_eq!(
            shape.to_value(),
            json!({
                "id": "number",
                "tags": {"$array": "string"},
                "empty": "array",
                "meta": "null",
                "ok": "boolean"
            })
        );
    }

    #[test]
    fn deep_nesting_truncates_to_object() {
        let shape = Shape::extract(&json!({"a": {"b": {"c": {"d": {"e": 1}}}}}), 3);
        assert_eq!(shape.to_value(), json!({"a": {"b": {"c": {"d": "object"}}}}));
    }

    #[test]
    fn merge_unions_fields_and_keeps_established_types() {
        let a = Shape::extract(&json!({"id": 1, "name": "x"}), 3);
        let b = Shape::extract(&json!({"id": "1", "email": "e"}), 3);
        assert_eq!(
            a.merge(&b).to_value(),
            json!({"id": "number", "name": "string", "email": "string"})
        );
    }
}
