//! Typed access to `tools/call` arguments.

use gasoline_core_types::{ToolError, ToolResult};
use gasoline_ring::Cursor;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

static EMPTY: Lazy<Map<String, Value>> = Lazy::new(Map::new);

#[derive(Clone, Copy)]
pub(crate) struct Args<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    pub(crate) fn new(value: &'a Value) -> Self {
        match value.as_object() {
            Some(map) => Self { map },
            None => Self { map: &EMPTY },
        }
    }

    pub(crate) fn raw(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    pub(crate) fn str(&self, name: &str) -> ToolResult<Option<&'a str>> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str()).filter(|s| !s.is_empty())),
            Some(_) => Err(ToolError::invalid_param(name, format!("'{name}' must be a string"))),
        }
    }

    pub(crate) fn required_str(&self, name: &str) -> ToolResult<&'a str> {
        self.str(name)?.ok_or_else(|| ToolError::missing_param(name))
    }

    /// Integers may also arrive as numeric strings.
    pub(crate) fn u64(&self, name: &str) -> ToolResult<Option<u64>> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| ToolError::invalid_param(name, format!("'{name}' must be a non-negative integer"))),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ToolError::invalid_param(name, format!("'{name}' must be a non-negative integer"))),
            Some(_) => Err(ToolError::invalid_param(name, format!("'{name}' must be a non-negative integer"))),
        }
    }

    pub(crate) fn usize(&self, name: &str) -> ToolResult<Option<usize>> {
        Ok(self.u64(name)?.map(|n| n as usize))
    }

    pub(crate) fn u16(&self, name: &str) -> ToolResult<Option<u16>> {
        match self.u64(name)? {
            None => Ok(None),
            Some(n) => u16::try_from(n)
                .map(Some)
                .map_err(|_| ToolError::invalid_param(name, format!("'{name}' is out of range"))),
        }
    }

    pub(crate) fn bool(&self, name: &str) -> ToolResult<bool> {
        match self.raw(name) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(ToolError::invalid_param(name, format!("'{name}' must be a boolean"))),
        }
    }

    /// A single string or an array of strings.
    pub(crate) fn strings(&self, name: &str) -> ToolResult<Vec<String>> {
        match self.raw(name) {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ToolError::invalid_param(name, format!("'{name}' must contain strings")))
                })
                .collect(),
            Some(_) => Err(ToolError::invalid_param(name, format!("'{name}' must be a string or a list of strings"))),
        }
    }

    /// Cursors travel as the ring position they resume from.
    pub(crate) fn cursor(&self, name: &str) -> ToolResult<Option<Cursor>> {
        Ok(self.u64(name)?.map(Cursor::at))
    }

    /// Selects a mode and rejects values outside `valid`.
    pub(crate) fn mode(&self, name: &str, valid: &[&str]) -> ToolResult<&'a str> {
        let value = self.required_str(name)?;
        if valid.contains(&value) {
            Ok(value)
        } else {
            Err(ToolError::unknown_mode(name, value, valid))
        }
    }

    pub(crate) fn parse<T: DeserializeOwned>(&self, name: &str) -> ToolResult<Option<T>> {
        match self.raw(name) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|err| ToolError::invalid_param(name, format!("invalid '{name}': {err}"))),
        }
    }

    /// Every argument except `skip`, for forwarding to the extension.
    pub(crate) fn without(&self, skip: &[&str]) -> Value {
        Value::Object(
            self.map
                .iter()
                .filter(|(k, _)| !skip.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasoline_core_types::ErrorCode;
    use serde_json::json;

    #[test]
    fn typed_getters_validate() {
        let value = json!({"limit": "25", "flag": true, "name": 3, "levels": ["error", "warn"]});
        let args = Args::new(&value);
        assert_eq!(args.usize("limit").expect("limit"), Some(25));
        assert!(args.bool("flag").expect("flag"));
        assert!(!args.bool("missing").expect("missing"));
        assert_eq!(args.str("name").unwrap_err().code, ErrorCode::InvalidParam);
        assert_eq!(args.strings("levels").expect("levels"), vec!["error", "warn"]);
        assert_eq!(args.required_str("what").unwrap_err().code, ErrorCode::MissingParam);
    }

    #[test]
    fn mode_lists_valid_values() {
        let value = json!({"what": "nope"});
        let err = Args::new(&value).mode("what", &["logs", "errors"]).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownMode);
        assert_eq!(err.valid_values, vec!["logs", "errors"]);
    }
}
