//! Tool argument types.

use super::ToolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded arguments for one tool call.
///
/// Built from the backend's encoded argument string, with the session's
/// hidden arguments merged in before the tool function sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArguments(Map<String, Value>);

impl ToolArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the backend's encoded argument payload.
    ///
    /// A blank payload decodes to an empty set. Anything that is not a JSON
    /// object is an [`ToolError::ArgumentDecode`].
    pub fn decode(raw: &str) -> Result<Self, ToolError> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ToolError::ArgumentDecode(e.to_string()))?;
        Self::try_from(value)
    }

    /// Merge host-injected arguments. Hidden values win over backend values.
    pub fn merge_hidden(&mut self, hidden: &Map<String, Value>) {
        for (name, value) in hidden {
            self.0.insert(name.clone(), value.clone());
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode a required argument.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, ToolError> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| ToolError::invalid_input(format!("missing argument `{name}`")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| ToolError::invalid_input(format!("argument `{name}`: {e}")))
    }

    /// Decode an optional argument. Absent and `null` both yield `None`.
    pub fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ToolError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ToolError::invalid_input(format!("argument `{name}`: {e}"))),
        }
    }

    /// Decode the whole argument set into a typed struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| ToolError::invalid_input(e.to_string()))
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl TryFrom<Value> for ToolArguments {
    type Error = ToolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(ToolError::ArgumentDecode(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
