//! Compiled capability descriptions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// JSON-schema primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Integer,
    Number,
    Boolean,
    String,
    Null,
    Array,
    Object,
}

impl JsonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Null => "null",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The compiled schema of a single parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamSchema {
    Scalar { json_type: JsonType },
    Array { items: Box<ParamSchema> },
    /// Key/value sub-schema for mapping types.
    Map {
        key: Box<ParamSchema>,
        value: Box<ParamSchema>,
    },
}

impl ParamSchema {
    pub fn scalar(json_type: JsonType) -> Self {
        Self::Scalar { json_type }
    }

    pub fn array(items: ParamSchema) -> Self {
        Self::Array {
            items: Box::new(items),
        }
    }

    pub fn map(key: ParamSchema, value: ParamSchema) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn json_type(&self) -> JsonType {
        match self {
            Self::Scalar { json_type } => *json_type,
            Self::Array { .. } => JsonType::Array,
            Self::Map { .. } => JsonType::Object,
        }
    }

    /// Render as a JSON-schema fragment.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar { json_type } => json!({ "type": json_type }),
            Self::Array { items } => json!({
                "type": JsonType::Array,
                "items": items.to_json(),
            }),
            Self::Map { key, value } => json!({
                "type": JsonType::Object,
                "properties": {
                    "key": key.to_json(),
                    "value": value.to_json(),
                },
            }),
        }
    }
}

/// A parameter as advertised to the reasoning backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameterSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub schema: ParamSchema,
}

impl ToolParameterSpec {
    pub fn json_type(&self) -> JsonType {
        self.schema.json_type()
    }

    /// The property entry for this parameter, description included.
    pub fn to_property(&self) -> Value {
        let mut property = self.schema.to_json();
        if let Value::Object(fields) = &mut property {
            fields.insert(
                "description".to_string(),
                Value::String(self.description.clone()),
            );
        }
        property
    }
}

/// A tool definition exposed to the reasoning backend.
///
/// Hidden (host-injected) parameters never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameterSpec>,
}

impl ToolSpec {
    pub fn parameter(&self, name: &str) -> Option<&ToolParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Names of required parameters, in declaration order.
    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// The `{"type": "object", "properties", "required"}` parameter schema.
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_property()))
            .collect();

        json!({
            "type": JsonType::Object,
            "properties": properties,
            "required": self.required(),
        })
    }

    /// The function-schema shape backends consume.
    pub fn to_function_schema(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters_schema(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_schema_has_key_value_properties() {
        let schema = ParamSchema::map(
            ParamSchema::scalar(JsonType::String),
            ParamSchema::array(ParamSchema::scalar(JsonType::Integer)),
        );
        assert_eq!(schema.json_type(), JsonType::Object);
        assert_eq!(
            schema.to_json(),
            json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string"},
                    "value": {"type": "array", "items": {"type": "integer"}},
                },
            })
        );
    }

    #[test]
    fn function_schema_shape() {
        let spec = ToolSpec {
            name: "get_server_skills".into(),
            description: "List skills.".into(),
            parameters: vec![ToolParameterSpec {
                name: "limit".into(),
                description: "Page size".into(),
                required: false,
                schema: ParamSchema::scalar(JsonType::Integer),
            }],
        };

        assert_eq!(
            spec.to_function_schema(),
            json!({
                "name": "get_server_skills",
                "description": "List skills.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "limit": {"type": "integer", "description": "Page size"},
                    },
                    "required": [],
                },
            })
        );
    }
}
