//! Structured-output contracts and their validation.
//!
//! Validation is intentionally shallow: a reply satisfies a contract when it
//! decodes as JSON and every required key is a top-level field. Value types
//! and nested shapes are not checked.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A required-keys contract for the final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredContract {
    pub required_keys: Vec<String>,
    /// Example reply shown to the backend.
    #[serde(default)]
    pub example: Option<Value>,
}

impl StructuredContract {
    pub fn new(required_keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required_keys: required_keys.into_iter().map(Into::into).collect(),
            example: None,
        }
    }

    /// Build a contract from an example reply; its top-level keys become
    /// the required keys.
    pub fn from_example(example: Value) -> Self {
        let required_keys = example
            .as_object()
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            required_keys,
            example: Some(example),
        }
    }

    pub fn with_example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    /// Instruction text describing the contract to the backend.
    pub fn instruction(&self) -> String {
        let mut text = match &self.example {
            Some(example) => format!("Respond only with a JSON object in this format: {example}"),
            None => "Respond only with a JSON object.".to_string(),
        };
        if !self.required_keys.is_empty() {
            text.push_str(&format!(
                " The object must contain the keys: {}.",
                self.required_keys.join(", ")
            ));
        }
        text
    }

    /// Decode a final answer and check it against the contract.
    pub fn check(&self, final_text: &str) -> Result<Value, Violation> {
        let payload: Value = serde_json::from_str(final_text.trim())
            .map_err(|e| Violation::NotJson(e.to_string()))?;

        let missing: Vec<String> = missing_keys(&payload, &self.required_keys)
            .into_iter()
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(payload)
        } else {
            Err(Violation::MissingKeys(missing))
        }
    }
}

/// Why a final answer did not satisfy its contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    NotJson(String),
    MissingKeys(Vec<String>),
}

impl Violation {
    /// Keys the reply lacked. A reply that is not JSON lacks all of them.
    pub fn missing<'a>(&'a self, contract: &'a StructuredContract) -> &'a [String] {
        match self {
            Self::NotJson(_) => &contract.required_keys,
            Self::MissingKeys(keys) => keys,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotJson(e) => write!(f, "reply is not JSON: {e}"),
            Self::MissingKeys(keys) => write!(f, "reply is missing keys: {}", keys.join(", ")),
        }
    }
}

/// Whether every required key is a top-level field of `payload`.
pub fn validate<S: AsRef<str>>(payload: &Value, required_keys: &[S]) -> bool {
    missing_keys(payload, required_keys).is_empty()
}

/// Required keys absent from `payload`, in contract order.
pub fn missing_keys<'a, S: AsRef<str>>(payload: &Value, required_keys: &'a [S]) -> Vec<&'a str> {
    required_keys
        .iter()
        .map(|key| key.as_ref())
        .filter(|key| payload.get(*key).is_none())
        .collect()
}
