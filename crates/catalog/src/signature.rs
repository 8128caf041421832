//! Host function signature metadata.

use crate::hint::{ParamType, TypeHint};
use serde_json::Value;

/// A declared parameter of a host function.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub hint: TypeHint,
    /// Default value, if the host function declares one.
    pub default: Option<Value>,
}

impl Parameter {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Everything the schema compiler needs to know about a host function:
/// its name, its documentation and its ordered parameter list.
///
/// ```
/// use catalog::{FunctionSignature, TypeHint};
///
/// let signature = FunctionSignature::new("update_user_skills")
///     .doc("Updates the user's skills.\n:param skills: Skill names to add.")
///     .param::<Vec<String>>("skills")
///     .param_hint("user", TypeHint::other("User"));
///
/// assert_eq!(signature.params().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    name: String,
    doc: String,
    params: Vec<Parameter>,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: String::new(),
            params: Vec::new(),
        }
    }

    /// Set the documentation. The first line becomes the tool description;
    /// `:param <name>: <text>` lines describe parameters.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Declare a required parameter typed by a Rust type.
    pub fn param<T: ParamType + ?Sized>(self, name: impl Into<String>) -> Self {
        self.param_hint(name, T::type_hint())
    }

    /// Declare a parameter typed by a Rust type, with a default value.
    pub fn param_with_default<T: ParamType + ?Sized>(
        self,
        name: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        self.push(name.into(), T::type_hint(), Some(default.into()))
    }

    /// Declare a parameter with an explicit type hint.
    pub fn param_hint(self, name: impl Into<String>, hint: TypeHint) -> Self {
        self.push(name.into(), hint, None)
    }

    /// Declare a parameter with an explicit type hint and a default value.
    pub fn param_hint_with_default(
        self,
        name: impl Into<String>,
        hint: TypeHint,
        default: impl Into<Value>,
    ) -> Self {
        self.push(name.into(), hint, Some(default.into()))
    }

    fn push(mut self, name: String, hint: TypeHint, default: Option<Value>) -> Self {
        // Redeclaring a name replaces it in place, like rebinding an argument.
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(existing) => {
                existing.hint = hint;
                existing.default = default;
            }
            None => self.params.push(Parameter {
                name,
                hint,
                default,
            }),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documentation(&self) -> &str {
        &self.doc
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_keeps_declaration_order() {
        let signature = FunctionSignature::new("create_certificate")
            .param::<String>("title")
            .param::<String>("institution")
            .param_with_default::<Option<String>>("date_earned", Value::Null);

        let names: Vec<_> = signature.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["title", "institution", "date_earned"]);
        assert!(signature.params()[2].has_default());
    }

    #[test]
    fn redeclared_parameter_replaces_previous() {
        let signature = FunctionSignature::new("f")
            .param::<i64>("b")
            .param_with_default::<i64>("b", json!(3));

        assert_eq!(signature.params().len(), 1);
        assert_eq!(signature.params()[0].default, Some(json!(3)));
    }
}
