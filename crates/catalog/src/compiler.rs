//! Signature to capability compilation.

use crate::hint::TypeHint;
use crate::signature::FunctionSignature;
use crate::spec::{JsonType, ParamSchema, ToolParameterSpec, ToolSpec};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Description used when a function has no documentation.
pub const DEFAULT_TOOL_DESCRIPTION: &str = "No detailed description.";

/// Description used when a parameter has no `:param` line.
pub const DEFAULT_PARAM_DESCRIPTION: &str = "No description provided.";

static PARAM_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":param (\w+): (.+)").expect("param marker pattern is valid"));

/// Compile a host function signature into a [`ToolSpec`].
///
/// Parameters named in `hidden` are supplied by the host at dispatch time and
/// are left out of the advertised schema. A parameter is required when it has
/// no default, is not nullable and is not hidden.
///
/// Compilation is pure: the same inputs always produce the same spec.
pub fn compile<I, S>(signature: &FunctionSignature, hidden: I) -> ToolSpec
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let hidden: HashSet<String> = hidden
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .collect();

    let doc = signature.documentation();
    let descriptions = param_descriptions(doc);

    let parameters = signature
        .params()
        .iter()
        .filter(|param| !hidden.contains(&param.name))
        .map(|param| ToolParameterSpec {
            name: param.name.clone(),
            description: descriptions
                .get(param.name.as_str())
                .cloned()
                .unwrap_or_else(|| DEFAULT_PARAM_DESCRIPTION.to_string()),
            required: !param.has_default() && !param.hint.is_optional(),
            schema: schema_for(&param.hint),
        })
        .collect();

    ToolSpec {
        name: signature.name().to_string(),
        description: summary_line(doc),
        parameters,
    }
}

/// Map a declared type to its JSON-schema form.
pub fn schema_for(hint: &TypeHint) -> ParamSchema {
    match hint {
        TypeHint::Integer => ParamSchema::scalar(JsonType::Integer),
        TypeHint::Float | TypeHint::Complex => ParamSchema::scalar(JsonType::Number),
        TypeHint::Boolean => ParamSchema::scalar(JsonType::Boolean),
        TypeHint::Null => ParamSchema::scalar(JsonType::Null),
        TypeHint::Optional(inner) => schema_for(inner),
        TypeHint::Sequence(_, item) => ParamSchema::array(schema_for(item)),
        TypeHint::Mapping(key, value) => ParamSchema::map(schema_for(key), schema_for(value)),
        TypeHint::String | TypeHint::Other(_) => ParamSchema::scalar(JsonType::String),
    }
}

fn summary_line(doc: &str) -> String {
    doc.trim()
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .unwrap_or(DEFAULT_TOOL_DESCRIPTION)
        .to_string()
}

fn param_descriptions(doc: &str) -> HashMap<&str, String> {
    let body = doc.trim().split_once('\n').map(|(_, rest)| rest).unwrap_or("");

    PARAM_MARKER
        .captures_iter(body)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let text = caps.get(2)?.as_str().trim();
            Some((name, text.to_string()))
        })
        .filter(|(_, text)| !text.is_empty())
        .collect()
}
