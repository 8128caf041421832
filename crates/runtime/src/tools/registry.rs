//! Name to tool function bindings.

use super::{ToolError, ToolFunction};
use crate::{Error, Result};
use catalog::{FunctionSignature, ToolSpec, compile};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// A compiled tool spec and the function it dispatches to.
#[derive(Clone)]
pub struct RegisteredTool {
    pub spec: ToolSpec,
    function: Arc<dyn ToolFunction>,
}

/// Holds the tools available to a conversation.
///
/// Populated once at setup through `&mut self`, then shared read-only (behind
/// an `Arc`) by the orchestrator and the dispatch tasks of each round.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
    hidden: BTreeSet<String>,
}

impl ToolRegistry {
    /// Create an empty registry with no hidden parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry whose tools all hide the given parameters.
    pub fn with_hidden(hidden: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            hidden: hidden.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parameter names supplied by the host rather than the backend.
    pub fn hidden_parameters(&self) -> impl Iterator<Item = &str> {
        self.hidden.iter().map(String::as_str)
    }

    /// Compile `signature` and bind it to `function`.
    ///
    /// Fails with [`Error::DuplicateToolName`] if the name is taken, in which
    /// case the registry is left untouched.
    pub fn register(
        &mut self,
        signature: &FunctionSignature,
        function: impl ToolFunction + 'static,
    ) -> Result<()> {
        self.register_with_hidden(signature, function, std::iter::empty::<String>())
    }

    /// Like [`register`](Self::register), hiding extra parameters of this
    /// tool only. Tools registered later are unaffected.
    pub fn register_with_hidden(
        &mut self,
        signature: &FunctionSignature,
        function: impl ToolFunction + 'static,
        hidden: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<()> {
        let name = signature.name();
        if self.index.contains_key(name) {
            return Err(Error::DuplicateToolName(name.to_string()));
        }

        let mut hidden_names = self.hidden.clone();
        hidden_names.extend(hidden.into_iter().map(Into::into));
        let spec = compile(signature, &hidden_names);

        tracing::debug!(
            tool = %spec.name,
            parameters = spec.parameters.len(),
            "registered tool"
        );

        self.index.insert(spec.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            spec,
            function: Arc::new(function),
        });
        Ok(())
    }

    /// Look up the function bound to `name`.
    pub fn resolve(&self, name: &str) -> std::result::Result<Arc<dyn ToolFunction>, ToolError> {
        self.get(name)
            .map(|tool| Arc::clone(&tool.function))
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// The advertised capabilities, in registration order.
    pub fn catalog(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec.clone()).collect()
    }

    /// The catalog with `names` also dropped from every tool.
    ///
    /// Used to keep values the session injects out of what the backend sees.
    pub fn catalog_hiding<S: AsRef<str>>(&self, names: &[S]) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|tool| {
                let mut spec = tool.spec.clone();
                spec.parameters
                    .retain(|param| !names.iter().any(|name| name.as_ref() == param.name));
                spec
            })
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.spec.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names().collect::<Vec<_>>())
            .field("hidden", &self.hidden)
            .finish()
    }
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}
