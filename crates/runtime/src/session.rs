//! Per-conversation state and host collaborators.

use crate::model::ArtifactId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// System instruction used when the host does not supply one.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful assistant. \
Use the provided functions to look up or change the user's data instead of guessing.";

/// Locally unique identifier of a conversation, used to correlate log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a conversation is in its round loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Created,
    AwaitingBackend,
    DispatchingTools,
    Completed,
    Failed,
}

impl ConversationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Host-injected values merged into every dispatched call.
///
/// These never appear in an advertised `ToolSpec`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub hidden_arguments: Map<String, Value>,
}

impl SessionContext {
    pub fn new(hidden_arguments: Map<String, Value>) -> Self {
        Self { hidden_arguments }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.hidden_arguments.insert(name.into(), value.into());
    }
}

/// Whoever a conversation is held on behalf of (typically the acting user).
pub trait SessionOwner: Send + Sync {
    /// Opaque identity, recorded as backend session metadata.
    fn owner_id(&self) -> String;

    /// Values injected into every tool call, e.g. the acting user's id.
    fn hidden_arguments(&self) -> Map<String, Value>;

    /// Readable background about the owner, sent as the session's first message.
    fn context_summary(&self) -> Option<String> {
        None
    }
}

/// Documents the backend may search while answering.
pub trait ArtifactSource: Send + Sync {
    fn list_available_artifacts(&self, scope_id: &str) -> Vec<ArtifactId>;
}

/// Everything needed to open a conversation.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub system_instruction: String,
    /// Appended to every run of the conversation.
    pub extra_instructions: String,
    /// Posted as an ordinary first message when the session opens.
    pub priming: Option<String>,
    pub context: SessionContext,
    pub artifacts: Vec<ArtifactId>,
    pub owner_id: Option<String>,
}

impl Default for SessionSetup {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_INSTRUCTION)
    }
}

impl SessionSetup {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            extra_instructions: String::new(),
            priming: None,
            context: SessionContext::default(),
            artifacts: Vec::new(),
            owner_id: None,
        }
    }

    /// Setup carrying the owner's identity, hidden values and context summary.
    pub fn for_owner<O: SessionOwner + ?Sized>(owner: &O) -> Self {
        Self {
            priming: owner.context_summary(),
            context: SessionContext::new(owner.hidden_arguments()),
            owner_id: Some(owner.owner_id()),
            ..Self::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_extra_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.extra_instructions = instructions.into();
        self
    }

    pub fn with_priming(mut self, priming: impl Into<String>) -> Self {
        self.priming = Some(priming.into());
        self
    }

    pub fn with_hidden_argument(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.context.insert(name, value);
        self
    }

    /// Seed retrieval context from `source`. Consulted once, here.
    pub fn with_artifacts_from<A: ArtifactSource + ?Sized>(
        mut self,
        source: &A,
        scope_id: &str,
    ) -> Self {
        let artifacts = source.list_available_artifacts(scope_id);
        tracing::debug!(scope_id, count = artifacts.len(), "seeding artifacts");
        self.artifacts.extend(artifacts);
        self
    }
}
