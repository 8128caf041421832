use super::errors::BackendError;
use crate::structured::StructuredContract;
use catalog::ToolSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::ops::AddAssign;

/// Identifier of a host artifact (e.g. an uploaded document) the backend can
/// search while answering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub String);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Backend-side identity of an open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    /// The conversation thread on the backend.
    pub session_id: String,
    /// The backend agent configured with the session's capabilities.
    pub agent_id: String,
}

/// Everything needed to open a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionRequest<'a> {
    pub capabilities: &'a [ToolSpec],
    pub system_instruction: &'a str,
    /// Artifacts to seed the backend's retrieval context with.
    pub artifacts: &'a [ArtifactId],
    /// Opaque identity of whoever owns the session, for backend metadata.
    pub owner_id: Option<&'a str>,
}

/// A tool call requested by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub tool_name: String,
    /// Encoded arguments, decoded by the orchestrator before dispatch.
    pub raw_arguments: String,
}

/// The output returned to the backend for one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,
    pub output_text: String,
}

/// Where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    RequiresAction,
    Failed,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u64 {
        u64::from(self.prompt_tokens) + u64::from(self.completion_tokens)
    }

    /// Cost in USD given per-million-token prices.
    pub fn cost_usd(&self, prompt_per_mtok: f64, completion_per_mtok: f64) -> f64 {
        (f64::from(self.prompt_tokens) * prompt_per_mtok
            + f64::from(self.completion_tokens) * completion_per_mtok)
            / 1_000_000.0
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
    }
}

/// The state a backend run settled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    /// Calls to dispatch when `status` is `RequiresAction`.
    #[serde(default)]
    pub pending_calls: Vec<ToolCallRequest>,
    /// The answer when `status` is `Completed`.
    #[serde(default)]
    pub final_text: Option<String>,
    /// The backend's reason when `status` is `Failed`.
    #[serde(default)]
    pub failure: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl RunResult {
    pub fn completed(run_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::Completed,
            pending_calls: Vec::new(),
            final_text: Some(text.into()),
            failure: None,
            usage: None,
        }
    }

    pub fn requires_action(run_id: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::RequiresAction,
            pending_calls: calls,
            final_text: None,
            failure: None,
            usage: None,
        }
    }

    pub fn failed(run_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::Failed,
            pending_calls: Vec::new(),
            final_text: None,
            failure: Some(reason.into()),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Boundary to the remote reasoning backend.
///
/// Each operation is one blocking step from the orchestrator's point of view:
/// `run` and `submit_tool_outputs` poll internally until the backend either
/// finishes, fails or asks for tool calls.
pub trait ReasoningClient: Send + Sync {
    /// Open a session advertising `request.capabilities`.
    fn create_session(
        &self,
        request: SessionRequest<'_>,
    ) -> impl Future<Output = Result<SessionHandle, BackendError>> + Send;

    /// Append a user message to the session.
    fn post_message(
        &self,
        session: &SessionHandle,
        text: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Start a run and wait for it to settle. A structured contract, when
    /// present, is communicated to the backend as part of the run.
    fn run(
        &self,
        session: &SessionHandle,
        extra_instructions: &str,
        contract: Option<&StructuredContract>,
    ) -> impl Future<Output = Result<RunResult, BackendError>> + Send;

    /// Hand back one output per pending call and wait for the run to settle.
    fn submit_tool_outputs(
        &self,
        session: &SessionHandle,
        run_id: &str,
        results: &[ToolCallResult],
    ) -> impl Future<Output = Result<RunResult, BackendError>> + Send;
}
