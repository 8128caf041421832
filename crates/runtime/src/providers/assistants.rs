//! Assistants-style threads/runs API backend.

use crate::config::{BackendConfig, ConfigError};
use crate::model::{
    ArtifactId, BackendError, ReasoningClient, RunResult, RunStatus, SessionHandle,
    SessionRequest, ToolCallRequest, ToolCallResult, Usage,
};
use crate::structured::StructuredContract;
use catalog::ToolSpec;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

const ASSISTANTS_BETA_HEADER: &str = "assistants=v2";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiAssistantRequest<'a> {
    model: &'a str,
    name: &'a str,
    instructions: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_resources: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiTool {
    Function { function: Value },
    FileSearch,
}

#[derive(Debug, Serialize)]
struct ApiVectorStoreRequest<'a> {
    file_ids: &'a [ArtifactId],
}

#[derive(Debug, Serialize)]
struct ApiThreadRequest {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
struct ApiMessageRequest<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiRunRequest<'a> {
    assistant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ApiSubmitRequest<'a> {
    tool_outputs: Vec<ApiToolOutput<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiToolOutput<'a> {
    tool_call_id: &'a str,
    output: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiRun {
    id: String,
    status: ApiRunStatus,
    #[serde(default)]
    required_action: Option<ApiRequiredAction>,
    #[serde(default)]
    last_error: Option<ApiRunError>,
    #[serde(default)]
    incomplete_details: Option<ApiIncompleteDetails>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ApiRunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl ApiRunStatus {
    /// The settled status, or `None` while the run is still moving.
    fn settled(self) -> Option<RunStatus> {
        match self {
            Self::Completed => Some(RunStatus::Completed),
            Self::RequiresAction => Some(RunStatus::RequiresAction),
            Self::Failed | Self::Cancelled | Self::Expired | Self::Incomplete => {
                Some(RunStatus::Failed)
            }
            Self::Queued | Self::InProgress | Self::Cancelling | Self::Unknown => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiRequiredAction {
    submit_tool_outputs: ApiSubmitToolOutputs,
}

#[derive(Debug, Deserialize)]
struct ApiSubmitToolOutputs {
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiRunError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiIncompleteDetails {
    reason: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiMessageList {
    data: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Vec<ApiContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: ApiText,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ApiText {
    value: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an [`AssistantsClient`].
#[derive(Debug, Clone)]
pub struct AssistantsClientBuilder {
    api_key: String,
    base_url: String,
    model: String,
    assistant_name: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl AssistantsClientBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        let defaults = BackendConfig::default();
        let poll_interval = defaults.poll_interval();
        let poll_timeout = defaults.poll_timeout();
        Self {
            api_key: api_key.into(),
            base_url: defaults.base_url,
            model: defaults.model,
            assistant_name: defaults.assistant_name,
            poll_interval,
            poll_timeout,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn build(self) -> AssistantsClient {
        AssistantsClient {
            http: reqwest::Client::new(),
            api_key: self.api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            model: self.model,
            assistant_name: self.assistant_name,
            poll_interval: self.poll_interval,
            poll_timeout: self.poll_timeout,
        }
    }
}

/// Reasoning backend speaking an Assistants-style REST API.
///
/// Each session gets its own assistant (carrying the tool catalog) and thread.
/// Runs are polled until they complete, fail or ask for tool outputs.
pub struct AssistantsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    assistant_name: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl AssistantsClient {
    pub fn builder(api_key: impl Into<String>) -> AssistantsClientBuilder {
        AssistantsClientBuilder::new(api_key)
    }

    /// Build a client from configuration. Fails if no API key is available.
    pub fn from_config(config: &BackendConfig) -> Result<Self, ConfigError> {
        Ok(Self::builder(config.api_key()?)
            .base_url(&config.base_url)
            .model(&config.model)
            .assistant_name(&config.assistant_name)
            .poll_interval(config.poll_interval())
            .poll_timeout(config.poll_timeout())
            .build())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", ASSISTANTS_BETA_HEADER)
            .header("content-type", "application/json")
            .header("accept", "application/json")
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        Self::send(self.authorize(self.http.post(self.url(path))).json(body)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        Self::send(self.authorize(self.http.get(self.url(path)))).await
    }

    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, BackendError> {
        let response = req
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("{status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiTool {
        ApiTool::Function {
            function: spec.to_function_schema(),
        }
    }

    fn run_request<'a>(
        assistant_id: &'a str,
        extra_instructions: &str,
        contract: Option<&StructuredContract>,
    ) -> ApiRunRequest<'a> {
        let mut instructions: Vec<String> = Vec::new();
        if !extra_instructions.trim().is_empty() {
            instructions.push(extra_instructions.to_string());
        }
        if let Some(contract) = contract {
            instructions.push(contract.instruction());
        }

        ApiRunRequest {
            assistant_id,
            additional_instructions: (!instructions.is_empty()).then(|| instructions.join("\n\n")),
            response_format: contract.map(|_| json!({"type": "json_object"})),
        }
    }

    async fn create_vector_store(&self, artifacts: &[ArtifactId]) -> Result<String, BackendError> {
        let store: ApiObject = self
            .post("vector_stores", &ApiVectorStoreRequest { file_ids: artifacts })
            .await?;
        tracing::debug!(vector_store = %store.id, files = artifacts.len(), "created vector store");
        Ok(store.id)
    }

    /// Poll until the run settles or the poll timeout elapses.
    async fn settle(&self, thread_id: &str, mut run: ApiRun) -> Result<RunResult, BackendError> {
        let deadline = Instant::now() + self.poll_timeout;
        loop {
            if let Some(status) = run.status.settled() {
                let final_text = match status {
                    RunStatus::Completed => Some(self.latest_message(thread_id).await?),
                    _ => None,
                };
                return Ok(into_run_result(run, status, final_text));
            }
            if Instant::now() >= deadline {
                tracing::error!(run = %run.id, status = ?run.status, "run did not settle");
                return Err(BackendError::Timeout(self.poll_timeout));
            }
            tokio::time::sleep(self.poll_interval).await;
            run = self.get(&format!("threads/{thread_id}/runs/{}", run.id)).await?;
        }
    }

    async fn latest_message(&self, thread_id: &str) -> Result<String, BackendError> {
        let list: ApiMessageList = self
            .get(&format!("threads/{thread_id}/messages?order=desc&limit=1"))
            .await?;
        let message = list
            .data
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("completed run left no message".into()))?;
        Ok(message_text(message))
    }
}

fn into_run_result(run: ApiRun, status: RunStatus, final_text: Option<String>) -> RunResult {
    let pending_calls = run
        .required_action
        .map(|action| {
            action
                .submit_tool_outputs
                .tool_calls
                .into_iter()
                .map(|call| ToolCallRequest {
                    call_id: call.id,
                    tool_name: call.function.name,
                    raw_arguments: call.function.arguments,
                })
                .collect()
        })
        .unwrap_or_default();

    let failure = match status {
        RunStatus::Failed => Some(
            run.last_error
                .map(|e| format!("{}: {}", e.code, e.message))
                .or_else(|| run.incomplete_details.map(|d| format!("incomplete: {}", d.reason)))
                .unwrap_or_else(|| format!("run ended with status {:?}", run.status)),
        ),
        _ => None,
    };

    RunResult {
        run_id: run.id,
        status,
        pending_calls,
        final_text,
        failure,
        usage: run.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }),
    }
}

fn message_text(message: ApiMessage) -> String {
    message
        .content
        .into_iter()
        .filter_map(|block| match block {
            ApiContentBlock::Text { text } => Some(text.value),
            ApiContentBlock::Unknown => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl std::fmt::Display for AssistantsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "assistants({}, {})", self.model, self.base_url)
    }
}

impl ReasoningClient for AssistantsClient {
    async fn create_session(
        &self,
        request: SessionRequest<'_>,
    ) -> Result<SessionHandle, BackendError> {
        let mut tools: Vec<ApiTool> = request.capabilities.iter().map(Self::tool_to_api).collect();
        let mut tool_resources = None;
        if !request.artifacts.is_empty() {
            let store_id = self.create_vector_store(request.artifacts).await?;
            tools.push(ApiTool::FileSearch);
            tool_resources = Some(json!({"file_search": {"vector_store_ids": [store_id]}}));
        }

        let assistant: ApiObject = self
            .post(
                "assistants",
                &ApiAssistantRequest {
                    model: &self.model,
                    name: &self.assistant_name,
                    instructions: request.system_instruction,
                    tools,
                    tool_resources,
                },
            )
            .await?;

        let mut metadata = BTreeMap::new();
        if let Some(owner) = request.owner_id {
            metadata.insert("owner", owner.to_string());
        }
        let thread: ApiObject = self.post("threads", &ApiThreadRequest { metadata }).await?;

        tracing::debug!(assistant = %assistant.id, thread = %thread.id, "created session");
        Ok(SessionHandle {
            session_id: thread.id,
            agent_id: assistant.id,
        })
    }

    async fn post_message(&self, session: &SessionHandle, text: &str) -> Result<(), BackendError> {
        let _: ApiObject = self
            .post(
                &format!("threads/{}/messages", session.session_id),
                &ApiMessageRequest {
                    role: "user",
                    content: text,
                },
            )
            .await?;
        Ok(())
    }

    async fn run(
        &self,
        session: &SessionHandle,
        extra_instructions: &str,
        contract: Option<&StructuredContract>,
    ) -> Result<RunResult, BackendError> {
        let request = Self::run_request(&session.agent_id, extra_instructions, contract);
        let run: ApiRun = self
            .post(&format!("threads/{}/runs", session.session_id), &request)
            .await?;
        tracing::debug!(run = %run.id, "started run");
        self.settle(&session.session_id, run).await
    }

    async fn submit_tool_outputs(
        &self,
        session: &SessionHandle,
        run_id: &str,
        results: &[ToolCallResult],
    ) -> Result<RunResult, BackendError> {
        let request = ApiSubmitRequest {
            tool_outputs: results
                .iter()
                .map(|result| ApiToolOutput {
                    tool_call_id: &result.call_id,
                    output: &result.output_text,
                })
                .collect(),
        };
        let run: ApiRun = self
            .post(
                &format!("threads/{}/runs/{run_id}/submit_tool_outputs", session.session_id),
                &request,
            )
            .await?;
        self.settle(&session.session_id, run).await
    }
}
