//! The conversation round loop.
//!
//! An [`Orchestrator`] owns the backend client and the loop limits. Each
//! [`Conversation`] it opens is a single backend session driven one exchange
//! at a time:
//!
//! ```text
//! Created -> AwaitingBackend -> DispatchingTools <-> AwaitingBackend -> Completed | Failed
//! ```
//!
//! Per-call tool failures are reported to the backend as tool output. Only a
//! failed run, a backend error, the round cap or exhausted structured retries
//! end an exchange with an error, and any of them fails the conversation.

use crate::config::OrchestratorConfig;
use crate::model::{
    ReasoningClient, RunResult, RunStatus, SessionHandle, SessionRequest, Usage,
};
use crate::session::{
    ConversationId, ConversationState, SessionContext, SessionOwner, SessionSetup,
};
use crate::structured::{StructuredContract, Violation};
use crate::tools::{ToolRegistry, dispatch_round};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

/// The answer to one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Response {
    /// Free-form text, returned when no contract was requested.
    Text(String),
    /// A decoded reply that satisfied the structured contract.
    Structured(Value),
}

impl Response {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// Drives conversations against a reasoning backend.
pub struct Orchestrator<C> {
    client: C,
    config: OrchestratorConfig,
}

impl<C: ReasoningClient> Orchestrator<C> {
    pub fn new(client: C) -> Self {
        Self::with_config(client, OrchestratorConfig::default())
    }

    pub fn with_config(client: C, config: OrchestratorConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Open a backend session advertising the registry's catalog.
    ///
    /// Parameters named by the setup's hidden arguments are left out of the
    /// advertised catalog, since the session supplies them. The setup's
    /// priming text, if any, is posted as the first message.
    pub async fn open(
        &self,
        registry: Arc<ToolRegistry>,
        setup: SessionSetup,
    ) -> Result<Conversation<'_, C>> {
        let id = ConversationId::new();
        let session_keys: Vec<&str> =
            setup.context.hidden_arguments.keys().map(String::as_str).collect();
        let catalog = registry.catalog_hiding(&session_keys);

        let handle = self
            .client
            .create_session(SessionRequest {
                capabilities: &catalog,
                system_instruction: &setup.system_instruction,
                artifacts: &setup.artifacts,
                owner_id: setup.owner_id.as_deref(),
            })
            .await
            .inspect_err(|e| {
                tracing::error!(conversation = %id, error = %e, "failed to open session")
            })?;

        tracing::debug!(
            conversation = %id,
            session = %handle.session_id,
            tools = catalog.len(),
            artifacts = setup.artifacts.len(),
            "opened session"
        );

        if let Some(priming) = &setup.priming {
            self.client.post_message(&handle, priming).await?;
        }

        Ok(self.conversation(id, registry, handle, setup))
    }

    /// Continue an existing backend session.
    ///
    /// The backend already holds the session's capabilities and history, so
    /// nothing is created and the setup's priming is not posted again. Only
    /// its hidden arguments and extra instructions are used.
    pub fn resume(
        &self,
        registry: Arc<ToolRegistry>,
        handle: SessionHandle,
        setup: SessionSetup,
    ) -> Conversation<'_, C> {
        let id = ConversationId::new();
        tracing::debug!(conversation = %id, session = %handle.session_id, "resumed session");
        self.conversation(id, registry, handle, setup)
    }

    fn conversation(
        &self,
        id: ConversationId,
        registry: Arc<ToolRegistry>,
        handle: SessionHandle,
        setup: SessionSetup,
    ) -> Conversation<'_, C> {
        Conversation {
            id,
            orchestrator: self,
            registry,
            handle,
            context: setup.context,
            extra_instructions: setup.extra_instructions,
            state: ConversationState::Created,
            usage: Usage::default(),
        }
    }

    /// Open a session for `owner` and run a single exchange in it.
    pub async fn send_message<O: SessionOwner + ?Sized>(
        &self,
        owner: &O,
        text: &str,
        registry: Arc<ToolRegistry>,
        contract: Option<&StructuredContract>,
    ) -> Result<Response> {
        let mut conversation = self.open(registry, SessionSetup::for_owner(owner)).await?;
        conversation.send_message(text, contract).await
    }
}

/// One backend session and its round state.
pub struct Conversation<'a, C> {
    id: ConversationId,
    orchestrator: &'a Orchestrator<C>,
    registry: Arc<ToolRegistry>,
    handle: SessionHandle,
    context: SessionContext,
    extra_instructions: String,
    state: ConversationState,
    usage: Usage,
}

impl<C: ReasoningClient> Conversation<'_, C> {
    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Tokens reported by the backend across every run so far.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Post `text` and drive the backend until it answers.
    ///
    /// A completed conversation accepts further messages; a failed one
    /// rejects them with [`Error::InvalidState`].
    pub async fn send_message(
        &mut self,
        text: &str,
        contract: Option<&StructuredContract>,
    ) -> Result<Response> {
        if self.state == ConversationState::Failed {
            return Err(Error::InvalidState(format!(
                "conversation {} has failed",
                self.id
            )));
        }

        let span = tracing::debug_span!("exchange", conversation = %self.id);
        let outcome = self.exchange(text, contract).instrument(span).await;

        match &outcome {
            Ok(_) => self.transition(ConversationState::Completed),
            Err(e) => {
                tracing::error!(conversation = %self.id, error = %e, "conversation failed");
                self.transition(ConversationState::Failed);
            }
        }
        outcome
    }

    async fn exchange(
        &mut self,
        text: &str,
        contract: Option<&StructuredContract>,
    ) -> Result<Response> {
        let orchestrator = self.orchestrator;
        let client = &orchestrator.client;
        let config = &orchestrator.config;
        let max_attempts = config.structured_retries.saturating_add(1);

        self.transition(ConversationState::AwaitingBackend);
        client.post_message(&self.handle, text).await?;

        let mut attempt = 1;
        let mut rounds = 0;
        let mut run = client.run(&self.handle, &self.extra_instructions, contract).await?;

        loop {
            self.record_usage(&run);
            tracing::debug!(run = %run.run_id, status = ?run.status, "run settled");

            match run.status {
                RunStatus::RequiresAction => {
                    rounds += 1;
                    if rounds > config.max_rounds {
                        return Err(Error::RoundLimitExceeded {
                            limit: config.max_rounds,
                        });
                    }

                    self.transition(ConversationState::DispatchingTools);
                    tracing::debug!(
                        round = rounds,
                        calls = run.pending_calls.len(),
                        "dispatching tool calls"
                    );
                    let results = dispatch_round(
                        &self.registry,
                        &self.context.hidden_arguments,
                        &run.pending_calls,
                        config.dispatch_options(),
                    )
                    .await;

                    self.transition(ConversationState::AwaitingBackend);
                    run = client
                        .submit_tool_outputs(&self.handle, &run.run_id, &results)
                        .await?;
                }
                RunStatus::Failed => {
                    let reason = run
                        .failure
                        .take()
                        .unwrap_or_else(|| format!("run {} failed", run.run_id));
                    return Err(Error::RunFailed(reason));
                }
                RunStatus::Completed => {
                    let answer = run.final_text.take().unwrap_or_default();
                    let Some(contract) = contract else {
                        return Ok(Response::Text(answer));
                    };

                    let violation = match contract.check(&answer) {
                        Ok(payload) => return Ok(Response::Structured(payload)),
                        Err(violation) => violation,
                    };
                    if attempt >= max_attempts {
                        return Err(Error::StructuredValidation {
                            attempts: attempt,
                            missing: violation.missing(contract).to_vec(),
                        });
                    }

                    tracing::warn!(
                        attempt,
                        max_attempts,
                        %violation,
                        "structured reply rejected, retrying"
                    );
                    if config.retry_feedback {
                        client
                            .post_message(&self.handle, &retry_feedback(contract, &violation))
                            .await?;
                    }
                    attempt += 1;
                    run = client.run(&self.handle, &self.extra_instructions, Some(contract)).await?;
                }
            }
        }
    }

    fn record_usage(&mut self, run: &RunResult) {
        if let Some(usage) = run.usage {
            self.usage += usage;
        }
    }

    fn transition(&mut self, next: ConversationState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "conversation state");
            self.state = next;
        }
    }
}

fn retry_feedback(contract: &StructuredContract, violation: &Violation) -> String {
    format!(
        "Your previous reply was rejected: {violation}. {}",
        contract.instruction()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactId, BackendError};
    use crate::testing::{FakeClient, call};
    use crate::tools::{TOOL_ERROR_OUTPUT, ToolArguments, ToolError};
    use catalog::FunctionSignature;
    use serde_json::{Map, json};

    struct Member;

    impl SessionOwner for Member {
        fn owner_id(&self) -> String {
            "user-7".into()
        }

        fn hidden_arguments(&self) -> Map<String, Value> {
            let mut args = Map::new();
            args.insert("user".into(), json!(7));
            args
        }

        fn context_summary(&self) -> Option<String> {
            Some("Alex is a member of the Berlin hive.".into())
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::with_hidden(["user"]);
        registry
            .register(
                &FunctionSignature::new("get_parents")
                    .doc("Find the parents of a task.\n:param task_id: The task to inspect.")
                    .param::<u64>("task_id")
                    .param::<u64>("user"),
                |args: ToolArguments| async move {
                    let task: u64 = args.require("task_id")?;
                    let user: u64 = args.require("user")?;
                    Ok::<_, ToolError>(format!("task {task} for user {user}: parents [1, 5]"))
                },
            )
            .unwrap();
        registry
            .register(&FunctionSignature::new("explode"), |_args: ToolArguments| async move {
                Err::<String, _>(ToolError::execution("boom"))
            })
            .unwrap();
        Arc::new(registry)
    }

    fn parents_contract() -> StructuredContract {
        StructuredContract::new(["parents", "is_found_parents"])
    }

    #[tokio::test]
    async fn tool_round_then_text_answer() {
        let client = FakeClient::replying([
            RunResult::requires_action(
                "run_1",
                vec![
                    call("c1", "get_parents", r#"{"task_id": 3}"#),
                    call("c2", "explode", "{}"),
                    call("c3", "get_parents", r#"{"task_id": 4}"#),
                ],
            ),
            RunResult::completed("run_1", "Task 3 has parents 1 and 5."),
        ]);
        let log = client.log();
        let orchestrator = Orchestrator::new(client);

        let setup = SessionSetup::default().with_hidden_argument("user", 7);
        let mut conversation = orchestrator.open(registry(), setup).await.unwrap();
        assert_eq!(conversation.state(), ConversationState::Created);

        let response = conversation
            .send_message("Who are the parents of task 3?", None)
            .await
            .unwrap();

        assert_eq!(response, Response::Text("Task 3 has parents 1 and 5.".into()));
        assert_eq!(conversation.state(), ConversationState::Completed);

        let log = log.lock().unwrap();
        assert_eq!(log.runs.len(), 1);
        assert_eq!(log.submissions.len(), 1);
        let (run_id, results) = &log.submissions[0];
        assert_eq!(run_id, "run_1");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].call_id, "c1");
        assert_eq!(results[0].output_text, "task 3 for user 7: parents [1, 5]");
        assert_eq!(results[1].output_text, TOOL_ERROR_OUTPUT);
        assert_eq!(results[2].call_id, "c3");
    }

    #[tokio::test]
    async fn owner_context_reaches_session_and_tools() {
        let client = FakeClient::replying([
            RunResult::requires_action(
                "run_1",
                vec![call("c1", "get_parents", r#"{"task_id": 3}"#)],
            ),
            RunResult::completed("run_1", "done"),
        ]);
        let log = client.log();
        let orchestrator = Orchestrator::new(client);

        let response = orchestrator
            .send_message(&Member, "Who are the parents of task 3?", registry(), None)
            .await
            .unwrap();
        assert_eq!(response.as_text(), Some("done"));

        let log = log.lock().unwrap();
        let session = &log.sessions[0];
        assert_eq!(session.tools, ["get_parents", "explode"]);
        assert_eq!(session.owner_id.as_deref(), Some("user-7"));
        assert_eq!(
            log.messages,
            ["Alex is a member of the Berlin hive.", "Who are the parents of task 3?"]
        );
        assert_eq!(
            log.submissions[0].1[0].output_text,
            "task 3 for user 7: parents [1, 5]"
        );
    }

    #[tokio::test]
    async fn backend_supplied_hidden_values_are_overridden() {
        let client = FakeClient::replying([
            RunResult::requires_action(
                "run_1",
                vec![call("c1", "get_parents", r#"{"task_id": 3, "user": 99}"#)],
            ),
            RunResult::completed("run_1", "done"),
        ]);
        let log = client.log();
        let orchestrator = Orchestrator::new(client);

        orchestrator
            .send_message(&Member, "parents?", registry(), None)
            .await
            .unwrap();

        let log = log.lock().unwrap();
        assert_eq!(
            log.submissions[0].1[0].output_text,
            "task 3 for user 7: parents [1, 5]"
        );
    }

    #[tokio::test]
    async fn structured_reply_is_retried_then_rejected() {
        let missing_parents = r#"{"is_found_parents": true}"#;
        let client = FakeClient::replying([
            RunResult::completed("run_1", missing_parents),
            RunResult::completed("run_2", missing_parents),
            RunResult::completed("run_3", missing_parents),
        ]);
        let log = client.log();
        let orchestrator = Orchestrator::new(client);
        let contract = parents_contract();

        let mut conversation = orchestrator
            .open(registry(), SessionSetup::default())
            .await
            .unwrap();
        let err = conversation
            .send_message("Find the parents of task 3", Some(&contract))
            .await
            .unwrap_err();

        match err {
            Error::StructuredValidation { attempts, missing } => {
                assert_eq!(attempts, 3);
                assert_eq!(missing, ["parents"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(conversation.state(), ConversationState::Failed);

        let log = log.lock().unwrap();
        // One initial run plus the two configured retries.
        assert_eq!(log.runs.len(), 3);
        assert!(log.runs.iter().all(|(_, c)| c.as_ref() == Some(&contract)));
        assert_eq!(log.messages.len(), 3);
        assert!(log.messages[1].contains("missing keys: parents"));
    }

    #[tokio::test]
    async fn retry_count_follows_config() {
        let client = FakeClient::replying([
            RunResult::completed("run_1", "{}"),
            RunResult::completed("run_2", "{}"),
        ]);
        let log = client.log();
        let config = OrchestratorConfig {
            structured_retries: 0,
            retry_feedback: false,
            ..OrchestratorConfig::default()
        };
        let orchestrator = Orchestrator::with_config(client, config);

        let mut conversation = orchestrator
            .open(registry(), SessionSetup::default())
            .await
            .unwrap();
        let err = conversation
            .send_message("parents?", Some(&parents_contract()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::StructuredValidation { attempts: 1, .. }));
        let log = log.lock().unwrap();
        assert_eq!(log.runs.len(), 1);
        assert_eq!(log.messages.len(), 1);
    }

    #[tokio::test]
    async fn structured_reply_accepted_after_retry() {
        let client = FakeClient::replying([
            RunResult::completed("run_1", "The parents are 1 and 5."),
            RunResult::completed("run_2", r#"{"parents": [1, 5], "is_found_parents": true}"#),
        ]);
        let log = client.log();
        let orchestrator = Orchestrator::new(client);

        let mut conversation = orchestrator
            .open(registry(), SessionSetup::default())
            .await
            .unwrap();
        let response = conversation
            .send_message("parents?", Some(&parents_contract()))
            .await
            .unwrap();

        assert_eq!(
            response.as_structured(),
            Some(&json!({"parents": [1, 5], "is_found_parents": true}))
        );
        assert_eq!(log.lock().unwrap().runs.len(), 2);
    }

    #[tokio::test]
    async fn endless_tool_requests_hit_round_limit() {
        let round = || RunResult::requires_action("run_1", vec![call("c1", "explode", "{}")]);
        let client = FakeClient::replying([round(), round(), round(), round()]);
        let log = client.log();
        let config = OrchestratorConfig {
            max_rounds: 2,
            ..OrchestratorConfig::default()
        };
        let orchestrator = Orchestrator::with_config(client, config);

        let mut conversation = orchestrator
            .open(registry(), SessionSetup::default())
            .await
            .unwrap();
        let err = conversation.send_message("loop", None).await.unwrap_err();

        assert!(matches!(err, Error::RoundLimitExceeded { limit: 2 }));
        assert_eq!(conversation.state(), ConversationState::Failed);
        assert_eq!(log.lock().unwrap().submissions.len(), 2);
    }

    #[tokio::test]
    async fn failed_run_is_not_retried() {
        let client = FakeClient::replying([RunResult::failed("run_1", "rate limited")]);
        let log = client.log();
        let orchestrator = Orchestrator::new(client);

        let mut conversation = orchestrator
            .open(registry(), SessionSetup::default())
            .await
            .unwrap();
        let err = conversation
            .send_message("parents?", Some(&parents_contract()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RunFailed(ref reason) if reason == "rate limited"));
        assert_eq!(log.lock().unwrap().runs.len(), 1);

        let again = conversation.send_message("hello?", None).await.unwrap_err();
        assert!(matches!(again, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn backend_errors_surface_unchanged() {
        let client = FakeClient::new([Err(BackendError::Network("connection reset".into()))]);
        let orchestrator = Orchestrator::new(client);

        let mut conversation = orchestrator
            .open(registry(), SessionSetup::default())
            .await
            .unwrap();
        let err = conversation.send_message("hi", None).await.unwrap_err();

        assert!(matches!(err, Error::Backend(BackendError::Network(_))));
        assert_eq!(conversation.state(), ConversationState::Failed);
    }

    #[tokio::test]
    async fn completed_conversation_accepts_more_messages() {
        let client = FakeClient::replying([
            RunResult::completed("run_1", "first").with_usage(Usage {
                prompt_tokens: 100,
                completion_tokens: 20,
            }),
            RunResult::requires_action(
                "run_2",
                vec![call("c1", "get_parents", r#"{"task_id": 1}"#)],
            )
            .with_usage(Usage {
                prompt_tokens: 50,
                completion_tokens: 5,
            }),
            RunResult::completed("run_2", "second").with_usage(Usage {
                prompt_tokens: 60,
                completion_tokens: 10,
            }),
        ]);
        let orchestrator = Orchestrator::new(client);

        let mut conversation = orchestrator
            .open(registry(), SessionSetup::default())
            .await
            .unwrap();
        conversation.send_message("one", None).await.unwrap();
        let second = conversation.send_message("two", None).await.unwrap();

        assert_eq!(second.as_text(), Some("second"));
        assert_eq!(conversation.state(), ConversationState::Completed);
        assert_eq!(
            conversation.usage(),
            Usage {
                prompt_tokens: 210,
                completion_tokens: 35
            }
        );
    }

    #[tokio::test]
    async fn setup_is_passed_to_backend() {
        let client = FakeClient::replying([RunResult::completed("run_1", "ok")]);
        let log = client.log();
        let orchestrator = Orchestrator::new(client);
        let setup = SessionSetup::new("You manage hives.")
            .with_extra_instructions("Answer in German.")
            .with_priming("Context: three hives.");
        let setup = SessionSetup {
            artifacts: vec![ArtifactId::from("file_1")],
            ..setup
        };

        let mut conversation = orchestrator.open(registry(), setup).await.unwrap();
        conversation.send_message("hi", None).await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.sessions[0].system_instruction, "You manage hives.");
        assert_eq!(log.sessions[0].artifacts, [ArtifactId::from("file_1")]);
        assert_eq!(log.messages, ["Context: three hives.", "hi"]);
        assert_eq!(log.runs[0], ("Answer in German.".to_string(), None));
    }

    #[tokio::test]
    async fn session_keys_are_not_advertised() {
        let client = FakeClient::replying([
            RunResult::requires_action(
                "run_1",
                vec![call("c1", "get_parents", r#"{"task_id": 3}"#)],
            ),
            RunResult::completed("run_1", "done"),
        ]);
        let log = client.log();
        let orchestrator = Orchestrator::new(client);

        let setup = SessionSetup::default().with_hidden_argument("user", 7);
        let mut conversation = orchestrator.open(registry(), setup).await.unwrap();
        conversation.send_message("parents?", None).await.unwrap();

        let log = log.lock().unwrap();
        let get_parents = &log.sessions[0].capabilities[0];
        assert_eq!(get_parents.name, "get_parents");
        assert!(get_parents.parameter("user").is_none());
        assert_eq!(get_parents.required(), ["task_id"]);
        assert_eq!(
            log.submissions[0].1[0].output_text,
            "task 3 for user 7: parents [1, 5]"
        );
    }

    #[tokio::test]
    async fn resumed_conversation_reuses_session() {
        let client = FakeClient::replying([
            RunResult::requires_action(
                "run_1",
                vec![call("c1", "get_parents", r#"{"task_id": 2}"#)],
            ),
            RunResult::completed("run_1", "welcome back"),
        ]);
        let log = client.log();
        let orchestrator = Orchestrator::new(client);
        let handle = SessionHandle {
            session_id: "thread_42".into(),
            agent_id: "asst_1".into(),
        };
        let setup = SessionSetup::default()
            .with_priming("Context: three hives.")
            .with_extra_instructions("Answer in German.")
            .with_hidden_argument("user", 7);

        let mut conversation = orchestrator.resume(registry(), handle, setup);
        assert_eq!(conversation.state(), ConversationState::Created);
        assert_eq!(conversation.handle().session_id, "thread_42");

        let response = conversation.send_message("hi", None).await.unwrap();
        assert_eq!(response.as_text(), Some("welcome back"));

        let log = log.lock().unwrap();
        assert!(log.sessions.is_empty());
        assert_eq!(log.messages, ["hi"]);
        assert_eq!(log.posted_to, ["thread_42"]);
        assert_eq!(log.runs[0].0, "Answer in German.");
        assert_eq!(
            log.submissions[0].1[0].output_text,
            "task 2 for user 7: parents [1, 5]"
        );
    }

    #[test]
    fn response_envelope_shape() {
        let response = Response::Structured(json!({"parents": []}));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"kind": "structured", "payload": {"parents": []}})
        );
        assert_eq!(
            serde_json::to_value(Response::Text("hi".into())).unwrap(),
            json!({"kind": "text", "payload": "hi"})
        );
    }
}
