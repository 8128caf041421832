//! Scripted reasoning backend for tests.

use crate::model::{
    ArtifactId, BackendError, ReasoningClient, RunResult, SessionHandle, SessionRequest,
    ToolCallRequest, ToolCallResult,
};
use crate::structured::StructuredContract;
use catalog::ToolSpec;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Everything the fake backend was asked to do.
#[derive(Debug, Default)]
pub struct Log {
    pub sessions: Vec<OpenedSession>,
    pub messages: Vec<String>,
    /// Session id each message was posted to, parallel to `messages`.
    pub posted_to: Vec<String>,
    pub runs: Vec<(String, Option<StructuredContract>)>,
    pub submissions: Vec<(String, Vec<ToolCallResult>)>,
}

#[derive(Debug)]
pub struct OpenedSession {
    pub tools: Vec<String>,
    pub capabilities: Vec<ToolSpec>,
    pub system_instruction: String,
    pub artifacts: Vec<ArtifactId>,
    pub owner_id: Option<String>,
}

/// Replays a fixed sequence of run outcomes, one per `run` or
/// `submit_tool_outputs`.
pub struct FakeClient {
    script: Mutex<VecDeque<Result<RunResult, BackendError>>>,
    log: Arc<Mutex<Log>>,
}

impl FakeClient {
    pub fn new(script: impl IntoIterator<Item = Result<RunResult, BackendError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            log: Arc::default(),
        }
    }

    pub fn replying(runs: impl IntoIterator<Item = RunResult>) -> Self {
        Self::new(runs.into_iter().map(Ok))
    }

    pub fn log(&self) -> Arc<Mutex<Log>> {
        Arc::clone(&self.log)
    }

    fn next(&self) -> Result<RunResult, BackendError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Api("script exhausted".into())))
    }
}

pub fn call(id: &str, tool: &str, raw_arguments: &str) -> ToolCallRequest {
    ToolCallRequest {
        call_id: id.into(),
        tool_name: tool.into(),
        raw_arguments: raw_arguments.into(),
    }
}

impl ReasoningClient for FakeClient {
    async fn create_session(
        &self,
        request: SessionRequest<'_>,
    ) -> Result<SessionHandle, BackendError> {
        let mut log = self.log.lock().unwrap();
        log.sessions.push(OpenedSession {
            tools: request.capabilities.iter().map(|spec| spec.name.clone()).collect(),
            capabilities: request.capabilities.to_vec(),
            system_instruction: request.system_instruction.to_string(),
            artifacts: request.artifacts.to_vec(),
            owner_id: request.owner_id.map(str::to_string),
        });
        Ok(SessionHandle {
            session_id: format!("thread_{}", log.sessions.len()),
            agent_id: "asst_fake".into(),
        })
    }

    async fn post_message(&self, session: &SessionHandle, text: &str) -> Result<(), BackendError> {
        let mut log = self.log.lock().unwrap();
        log.messages.push(text.to_string());
        log.posted_to.push(session.session_id.clone());
        Ok(())
    }

    async fn run(
        &self,
        _session: &SessionHandle,
        extra_instructions: &str,
        contract: Option<&StructuredContract>,
    ) -> Result<RunResult, BackendError> {
        self.log
            .lock()
            .unwrap()
            .runs
            .push((extra_instructions.to_string(), contract.cloned()));
        self.next()
    }

    async fn submit_tool_outputs(
        &self,
        _session: &SessionHandle,
        run_id: &str,
        results: &[ToolCallResult],
    ) -> Result<RunResult, BackendError> {
        self.log
            .lock()
            .unwrap()
            .submissions
            .push((run_id.to_string(), results.to_vec()));
        self.next()
    }
}
