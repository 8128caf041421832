//! Per-round tool call dispatch.

use super::{ToolArguments, ToolError, ToolFunction, ToolRegistry};
use crate::model::{ToolCallRequest, ToolCallResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Output sent to the backend when a tool call fails.
///
/// The backend only ever sees this generic text; the cause is logged.
pub const TOOL_ERROR_OUTPUT: &str = "Error processing function";

/// How a round's calls are executed.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Upper bound on a single call.
    pub timeout: Duration,
    /// Upper bound on the whole round. Calls still unfinished when it
    /// elapses are abandoned and reported as failed.
    pub round_timeout: Duration,
    /// Run the round's calls concurrently.
    pub parallel: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            round_timeout: Duration::from_secs(120),
            parallel: true,
        }
    }
}

/// Execute every pending call of a round.
///
/// Always returns exactly one result per request, in request order. Decode
/// failures dispatch with an empty argument set; unknown tools, tool errors,
/// timeouts and panics become textual outputs. Nothing escapes the round, and
/// the round never outlasts `options.round_timeout`.
pub async fn dispatch_round(
    registry: &ToolRegistry,
    hidden: &Map<String, Value>,
    calls: &[ToolCallRequest],
    options: DispatchOptions,
) -> Vec<ToolCallResult> {
    let mut results = Vec::with_capacity(calls.len());
    let deadline = Instant::now() + options.round_timeout;

    if options.parallel {
        let pending: Vec<_> = calls
            .iter()
            .map(|call| (call, start(registry, hidden, call, options.timeout)))
            .collect();
        for (call, started) in pending {
            let outcome = finish(started, deadline, options.round_timeout).await;
            results.push(into_result(call, outcome));
        }
    } else {
        for call in calls {
            let outcome = if Instant::now() >= deadline {
                Err(round_timeout_error(options.round_timeout))
            } else {
                let started = start(registry, hidden, call, options.timeout);
                finish(started, deadline, options.round_timeout).await
            };
            results.push(into_result(call, outcome));
        }
    }

    results
}

type Started = Result<JoinHandle<Result<String, ToolError>>, ToolError>;

fn start(
    registry: &ToolRegistry,
    hidden: &Map<String, Value>,
    call: &ToolCallRequest,
    timeout: Duration,
) -> Started {
    let mut args = match ToolArguments::decode(&call.raw_arguments) {
        Ok(args) => args,
        Err(e) => {
            tracing::warn!(
                call_id = %call.call_id,
                tool = %call.tool_name,
                error = %e,
                "dispatching with empty arguments"
            );
            ToolArguments::new()
        }
    };
    args.merge_hidden(hidden);

    let function = registry.resolve(&call.tool_name)?;
    Ok(tokio::spawn(invoke(function, args, timeout)))
}

async fn invoke(
    function: Arc<dyn ToolFunction>,
    args: ToolArguments,
    timeout: Duration,
) -> Result<String, ToolError> {
    match tokio::time::timeout(timeout, function.call(args)).await {
        Ok(result) => result,
        Err(_) => Err(ToolError::Timeout(timeout.as_millis() as u64)),
    }
}

async fn finish(
    started: Started,
    deadline: Instant,
    round_timeout: Duration,
) -> Result<String, ToolError> {
    let mut handle = started?;
    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ToolError::Panicked(e.to_string())),
        Err(_) => {
            handle.abort();
            Err(round_timeout_error(round_timeout))
        }
    }
}

fn round_timeout_error(round_timeout: Duration) -> ToolError {
    ToolError::Timeout(round_timeout.as_millis() as u64)
}

fn into_result(call: &ToolCallRequest, outcome: Result<String, ToolError>) -> ToolCallResult {
    let output_text = match outcome {
        Ok(output) => {
            tracing::debug!(call_id = %call.call_id, tool = %call.tool_name, "tool call succeeded");
            output
        }
        Err(ToolError::NotFound(name)) => {
            tracing::warn!(call_id = %call.call_id, tool = %name, "backend requested unknown tool");
            format!("{TOOL_ERROR_OUTPUT}: tool not found: {name}")
        }
        Err(e @ ToolError::Panicked(_)) => {
            tracing::error!(
                call_id = %call.call_id,
                tool = %call.tool_name,
                error = %e,
                "tool call failed"
            );
            TOOL_ERROR_OUTPUT.to_string()
        }
        Err(e) => {
            tracing::warn!(
                call_id = %call.call_id,
                tool = %call.tool_name,
                error = %e,
                "tool call failed"
            );
            TOOL_ERROR_OUTPUT.to_string()
        }
    };

    ToolCallResult {
        call_id: call.call_id.clone(),
        output_text,
    }
}
