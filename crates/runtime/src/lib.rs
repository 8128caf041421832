//! Switchboard runtime: tool-calling conversations with a reasoning backend.
//!
//! This crate drives a conversation in which a remote reasoning backend may
//! request host-defined tools, and optionally demands a structured answer.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **ToolRegistry**: compiled tool specs bound to async tool functions, plus
//!   the hidden parameters the host fills in itself.
//! - **ReasoningClient**: a trait abstracting the remote backend (sessions,
//!   messages, runs and tool output submission).
//! - **Orchestrator**: the round loop. It dispatches every requested tool call
//!   (failures become tool output, never errors), enforces a round cap and
//!   retries structured answers that miss required keys.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{
//!     AssistantsClient, Config, FunctionSignature, Orchestrator, SessionSetup,
//!     StructuredContract, ToolArguments, ToolError, ToolRegistry,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> runtime::Result<()> {
//! let config = Config::load("switchboard.toml")?;
//!
//! let mut registry = ToolRegistry::with_hidden(["user"]);
//! registry.register(
//!     &FunctionSignature::new("get_parents")
//!         .doc("Find the parents of a task.\n:param task_id: The task to inspect.")
//!         .param::<u64>("task_id")
//!         .param::<u64>("user"),
//!     |args: ToolArguments| async move {
//!         let task: u64 = args.require("task_id")?;
//!         Ok::<_, ToolError>(format!("task {task} has parents [1, 5]"))
//!     },
//! )?;
//!
//! let client = AssistantsClient::from_config(&config.backend)?;
//! let orchestrator = Orchestrator::with_config(client, config.orchestrator);
//!
//! let setup = SessionSetup::default().with_hidden_argument("user", 7);
//! let mut conversation = orchestrator.open(Arc::new(registry), setup).await?;
//! let contract = StructuredContract::new(["parents", "is_found_parents"]);
//! let response = conversation
//!     .send_message("Who are the parents of task 3?", Some(&contract))
//!     .await?;
//! println!("{response:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod model;
mod orchestrator;
pub mod providers;
mod session;
pub mod structured;
pub mod tools;

#[cfg(test)]
mod testing;

// Capability catalog
pub use catalog::{FunctionSignature, ParamType, ToolSpec, TypeHint};

// Configuration
pub use config::{BackendConfig, Config, ConfigError, OrchestratorConfig};

// Error types
pub use error::{Error, Result};

// Backend protocol
pub use model::{
    ArtifactId, BackendError, ReasoningClient, RunResult, RunStatus, SessionHandle,
    SessionRequest, ToolCallRequest, ToolCallResult, Usage,
};

// Conversation round loop
pub use orchestrator::{Conversation, Orchestrator, Response};

// Backend adapters
pub use providers::{AssistantsClient, AssistantsClientBuilder};

// Sessions and host collaborators
pub use session::{
    ArtifactSource, ConversationId, ConversationState, DEFAULT_SYSTEM_INSTRUCTION,
    SessionContext, SessionOwner, SessionSetup,
};

// Structured output
pub use structured::{StructuredContract, Violation, validate};

// Tools
pub use tools::{
    DispatchOptions, TOOL_ERROR_OUTPUT, ToolArguments, ToolError, ToolFunction, ToolRegistry,
    dispatch_round,
};
