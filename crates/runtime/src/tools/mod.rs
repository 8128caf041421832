//! Tool functions, registration and dispatch.

mod dispatch;
pub mod errors;
mod registry;
mod r#trait;
mod types;

pub use dispatch::{DispatchOptions, TOOL_ERROR_OUTPUT, dispatch_round};
pub use errors::ToolError;
pub use r#trait::ToolFunction;
pub use registry::{RegisteredTool, ToolRegistry};
pub use types::ToolArguments;
