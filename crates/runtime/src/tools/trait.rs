//! Tool function trait.

use super::{ToolArguments, ToolError};
use async_trait::async_trait;
use std::future::Future;

/// A host operation the reasoning backend may request.
///
/// Implementations receive the decoded arguments with hidden session values
/// already merged in, and return the text handed back to the backend. Any
/// closure `Fn(ToolArguments) -> impl Future<Output = Result<String, ToolError>>`
/// is a tool function.
#[async_trait]
pub trait ToolFunction: Send + Sync {
    async fn call(&self, args: ToolArguments) -> Result<String, ToolError>;
}

#[async_trait]
impl<F, Fut> ToolFunction for F
where
    F: Fn(ToolArguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
{
    async fn call(&self, args: ToolArguments) -> Result<String, ToolError> {
        (self)(args).await
    }
}
