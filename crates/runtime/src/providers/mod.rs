//! Reasoning backend adapters.
//!
//! Each provider implements [`ReasoningClient`](crate::model::ReasoningClient)
//! for its specific API.

mod assistants;

pub use assistants::{AssistantsClient, AssistantsClientBuilder};
