//! LLM client abstraction
//!
//! `LlmClient` is the provider seam; `Reasoner` layers a timeout and the
//! single-turn `chat(prompt) -> text` contract the planners consume.

mod client;
mod error;
mod openai;
mod reasoner;
mod types;

use std::sync::Arc;

use tracing::debug;

#[cfg(test)]
pub use client::mock;
pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use reasoner::{Reasoner, extract_json, strip_code_fences};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Create an LLM client for the configured provider
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "openai" | "openai-compatible" => {
            debug!("create_client: openai branch");
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        other => {
            debug!(%other, "create_client: unknown provider branch");
            Err(LlmError::InvalidResponse(format!("Unknown LLM provider: {}", other)))
        }
    }
}
