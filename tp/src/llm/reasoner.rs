//! Reasoner - single-turn chat with a wall-clock budget

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{CompletionRequest, LlmClient, LlmError};

const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert travel planner. Follow the requested output format exactly.";

/// Wraps an [`LlmClient`] as a `chat(prompt) -> text` call
///
/// Every call is bounded by `timeout`; an elapsed timer resolves to
/// [`LlmError::Timeout`] rather than hanging the pipeline. Callers pick the
/// degraded value they want on error.
#[derive(Clone)]
pub struct Reasoner {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
    max_tokens: u32,
    system_prompt: String,
}

impl Reasoner {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        debug!(model = %client.model(), ?timeout, "Reasoner::new: called");
        Self {
            client,
            timeout,
            max_tokens: 4096,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one prompt and return the text of the reply
    pub async fn chat(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(prompt_len = prompt.len(), "Reasoner::chat: called");
        let request = CompletionRequest::prompt(self.system_prompt.clone(), prompt, self.max_tokens);

        match tokio::time::timeout(self.timeout, self.client.complete(request)).await {
            Err(_) => {
                warn!(timeout = ?self.timeout, "Reasoning call timed out");
                Err(LlmError::Timeout(self.timeout))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Reasoning call failed");
                Err(e)
            }
            Ok(Ok(response)) => {
                debug!(usage = response.usage.total(), "Reasoner::chat: response received");
                response
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| LlmError::InvalidResponse("Empty completion".to_string()))
            }
        }
    }
}

/// Remove a surrounding markdown code fence (```json ... ```)
pub fn strip_code_fences(text: &str) -> &str {
    debug!(len = text.len(), "strip_code_fences: called");
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```") {
        debug!("strip_code_fences: opening fence branch");
        cleaned = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
    }
    if let Some(rest) = cleaned.trim_end().strip_suffix("```") {
        debug!("strip_code_fences: closing fence branch");
        cleaned = rest;
    }
    cleaned.trim()
}

/// Best-effort JSON payload from a model reply
///
/// Strips code fences, then if prose surrounds the payload, slices from the
/// first opening bracket to the last closing one.
pub fn extract_json(text: &str) -> &str {
    let cleaned = strip_code_fences(text);
    if cleaned.starts_with('[') || cleaned.starts_with('{') {
        return cleaned;
    }
    debug!("extract_json: payload embedded in prose");
    let start = cleaned.find(['[', '{']);
    let end = cleaned.rfind([']', '}']);
    match (start, end) {
        (Some(s), Some(e)) if e > s => &cleaned[s..=e],
        _ => cleaned,
    }
}
