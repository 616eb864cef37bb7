//! `LlmClient` trait — abstraction over LLM backends.
//!
//! Providers implement this trait so the generation loop can be configured
//! to use any supported backend via the `[llm] provider` config field.

use anyhow::Result;
use async_trait::async_trait;

use super::{LlmResponse, Message};

/// Abstraction over LLM backends.
///
/// Each provider translates the shared message types into its own wire
/// format and normalizes responses back into [`LlmResponse`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends a conversation to the LLM and returns the response.
    async fn complete(&self, system_prompt: &str, messages: &[Message]) -> Result<LlmResponse>;

    /// Human-readable description of the provider and model.
    ///
    /// Used in status output, e.g. `"anthropic (claude-sonnet-4-5-20250929)"`.
    fn description(&self) -> String;
}
