pub mod anthropic;
pub mod client;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;

use serde::{Deserialize, Serialize};

/// One message of the conversation sent to the LLM.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// LLM response with metadata
#[derive(Debug)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}
