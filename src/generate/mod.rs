//! Generation loop: prompt construction, reply parsing, and the
//! single-session orchestrator driving the external LLM service.

pub mod orchestrator;
pub mod parser;
pub mod prompts;

pub use orchestrator::{GenerateError, Orchestrator};
pub use parser::{parse_reply, ParsedReply};
