//! Single-session generation orchestrator.
//!
//! State machine: `Idle → AwaitingResponse → Idle`. Exactly one request is
//! in flight per session; a second `submit` while awaiting is rejected with
//! [`GenerateError::Busy`] rather than queued. There is no cancellation: a
//! session reset bumps the epoch and the eventual reply for a stale epoch
//! is silently dropped.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::llm::{LlmClient, Message};
use crate::unit::{ConversationTurn, GenerationResult};

use super::parser;
use super::prompts;

#[derive(Debug, Error)]
pub enum GenerateError {
    /// A submit arrived while a previous one was still awaiting its reply.
    #[error("a generation request is already in flight for this session")]
    Busy,
    /// Transport or API failure from the external generation service.
    #[error("generation request failed: {0}")]
    Llm(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    AwaitingResponse,
}

pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    /// Capability vocabulary baked into the creation prompt.
    vocabulary: Vec<String>,
    state: Cell<SessionState>,
    /// Bumped on reset; replies carrying an older epoch are dropped.
    epoch: Cell<u64>,
    turns: RefCell<Vec<ConversationTurn>>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, vocabulary: Vec<String>) -> Self {
        Self {
            llm,
            vocabulary,
            state: Cell::new(SessionState::Idle),
            epoch: Cell::new(0),
            turns: RefCell::new(Vec::new()),
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.state.get() == SessionState::AwaitingResponse
    }

    /// Session transcript so far (cleared on [`reset`](Self::reset)).
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.borrow().clone()
    }

    /// Starts a fresh authoring session. A reply still in flight for the
    /// old session will be dropped when it arrives.
    pub fn reset(&self) {
        self.epoch.set(self.epoch.get() + 1);
        self.state.set(SessionState::Idle);
        self.turns.borrow_mut().clear();
        debug!("session reset (epoch {})", self.epoch.get());
    }

    /// Sends one request and parses the reply.
    ///
    /// Returns `Ok(None)` when the session was reset while the request was
    /// in flight — the stale reply is dropped without touching the session.
    /// A reply without extractable source is *not* an error; the caller
    /// checks [`GenerationResult::has_source`].
    pub async fn submit(
        &self,
        user_text: &str,
        fix_mode: bool,
    ) -> Result<Option<GenerationResult>, GenerateError> {
        if self.is_awaiting() {
            return Err(GenerateError::Busy);
        }
        let epoch = self.epoch.get();
        self.state.set(SessionState::AwaitingResponse);
        self.turns.borrow_mut().push(ConversationTurn::user(user_text));

        let system = if fix_mode {
            prompts::fix_prompt().to_string()
        } else {
            prompts::create_prompt(&self.vocabulary)
        };
        let messages = [Message::user(user_text)];

        info!(
            "Submitting {} request ({} chars)",
            if fix_mode { "fix" } else { "creation" },
            user_text.len()
        );
        let outcome = self.llm.complete(&system, &messages).await;

        if self.epoch.get() != epoch {
            debug!("dropping stale generation reply (session was reset)");
            return Ok(None);
        }
        self.state.set(SessionState::Idle);

        let response = outcome.map_err(GenerateError::Llm)?;
        self.turns
            .borrow_mut()
            .push(ConversationTurn::assistant(&response.text));

        let parsed = parser::parse_reply(&response.text);
        if parsed.truncated {
            tracing::warn!(
                "reply appears truncated (no closing fence) — consider raising max_tokens_per_request"
            );
        }
        info!(
            "Parsed reply: {} {} ({} source chars, truncated: {})",
            parsed.glyph,
            parsed.name,
            parsed.source.len(),
            parsed.truncated
        );

        Ok(Some(GenerationResult {
            narrative: response.text,
            name: parsed.name,
            description: parsed.description,
            glyph: parsed.glyph,
            source: parsed.source,
            truncated: parsed.truncated,
        }))
    }
}
