//! Core data model: generated units, conversation turns, generation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One AI-authored component.
///
/// The identity is assigned once and never changes; the source is immutable
/// after creation. A fix or an edit produces a *new* unit with a fresh
/// identity — the runtime never mutates an existing unit in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedUnit {
    pub identity: Uuid,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glyph: Option<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GeneratedUnit {
    /// Creates a unit from a parsed generation result, with a fresh identity.
    pub fn from_result(result: &GenerationResult) -> Self {
        let now = Utc::now();
        Self {
            identity: Uuid::new_v4(),
            name: result.name.clone(),
            description: result.description.clone(),
            glyph: Some(result.glyph.clone()),
            source: result.source.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Display label, glyph included when present.
    pub fn label(&self) -> String {
        match &self.glyph {
            Some(g) => format!("{g} {}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One entry of a session transcript. Append-only, never mutated;
/// the whole sequence is dropped when the session resets.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            role: Role::Assistant,
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Parsed outcome of one generation request/response cycle. Transient —
/// produced per reply, never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// The full reply text, for the transcript.
    pub narrative: String,
    pub name: String,
    pub description: String,
    pub glyph: String,
    /// Extracted source, possibly empty when the reply carried no code block.
    pub source: String,
    /// Set when the reply had an opening fence with no closing fence.
    pub truncated: bool,
}

impl GenerationResult {
    /// A reply without any extractable source is not an error; the caller
    /// checks this before attempting a load.
    pub fn has_source(&self) -> bool {
        !self.source.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> GenerationResult {
        GenerationResult {
            narrative: "🧮 Calculator Pro - A simple calculator".to_string(),
            name: "Calculator Pro".to_string(),
            description: "A simple calculator".to_string(),
            glyph: "🧮".to_string(),
            source: "local C = function() end\nreturn C".to_string(),
            truncated: false,
        }
    }

    #[test]
    fn test_from_result_assigns_fresh_identity() {
        let r = result();
        let a = GeneratedUnit::from_result(&r);
        let b = GeneratedUnit::from_result(&r);
        assert_ne!(a.identity, b.identity);
        assert_eq!(a.name, "Calculator Pro");
        assert_eq!(a.glyph.as_deref(), Some("🧮"));
    }

    #[test]
    fn test_has_source() {
        let mut r = result();
        assert!(r.has_source());
        r.source = "  \n ".to_string();
        assert!(!r.has_source());
    }

    #[test]
    fn test_label_with_glyph() {
        let unit = GeneratedUnit::from_result(&result());
        assert_eq!(unit.label(), "🧮 Calculator Pro");
    }

    #[test]
    fn test_unit_json_round_trip() {
        let unit = GeneratedUnit::from_result(&result());
        let json = serde_json::to_string(&unit).unwrap();
        let back: GeneratedUnit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unit);
    }
}
