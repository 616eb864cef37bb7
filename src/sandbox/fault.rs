//! Runtime fault types and the fix-request packager.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPhase {
    Render,
    Update,
}

impl std::fmt::Display for FaultPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultPhase::Render => write!(f, "render"),
            FaultPhase::Update => write!(f, "update"),
        }
    }
}

/// An exception raised during a mounted component's lifecycle. Contained
/// by the fault boundary, never propagated into the host.
#[derive(Debug, Clone, Error)]
#[error("component {phase} failed: {message}")]
pub struct RuntimeFault {
    pub phase: FaultPhase,
    pub message: String,
}

impl RuntimeFault {
    pub fn from_lua(phase: FaultPhase, error: &mlua::Error) -> Self {
        // Callback errors wrap the actual cause; surface the inner message.
        let message = match error {
            mlua::Error::CallbackError { cause, .. } => cause.to_string(),
            other => other.to_string(),
        };
        Self { phase, message }
    }
}

/// A captured fault plus the context needed to request a fix. At most one
/// live record per mounted unit; discarded once a fix request is issued.
#[derive(Debug, Clone)]
pub struct FaultRecord {
    pub message: String,
    pub phase: FaultPhase,
    pub identity: Uuid,
    pub source_snapshot: String,
    pub captured_at: DateTime<Utc>,
}

impl FaultRecord {
    pub fn capture(fault: &RuntimeFault, identity: Uuid, source: &str) -> Self {
        Self {
            message: fault.message.clone(),
            phase: fault.phase,
            identity,
            source_snapshot: source.to_string(),
            captured_at: Utc::now(),
        }
    }
}

/// Serializes a fault plus its originating source into the natural-language
/// fix request re-submitted to the generation loop.
///
/// Pure and deterministic — the capture timestamp is deliberately left out
/// of the payload. Never fails: missing source yields a placeholder line.
pub fn package_fix_request(record: &FaultRecord, display_name: &str) -> String {
    let name = if display_name.trim().is_empty() {
        "generated app"
    } else {
        display_name
    };
    let source = if record.source_snapshot.trim().is_empty() {
        "Code not available"
    } else {
        record.source_snapshot.as_str()
    };
    format!(
        "There's an error in the {name}:\n\n\
         ERROR: {error}\n\n\
         ORIGINAL CODE:\n\
         ```lua\n\
         {source}\n\
         ```\n\n\
         Please fix this error and provide the corrected code.",
        name = name,
        error = record.message,
        source = source,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str) -> FaultRecord {
        FaultRecord::capture(
            &RuntimeFault {
                phase: FaultPhase::Render,
                message: "attempt to call a nil value (global 'Window')".to_string(),
            },
            Uuid::new_v4(),
            source,
        )
    }

    #[test]
    fn test_package_embeds_error_and_source() {
        let text = package_fix_request(&record("local App = function() end\nreturn App"), "Calculator Pro");
        assert!(text.starts_with("There's an error in the Calculator Pro:"));
        assert!(text.contains("ERROR: attempt to call a nil value (global 'Window')"));
        assert!(text.contains("```lua\nlocal App = function() end\nreturn App\n```"));
        assert!(text.ends_with("Please fix this error and provide the corrected code."));
    }

    #[test]
    fn test_package_is_deterministic() {
        let r = record("return x");
        assert_eq!(
            package_fix_request(&r, "App"),
            package_fix_request(&r, "App")
        );
    }

    #[test]
    fn test_empty_source_yields_placeholder() {
        let text = package_fix_request(&record("   "), "App");
        assert!(text.contains("Code not available"));
    }

    #[test]
    fn test_empty_name_yields_placeholder() {
        let text = package_fix_request(&record("return x"), "");
        assert!(text.contains("error in the generated app:"));
    }
}
