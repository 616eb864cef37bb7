//! Rewrites raw generated source into a chunk body the sandbox can evaluate.
//!
//! Generated components are Luau, but code models carry JS habits: import
//! lines and `export default`. Normalization strips the former, rewrites the
//! latter into a `return`, and synthesizes a trailing `return` of the first
//! top-level binding when the chunk does not already return anything.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// No top-level return and no binding whose name could be returned.
    #[error("no component binding found in generated source")]
    NoComponent,
}

/// Normalizes raw source into an evaluable chunk body.
///
/// Rules, applied in order:
/// 1. drop every module-import line — the sandbox supplies all external names
/// 2. rewrite `export default X` into `return X`
/// 3. if no top-level `return` remains, append `return <first binding>`
pub fn normalize(raw: &str) -> Result<String, NormalizeError> {
    let mut lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim_start();
        if is_import_line(trimmed) {
            continue;
        }
        if let Some(ident) = export_default_ident(trimmed) {
            lines.push(format!("return {ident}"));
            continue;
        }
        lines.push(line.to_string());
    }

    // Only a column-zero `return` counts: indented returns belong to nested
    // function bodies, not to the chunk itself.
    let has_top_level_return = lines.iter().any(|l| is_return_line(l));

    if !has_top_level_return {
        match find_binding(&lines) {
            Some(name) => lines.push(format!("return {name}")),
            None => return Err(NormalizeError::NoComponent),
        }
    }

    Ok(lines.join("\n"))
}

/// Lines that import a name from an external module. Covers the Luau
/// `require` forms and the JS `import` habit.
fn is_import_line(trimmed: &str) -> bool {
    if trimmed.starts_with("import ") {
        return true;
    }
    if trimmed.starts_with("require(") || trimmed.starts_with("require \"") || trimmed.starts_with("require '") {
        return true;
    }
    if let Some(rest) = trimmed.strip_prefix("local ") {
        if let Some(eq) = rest.find('=') {
            let value = rest[eq + 1..].trim_start();
            return value.starts_with("require(")
                || value.starts_with("require \"")
                || value.starts_with("require '");
        }
    }
    false
}

/// `export default X` (with optional trailing `;`) → `Some("X")`.
fn export_default_ident(trimmed: &str) -> Option<String> {
    let rest = trimmed.strip_prefix("export default ")?;
    let ident = rest.trim().trim_end_matches(';').trim();
    if !ident.is_empty() && ident.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Some(ident.to_string())
    } else {
        None
    }
}

/// True for a chunk-level `return` statement (column zero).
fn is_return_line(line: &str) -> bool {
    if !line.starts_with("return") {
        return false;
    }
    match line.as_bytes().get(6) {
        None => true,
        Some(b) => !(b.is_ascii_alphanumeric() || *b == b'_'),
    }
}

/// First top-level `local NAME = ...`, `function NAME(...)` or
/// `local function NAME(...)` binding.
fn find_binding(lines: &[String]) -> Option<String> {
    for line in lines {
        if let Some(rest) = line
            .strip_prefix("local function ")
            .or_else(|| line.strip_prefix("function "))
        {
            let name = leading_ident(rest);
            if !name.is_empty() && rest[name.len()..].trim_start().starts_with('(') {
                return Some(name);
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("local ") {
            let name = leading_ident(rest);
            if !name.is_empty() && rest[name.len()..].trim_start().starts_with('=') {
                return Some(name);
            }
        }
    }
    None
}

fn leading_ident(s: &str) -> String {
    s.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesizes_return_for_local_binding() {
        let body = normalize("local Counter = function()\n  return text(\"hi\")\nend").unwrap();
        assert!(body.ends_with("return Counter"));
    }

    #[test]
    fn test_synthesizes_return_for_function_binding() {
        let body = normalize("function App()\n  return text(\"hi\")\nend").unwrap();
        assert!(body.ends_with("return App"));
    }

    #[test]
    fn test_local_function_binding() {
        let body = normalize("local function App()\n  return text(\"x\")\nend").unwrap();
        assert!(body.ends_with("return App"));
    }

    #[test]
    fn test_exactly_one_top_level_return() {
        // Indented returns inside the component body must not suppress the
        // synthetic chunk-level return.
        let src = "local App = function()\n  if x then\n    return text(\"a\")\n  end\n  return text(\"b\")\nend";
        let body = normalize(src).unwrap();
        let top_level = body.lines().filter(|l| is_return_line(l)).count();
        assert_eq!(top_level, 1);
        assert!(body.ends_with("return App"));
    }

    #[test]
    fn test_existing_top_level_return_is_kept() {
        let src = "local App = function() end\nreturn App";
        let body = normalize(src).unwrap();
        assert_eq!(body.lines().filter(|l| is_return_line(l)).count(), 1);
    }

    #[test]
    fn test_strips_require_imports() {
        let src = "local ui = require(\"ui\")\nrequire(\"side-effect\")\nlocal App = function() end\nreturn App";
        let body = normalize(src).unwrap();
        assert!(!body.contains("require"));
        assert!(body.contains("local App"));
    }

    #[test]
    fn test_strips_js_import_lines() {
        let src = "import React from 'react';\nlocal App = function() end";
        let body = normalize(src).unwrap();
        assert!(!body.contains("import"));
        assert!(body.ends_with("return App"));
    }

    #[test]
    fn test_export_default_becomes_return() {
        let src = "local App = function() end\nexport default App;";
        let body = normalize(src).unwrap();
        assert!(body.ends_with("return App"));
        assert!(!body.contains("export"));
    }

    #[test]
    fn test_no_component_is_an_error() {
        assert_eq!(normalize(""), Err(NormalizeError::NoComponent));
        assert_eq!(normalize("-- just a comment"), Err(NormalizeError::NoComponent));
    }

    #[test]
    fn test_return_prefix_word_is_not_a_return() {
        // "returned = 1" must not count as a top-level return statement.
        let src = "returned = 1\nlocal App = function() end";
        let body = normalize(src).unwrap();
        assert!(body.ends_with("return App"));
    }
}
