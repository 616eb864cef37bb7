//! Reply parsing: header line (glyph, name, description) and fenced source
//! extraction, including best-effort recovery of truncated replies.
//!
//! This grammar is the closest thing the runtime has to a wire protocol, so
//! its observable behaviors are fixed: the glyph scalar ranges, the
//! first-dash split, the fence extraction (lua-tagged preferred), and the
//! missing-closing-fence truncation heuristic. The truncation check is a known
//! approximation: a literal triple backtick inside a string can misfire it.

pub const DEFAULT_GLYPH: &str = "📱";
pub const DEFAULT_NAME: &str = "Generated App";
pub const DEFAULT_DESCRIPTION: &str = "A generated app";

/// Unicode scalar ranges recognized as a leading glyph, kept as data so the
/// behavior is reproducible bit-for-bit.
const GLYPH_RANGES: &[(u32, u32)] = &[
    (0x1F300, 0x1F5FF),
    (0x1F600, 0x1F64F),
    (0x1F680, 0x1F6FF),
    (0x1F7E0, 0x1F7FF),
    (0x1F800, 0x1F8FF),
    (0x1F900, 0x1F9FF),
    (0x2600, 0x26FF),
    (0x2700, 0x27BF),
];

/// Joiner/selector scalars that extend a glyph match.
const GLYPH_MODIFIERS: &[u32] = &[0xFE0F, 0x200D];

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub glyph: String,
    pub name: String,
    pub description: String,
    pub source: String,
    pub truncated: bool,
}

/// Parses one reply. Total and pure: every input yields a `ParsedReply`,
/// and parsing the same text twice yields identical results. A reply
/// without any code fence is not an error — `source` is just empty.
pub fn parse_reply(text: &str) -> ParsedReply {
    let header = header_line(text);
    let (glyph, name, description) = parse_header(header);
    let (source, truncated) = extract_source(text);
    ParsedReply {
        glyph,
        name,
        description,
        source,
        truncated,
    }
}

/// First non-empty, non-fence line among the first five lines.
fn header_line(text: &str) -> &str {
    text.lines()
        .take(5)
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("```"))
        .unwrap_or(DEFAULT_NAME)
}

fn parse_header(line: &str) -> (String, String, String) {
    let (glyph, rest) = match leading_glyph(line) {
        Some(len) => (line[..len].to_string(), line[len..].trim_start()),
        None => (DEFAULT_GLYPH.to_string(), line),
    };

    match dash_split(rest) {
        Some((before, after)) => (glyph, before.to_string(), after.to_string()),
        None => {
            let name = if rest.trim().is_empty() {
                DEFAULT_NAME.to_string()
            } else {
                rest.trim().to_string()
            };
            (glyph, name, DEFAULT_DESCRIPTION.to_string())
        }
    }
}

/// Longest glyph match at the start of the line: one scalar in the
/// configured ranges, extended by any run of modifier scalars. Returns the
/// byte length of the match.
fn leading_glyph(line: &str) -> Option<usize> {
    let mut chars = line.char_indices();
    let (_, first) = chars.next()?;
    let cp = first as u32;
    if !GLYPH_RANGES.iter().any(|&(lo, hi)| (lo..=hi).contains(&cp)) {
        return None;
    }
    let mut end = first.len_utf8();
    for (idx, c) in chars {
        if GLYPH_MODIFIERS.contains(&(c as u32)) {
            end = idx + c.len_utf8();
        } else {
            break;
        }
    }
    Some(end)
}

/// Splits at the first `-` with non-empty text on both sides.
fn dash_split(s: &str) -> Option<(&str, &str)> {
    for (idx, c) in s.char_indices() {
        if c == '-' {
            let before = s[..idx].trim();
            let after = s[idx + 1..].trim();
            if !before.is_empty() && !after.is_empty() {
                return Some((before, after));
            }
        }
    }
    None
}

/// Extracts the first fenced code block, preferring a `lua`-tagged fence
/// over an untagged one. An opening fence with no closing fence yields
/// everything after the opening as a best-effort partial source, flagged
/// as truncated.
fn extract_source(text: &str) -> (String, bool) {
    let open = match text.find("```lua") {
        Some(idx) => idx,
        None => match text.find("```") {
            Some(idx) => idx,
            None => return (String::new(), false),
        },
    };
    // Skip the fence and its language tag up to end of line.
    let after_fence = &text[open + 3..];
    let body_start = match after_fence.find('\n') {
        Some(nl) => nl + 1,
        None => return (String::new(), true),
    };
    let body = &after_fence[body_start..];
    match body.find("\n```") {
        Some(close) => (body[..close].to_string(), false),
        None => (body.to_string(), true),
    }
}
