//! Structured extraction over loosely formatted model output. Field misses
//! yield empty values, never errors, so callers can degrade to fallbacks
//! without touching the extraction strategy.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

use crate::error::StageError;

static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:\d+\.|[-*])\s*(.+)$").expect("valid regex"));

/// Extract a single-line labeled field, e.g. `field(text, &["Main Theme", "Theme"])`
/// matches "Main Theme: ..." or "Theme: ...". Returns an empty string when no
/// label matches.
pub fn field(text: &str, labels: &[&str]) -> String {
    let pattern = format!(r"(?:{})\s*:\s*(.+)", labels.join("|"));
    let Ok(re) = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
    else {
        return String::new();
    };
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Extract a possibly multi-line labeled section, terminated by a blank line,
/// one of the `stops` labels, or end of input.
pub fn section(text: &str, label: &str, stops: &[&str]) -> String {
    let mut terminators = vec![r"\n\s*\n".to_string()];
    terminators.extend(stops.iter().map(|s| regex::escape(s)));
    let pattern = format!(r"{}\s*:\s*(.+?)(?:{}|$)", label, terminators.join("|"));
    let Ok(re) = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
    else {
        return String::new();
    };
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Collect bullet or numbered list items, in document order.
pub fn list_items(text: &str) -> Vec<String> {
    LIST_ITEM_RE
        .captures_iter(text)
        .map(|caps| caps[1].trim().to_string())
        .collect()
}

/// Find the first balanced `{...}` span in the text and parse it as JSON.
pub fn first_json_object(text: &str) -> Result<serde_json::Value, StageError> {
    let start = text
        .find('{')
        .ok_or_else(|| StageError::Parse("no JSON object in response".to_string()))?;

    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let span = &text[start..start + offset + ch.len_utf8()];
                    return serde_json::from_str(span)
                        .map_err(|e| StageError::Parse(format!("invalid JSON object: {e}")));
                }
            }
            _ => {}
        }
    }

    Err(StageError::Parse("unbalanced JSON object in response".to_string()))
}

/// True for lines that read as a screenplay character cue: every cased
/// character uppercase, at most three words.
pub fn is_all_caps(line: &str) -> bool {
    line.chars().any(|c| c.is_alphabetic())
        && !line.chars().any(|c| c.is_lowercase())
        && line.split_whitespace().count() <= 3
}
