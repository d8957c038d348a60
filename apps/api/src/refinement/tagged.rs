//! Tagged-output grammar for chat refinement responses.
//!
//! ```text
//! response    := text* bullets? text* explanation? text*
//! bullets     := "<BULLETS>" body "</BULLETS>"
//! explanation := "<RESPONSE>" body "</RESPONSE>"
//! ```
//!
//! Each region is optional and independent. A region is the text between the first
//! opening tag and the first closing tag after it, trimmed. An unclosed or blank
//! region counts as absent.

pub const BULLETS_OPEN: &str = "<BULLETS>";
pub const BULLETS_CLOSE: &str = "</BULLETS>";
pub const RESPONSE_OPEN: &str = "<RESPONSE>";
pub const RESPONSE_CLOSE: &str = "</RESPONSE>";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaggedResponse<'a> {
    pub bullets: Option<&'a str>,
    pub explanation: Option<&'a str>,
}

pub fn parse_tagged(response: &str) -> TaggedResponse<'_> {
    TaggedResponse {
        bullets: region(response, BULLETS_OPEN, BULLETS_CLOSE),
        explanation: region(response, RESPONSE_OPEN, RESPONSE_CLOSE),
    }
}

/// Untagged fallback: every line that starts with `- ` or `* `, trimmed, marker kept.
/// `None` when there are no such lines.
pub fn marker_lines(response: &str) -> Option<String> {
    let lines: Vec<&str> = response
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("- ") || line.starts_with("* "))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn region<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let len = text[start..].find(close)?;
    let body = text[start..start + len].trim();
    (!body.is_empty()).then_some(body)
}
