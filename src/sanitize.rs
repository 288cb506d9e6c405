//! Recovering JSON objects from free-form model output.
//!
//! Model text routinely wraps the payload in code fences, LaTeX-style
//! `\boxed{...}` commands or surrounding prose, and sometimes truncates or
//! over-closes braces. [`extract`] pulls out the most plausible object.

use std::sync::LazyLock;

use regex::Regex;

/// Backslash commands that open a brace group: `\boxed{`, `\text {`.
static ESCAPE_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\[A-Za-z]+\s*\{").expect("valid escape-command regex")
});

/// Opening or closing code-fence markers, with an optional `json` tag.
static FENCE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?i:json)?\s*").expect("valid fence regex"));

/// Whole fenced blocks, including their contents.
static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid fenced-block regex"));

/// How a candidate was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A span that parses as a JSON object.
    Valid(String),
    /// First `{` to last `}` with surplus closing braces trimmed. May not parse.
    Heuristic(String),
    /// No `{ ... }` slice to take; the cleaned text.
    NoJson(String),
}

impl Extraction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Valid(s) | Self::Heuristic(s) | Self::NoJson(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Self::Valid(s) | Self::Heuristic(s) | Self::NoJson(s) => s,
        }
    }
}

/// Remove fence markers and brace-opening escape commands, then trim.
pub fn clean_markup(text: &str) -> String {
    let text = ESCAPE_COMMAND.replace_all(text, "");
    let text = FENCE_MARKER.replace_all(&text, "");
    text.trim().to_string()
}

/// Byte ranges of top-level balanced `{...}` spans.
///
/// With `skip_strings`, braces inside quoted strings are not counted. Quotes
/// are honoured only inside a span, so apostrophes in surrounding prose do
/// not hide braces. A `}` seen at depth zero is ignored.
fn brace_spans(text: &str, skip_strings: bool) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if skip_strings && depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push((start, i + 1));
                }
            }
            _ => {}
        }
    }
    spans
}

/// Spans from both the string-aware and the plain depth scan, in text order.
///
/// A stray quote in one group leaves the string-aware scan stuck inside a
/// string for the rest of the text; the plain scan still sees later groups.
fn candidate_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = brace_spans(text, true);
    spans.extend(brace_spans(text, false));
    spans.sort_unstable();
    spans.dedup();
    spans
}

fn is_json_object(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(candidate).is_ok()
}

/// First `{` to last `}`, dropping trailing characters while `}` outnumber `{`.
fn heuristic_slice(text: &str) -> Option<String> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if last < first {
        return None;
    }
    let mut slice = text[first..=last].to_string();
    let count = |s: &str, c: char| s.chars().filter(|&x| x == c).count();
    while count(&slice, '}') > count(&slice, '{') {
        slice.pop();
    }
    Some(slice)
}

/// Recover the most plausible JSON object from `raw`.
pub fn extract(raw: &str) -> Extraction {
    let text = clean_markup(raw);

    let mut best: Option<&str> = None;
    for (start, end) in candidate_spans(&text) {
        let candidate = &text[start..end];
        if is_json_object(candidate) && best.is_none_or(|b| candidate.len() > b.len()) {
            best = Some(candidate);
        }
    }
    if let Some(best) = best {
        return Extraction::Valid(best.to_string());
    }

    match heuristic_slice(&text) {
        Some(slice) => Extraction::Heuristic(slice),
        None => Extraction::NoJson(text),
    }
}

/// Candidate JSON text for `raw`, without the provenance tag.
pub fn extract_json(raw: &str) -> String {
    extract(raw).into_string()
}

/// Strip fenced blocks and balanced brace spans from a prose answer.
pub fn strip_structural_artifacts(answer: &str) -> String {
    let text = FENCED_BLOCK.replace_all(answer, "");
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in candidate_spans(&text) {
        if end <= cursor {
            continue;
        }
        out.push_str(&text[cursor..start.max(cursor)]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out.trim().to_string()
}
