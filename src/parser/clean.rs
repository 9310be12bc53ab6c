//! Deterministic cleanup of raw model text before parsing.
//!
//! Models wrap JSON in fences despite being told not to, emit CRLF line
//! endings, and sprinkle zero-width characters that `serde_json` rejects
//! outside strings. Each rule is a pure `&str → String` pass.
//!
//! Rules run in this order: line endings first so fence detection sees
//! plain `\n`, invisible characters next, fences last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise a whole model response (line endings and invisible characters).
pub fn normalise_response(input: &str) -> String {
    let s = normalise_line_endings(input);
    remove_invisible_chars(&s)
}

/// Prepare a located block body for strict JSON parsing.
pub fn clean_block(body: &str) -> String {
    strip_code_fences(body.trim()).trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Strip surrounding code fences ────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}
