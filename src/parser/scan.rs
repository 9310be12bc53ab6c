//! Balanced-delimiter scan for JSON objects embedded in free text.
//!
//! The scanner tracks `{ … }` nesting while honouring JSON string syntax
//! (quotes and backslash escapes), and records every span whose braces
//! balance. Nested objects are recorded too, so a response truncated halfway
//! through its outer object still yields every inner object that closed.

/// Byte span `[start, end)` of a balanced `{ … }` region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// All balanced object spans in `text`, largest first.
///
/// Ties keep source order. Quote tracking only starts inside an object, so
/// apostrophes and stray quotes in surrounding prose do not confuse it.
pub fn balanced_objects(text: &str) -> Vec<Span> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    spans.push(Span { start, end: i + 1 });
                }
            }
            _ => {}
        }
    }

    spans.sort_by(|a, b| b.len().cmp(&a.len()).then(a.start.cmp(&b.start)));
    spans
}

/// Try candidates largest-first, returning the first `parse` accepts.
pub fn first_parsable<T>(text: &str, mut parse: impl FnMut(&str) -> Option<T>) -> Option<(Span, T)> {
    balanced_objects(text)
        .into_iter()
        .find_map(|span| parse(&text[span.start..span.end]).map(|v| (span, v)))
}
