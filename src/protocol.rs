//! Wire protocol between the prompt and the response parser.
//!
//! The model is asked to reply with up to two tagged blocks, each wrapping a
//! single JSON object:
//!
//! ```text
//! <document_tree>
//! { "id": "root", "type": "root", "text": "", "children": [ … ] }
//! </document_tree>
//! <extracted_data>
//! { "name": "…", "skills": [ … ] }
//! </extracted_data>
//! ```
//!
//! [`crate::prompts`] describes this format to the model and
//! [`crate::parser`] locates the blocks using the same constants, so the two
//! sides are changed together.

/// Opening tag of the document-tree block.
pub const TREE_OPEN: &str = "<document_tree>";
/// Closing tag of the document-tree block.
pub const TREE_CLOSE: &str = "</document_tree>";

/// Opening tag of the schema-extraction block.
pub const DATA_OPEN: &str = "<extracted_data>";
/// Closing tag of the schema-extraction block.
pub const DATA_CLOSE: &str = "</extracted_data>";

/// A located tagged block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    /// Text between the tags (to end of input when the closing tag is missing).
    pub body: &'a str,
    /// Byte offset of `body` within the searched text.
    pub offset: usize,
    /// `false` when the closing tag was never found (truncated output).
    pub closed: bool,
    /// Byte range of the whole block, both tags included.
    pub outer_start: usize,
    pub outer_end: usize,
}

impl Block<'_> {
    /// `text` with this block (tags included) cut out.
    ///
    /// `text` must be the text the block was located in.
    pub fn remove_from(&self, text: &str) -> String {
        let mut rest = String::with_capacity(text.len() - (self.outer_end - self.outer_start) + 1);
        rest.push_str(&text[..self.outer_start]);
        rest.push('\n');
        rest.push_str(&text[self.outer_end..]);
        rest
    }
}

/// Find the first `open … close` block in `text`.
///
/// Tag matching is case-insensitive. A missing closing tag yields a block
/// running to the end of `text`.
pub fn locate<'a>(text: &'a str, open: &str, close: &str) -> Option<Block<'a>> {
    let outer_start = find_ascii_ci(text, open, 0)?;
    let start = outer_start + open.len();
    match find_ascii_ci(text, close, start) {
        Some(end) => Some(Block {
            body: &text[start..end],
            offset: start,
            closed: true,
            outer_start,
            outer_end: end + close.len(),
        }),
        None => Some(Block {
            body: &text[start..],
            offset: start,
            closed: false,
            outer_start,
            outer_end: text.len(),
        }),
    }
}

/// Case-insensitive search for an ASCII needle, starting at byte `from`.
fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.is_empty() || hay.len() < pat.len() {
        return None;
    }
    (from..=hay.len() - pat.len()).find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}
