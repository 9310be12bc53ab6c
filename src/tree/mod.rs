//! Document tree model and the algorithms that run over it.
//!
//! - [`node`]: the [`DocumentNode`] hierarchy and the closed [`NodeType`] vocabulary
//! - [`decode`]: lenient JSON → node decoding shared by the parser and [`parse_tree_json`]
//! - [`algorithms`]: printing, canonical export, typed search, text extraction, counting

pub mod algorithms;
pub mod decode;
pub mod node;

pub use algorithms::{
    count_elements, export_tree_as_json, extract_text_from_tree, find_elements_by_type,
    pre_order, print_document_tree, tree_depth, type_histogram, ExtractedElements, BULLET,
    PREVIEW_CHARS,
};
pub use decode::{parse_tree_json, TreeJsonError};
pub use node::{Attributes, DocumentNode, NodeType};
