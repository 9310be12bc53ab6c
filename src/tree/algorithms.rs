//! Pure functions over a document tree.
//!
//! None of these mutate their input and none can fail on a well-formed tree.
//! Every traversal is pre-order and uses an explicit stack: document depth is
//! bounded by structure, not by anything we control.

use super::node::{DocumentNode, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum characters of node text shown per line by [`print_document_tree`].
pub const PREVIEW_CHARS: usize = 80;

/// Marker prefixed to `listItem` text by [`extract_text_from_tree`].
pub const BULLET: &str = "• ";

/// Pre-order iterator over a tree, yielding `(depth, node)`.
pub struct PreOrder<'a> {
    stack: Vec<(usize, &'a DocumentNode)>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = (usize, &'a DocumentNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|c| (depth + 1, c)));
        Some((depth, node))
    }
}

/// Walk `root` in reading order.
pub fn pre_order(root: &DocumentNode) -> PreOrder<'_> {
    PreOrder {
        stack: vec![(0, root)],
    }
}

/// Human-readable indented rendering, one line per node.
///
/// ```text
/// root
///   header [level 1]: "Experience"
///   section
///     paragraph: "Worked at X"
/// ```
pub fn print_document_tree(root: &DocumentNode) -> String {
    let mut out = String::new();
    for (depth, node) in pre_order(root) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(node.node_type.as_str());
        if let Some(level) = node.level {
            out.push_str(&format!(" [level {level}]"));
        }
        let preview = preview_text(&node.text);
        if !preview.is_empty() {
            out.push_str(": \"");
            out.push_str(&preview);
            out.push('"');
        }
        out.push('\n');
    }
    out
}

/// Collapse whitespace runs and cut to [`PREVIEW_CHARS`] characters.
fn preview_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= PREVIEW_CHARS {
        collapsed
    } else {
        let cut: String = collapsed.chars().take(PREVIEW_CHARS).collect();
        let mut cut = cut.trim_end().to_string();
        cut.push('…');
        cut
    }
}

/// Canonical, lossless JSON for the whole tree.
///
/// This is the UI wire format. Parsing it back with
/// [`crate::tree::parse_tree_json`] and exporting again is byte-identical.
pub fn export_tree_as_json(root: &DocumentNode) -> String {
    // String keys only and no non-finite floats, so this cannot fail. Depth
    // is handled by the node's stack-growing `Serialize`.
    serde_json::to_string_pretty(root).unwrap_or_else(|_| String::from("{}"))
}

/// Every node of type `node_type`, in reading order.
pub fn find_elements_by_type(root: &DocumentNode, node_type: NodeType) -> Vec<&DocumentNode> {
    pre_order(root)
        .map(|(_, node)| node)
        .filter(|node| node.node_type == node_type)
        .collect()
}

/// Plain text of the whole tree in reading order.
///
/// Every node with text contributes one line; `listItem` lines carry
/// [`BULLET`]. Containers without text add nothing of their own.
pub fn extract_text_from_tree(root: &DocumentNode) -> String {
    let mut lines: Vec<String> = Vec::new();
    for (_, node) in pre_order(root) {
        let text = node.text.trim();
        if text.is_empty() {
            continue;
        }
        if node.node_type == NodeType::ListItem {
            lines.push(format!("{BULLET}{text}"));
        } else {
            lines.push(text.to_string());
        }
    }
    lines.join("\n")
}

/// Total number of nodes, root included.
pub fn count_elements(root: &DocumentNode) -> usize {
    pre_order(root).count()
}

/// Depth of the deepest node (a lone root has depth 0).
pub fn tree_depth(root: &DocumentNode) -> usize {
    pre_order(root).map(|(depth, _)| depth).max().unwrap_or(0)
}

/// Node count per type.
pub fn type_histogram(root: &DocumentNode) -> BTreeMap<NodeType, usize> {
    let mut counts = BTreeMap::new();
    for (_, node) in pre_order(root) {
        *counts.entry(node.node_type).or_insert(0) += 1;
    }
    counts
}

/// Flattened catalog of the main element kinds.
///
/// A snapshot: nodes are cloned out of the tree when the catalog is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedElements {
    pub headers: Vec<DocumentNode>,
    pub paragraphs: Vec<DocumentNode>,
    pub lists: Vec<DocumentNode>,
    pub tables: Vec<DocumentNode>,
    pub sections: Vec<DocumentNode>,
}

impl ExtractedElements {
    pub fn from_tree(root: &DocumentNode) -> Self {
        let collect = |t: NodeType| -> Vec<DocumentNode> {
            find_elements_by_type(root, t).into_iter().cloned().collect()
        };
        Self {
            headers: collect(NodeType::Header),
            paragraphs: collect(NodeType::Paragraph),
            lists: collect(NodeType::List),
            tables: collect(NodeType::Table),
            sections: collect(NodeType::Section),
        }
    }

    pub fn total(&self) -> usize {
        self.headers.len()
            + self.paragraphs.len()
            + self.lists.len()
            + self.tables.len()
            + self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_tree_json;

    /// root → [header("Experience"), section → [paragraph("Worked at X"), list → [listItem("Built Y")]]]
    fn resume_tree() -> DocumentNode {
        DocumentNode::root("root")
            .with_child(
                DocumentNode::new("h1", NodeType::Header)
                    .with_text("Experience")
                    .with_level(1),
            )
            .with_child(
                DocumentNode::new("s1", NodeType::Section)
                    .with_child(DocumentNode::new("p1", NodeType::Paragraph).with_text("Worked at X"))
                    .with_child(
                        DocumentNode::new("l1", NodeType::List).with_level(1).with_child(
                            DocumentNode::new("li1", NodeType::ListItem).with_text("Built Y"),
                        ),
                    ),
            )
    }

    fn table_tree() -> DocumentNode {
        DocumentNode::root("root").with_child(
            DocumentNode::new("t", NodeType::Table)
                .with_attribute("page", 2)
                .with_child(
                    DocumentNode::new("r1", NodeType::TableRow)
                        .with_child(DocumentNode::new("c1", NodeType::TableCell).with_text("Name"))
                        .with_child(DocumentNode::new("c2", NodeType::TableCell).with_text("Role")),
                ),
        )
    }

    #[test]
    fn resume_example_counts_six() {
        assert_eq!(count_elements(&resume_tree()), 6);
    }

    #[test]
    fn count_is_one_plus_children() {
        for tree in [resume_tree(), table_tree(), DocumentNode::root("r")] {
            let sum: usize = tree.children.iter().map(count_elements).sum();
            assert_eq!(count_elements(&tree), 1 + sum);
        }
    }

    #[test]
    fn find_headers_in_resume() {
        let tree = resume_tree();
        let headers = find_elements_by_type(&tree, NodeType::Header);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].text, "Experience");
    }

    #[test]
    fn find_missing_type_is_empty() {
        let tree = resume_tree();
        assert!(find_elements_by_type(&tree, NodeType::TableCell).is_empty());
    }

    #[test]
    fn extract_text_orders_and_bullets() {
        let text = extract_text_from_tree(&resume_tree());
        assert_eq!(text, "Experience\nWorked at X\n• Built Y");
    }

    #[test]
    fn extract_text_on_bare_root_is_empty() {
        assert_eq!(extract_text_from_tree(&DocumentNode::root("r")), "");
    }

    #[test]
    fn table_cells_are_newline_separated() {
        assert_eq!(extract_text_from_tree(&table_tree()), "Name\nRole");
    }

    #[test]
    fn find_order_matches_text_order() {
        let tree = resume_tree();
        let text = extract_text_from_tree(&tree);
        let lines: Vec<&str> = text.lines().collect();
        for t in NodeType::ALL {
            let found: Vec<&str> = find_elements_by_type(&tree, t)
                .iter()
                .map(|n| n.text.as_str())
                .filter(|s| !s.is_empty())
                .collect();
            let mut cursor = 0;
            for want in found {
                let pos = lines[cursor..]
                    .iter()
                    .position(|l| l.ends_with(want))
                    .expect("found node text must appear in extracted text");
                cursor += pos + 1;
            }
        }
    }

    #[test]
    fn print_indents_by_depth() {
        let printed = print_document_tree(&resume_tree());
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "root");
        assert_eq!(lines[1], "  header [level 1]: \"Experience\"");
        assert_eq!(lines[2], "  section");
        assert_eq!(lines[5], "      listItem: \"Built Y\"");
    }

    #[test]
    fn print_truncates_long_text() {
        let long = "word ".repeat(40);
        let tree = DocumentNode::root("r")
            .with_child(DocumentNode::new("p", NodeType::Paragraph).with_text(long));
        let printed = print_document_tree(&tree);
        let line = printed.lines().nth(1).unwrap();
        assert!(line.ends_with("…\""));
        let preview = line.trim_start_matches("  paragraph: \"").trim_end_matches('"');
        assert!(preview.chars().count() <= PREVIEW_CHARS + 1);
        assert!(preview.starts_with("word word"));
    }

    #[test]
    fn print_is_deterministic() {
        assert_eq!(print_document_tree(&table_tree()), print_document_tree(&table_tree()));
    }

    #[test]
    fn export_round_trip_is_identical() {
        for tree in [resume_tree(), table_tree(), DocumentNode::root("r")] {
            let first = export_tree_as_json(&tree);
            let reparsed = parse_tree_json(&first).unwrap();
            assert_eq!(reparsed, tree);
            assert_eq!(export_tree_as_json(&reparsed), first);
        }
    }

    #[test]
    fn export_keeps_attributes_and_levels() {
        let json = export_tree_as_json(&table_tree());
        assert!(json.contains("\"page\": 2"));
        let json = export_tree_as_json(&resume_tree());
        assert!(json.contains("\"level\": 1"));
        assert!(json.contains("\"listItem\""));
    }

    #[test]
    fn catalog_snapshots_each_kind() {
        let elements = ExtractedElements::from_tree(&resume_tree());
        assert_eq!(elements.headers.len(), 1);
        assert_eq!(elements.paragraphs.len(), 1);
        assert_eq!(elements.lists.len(), 1);
        assert_eq!(elements.sections.len(), 1);
        assert!(elements.tables.is_empty());
        assert_eq!(elements.total(), 4);
    }

    #[test]
    fn catalog_is_not_a_live_view() {
        let mut tree = resume_tree();
        let elements = ExtractedElements::from_tree(&tree);
        tree.children[0].text = "Changed".into();
        assert_eq!(elements.headers[0].text, "Experience");
    }

    #[test]
    fn depth_and_histogram() {
        let tree = resume_tree();
        assert_eq!(tree_depth(&tree), 3);
        let hist = type_histogram(&tree);
        assert_eq!(hist[&NodeType::Root], 1);
        assert_eq!(hist[&NodeType::ListItem], 1);
        assert_eq!(hist.values().sum::<usize>(), 6);
    }

    // ── Generated trees ──────────────────────────────────────────────────

    /// Small deterministic generator so failures reproduce from the seed.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }

        fn below(&mut self, n: u64) -> u64 {
            self.next() % n
        }
    }

    const WORDS: [&str; 8] = ["alpha", "beta", "  padded  ", "", "Name", "Role", "x", "€uro"];
    const KINDS: [NodeType; 9] = [
        NodeType::Section,
        NodeType::Header,
        NodeType::Paragraph,
        NodeType::List,
        NodeType::ListItem,
        NodeType::Table,
        NodeType::TableRow,
        NodeType::TableCell,
        NodeType::Other,
    ];

    /// A random tree of `size` nodes; every node's parent precedes it.
    fn random_tree(seed: u64, size: usize) -> DocumentNode {
        let mut rng = Lcg(seed);
        let mut nodes: Vec<Option<DocumentNode>> = vec![Some(DocumentNode::root("n0"))];
        let mut parents = vec![0usize];
        for i in 1..size {
            let kind = KINDS[rng.below(KINDS.len() as u64) as usize];
            let mut node = DocumentNode::new(format!("n{i}"), kind)
                .with_text(WORDS[rng.below(WORDS.len() as u64) as usize]);
            if rng.below(4) == 0 {
                node = node.with_level(rng.below(6) as u32);
            }
            if rng.below(5) == 0 {
                node = node.with_attribute("page", rng.below(40));
            }
            nodes.push(Some(node));
            // Bias towards recent nodes so some branches get deep.
            let span = (i as u64).min(6);
            parents.push(i - 1 - rng.below(span) as usize);
        }
        attach_all(nodes, &parents)
    }

    fn attach_all(mut nodes: Vec<Option<DocumentNode>>, parents: &[usize]) -> DocumentNode {
        for i in (1..nodes.len()).rev() {
            if let Some(mut node) = nodes[i].take() {
                node.children.reverse();
                if let Some(parent) = nodes[parents[i]].as_mut() {
                    parent.children.push(node);
                }
            }
        }
        let mut root = nodes[0].take().unwrap();
        root.children.reverse();
        root
    }

    fn deep_chain(depth: usize) -> DocumentNode {
        let nodes = (0..=depth)
            .map(|i| {
                let kind = if i == 0 { NodeType::Root } else { KINDS[i % KINDS.len()] };
                Some(DocumentNode::new(format!("d{i}"), kind).with_text(WORDS[i % WORDS.len()]))
            })
            .collect();
        let parents: Vec<usize> = (0..=depth).map(|i| i.saturating_sub(1)).collect();
        attach_all(nodes, &parents)
    }

    fn wide_tree(width: usize) -> DocumentNode {
        DocumentNode::root("w").with_children((0..width).map(|i| {
            DocumentNode::new(format!("w{i}"), KINDS[i % KINDS.len()]).with_text(WORDS[i % WORDS.len()])
        }))
    }

    fn sample_trees() -> Vec<DocumentNode> {
        let mut trees: Vec<DocumentNode> = (1..=24).map(|seed| random_tree(seed, 1 + seed as usize * 7)).collect();
        trees.push(deep_chain(1_000));
        trees.push(wide_tree(5_000));
        trees.push(resume_tree());
        trees.push(table_tree());
        trees.push(DocumentNode::root("r"));
        trees
    }

    fn check_laws(tree: &DocumentNode) {
        // count(root) == 1 + Σ count(child)
        let sum: usize = tree.children.iter().map(count_elements).sum();
        assert_eq!(count_elements(tree), 1 + sum);

        // Extracted lines are exactly the texted nodes in reading order.
        let expected: Vec<String> = pre_order(tree)
            .map(|(_, n)| n)
            .filter(|n| !n.text.trim().is_empty())
            .map(|n| {
                let text = n.text.trim();
                if n.node_type == NodeType::ListItem {
                    format!("{BULLET}{text}")
                } else {
                    text.to_string()
                }
            })
            .collect();
        assert_eq!(extract_text_from_tree(tree), expected.join("\n"));

        // find is the pre-order filter, for every type.
        for t in NodeType::ALL {
            let found: Vec<&str> = find_elements_by_type(tree, t).iter().map(|n| n.id.as_str()).collect();
            let walked: Vec<&str> = pre_order(tree)
                .filter(|(_, n)| n.node_type == t)
                .map(|(_, n)| n.id.as_str())
                .collect();
            assert_eq!(found, walked);
        }

        assert_eq!(print_document_tree(tree).lines().count(), count_elements(tree));

        let first = export_tree_as_json(tree);
        let reparsed = parse_tree_json(&first).unwrap();
        assert_eq!(export_tree_as_json(&reparsed), first);
    }

    #[test]
    fn laws_hold_on_generated_trees() {
        for tree in sample_trees() {
            check_laws(&tree);
        }
    }

    #[test]
    fn generated_trees_with_unique_ids_round_trip_exactly() {
        for tree in sample_trees() {
            let reparsed = parse_tree_json(&export_tree_as_json(&tree)).unwrap();
            assert!(reparsed == tree);
        }
    }

    #[test]
    fn laws_hold_on_parser_output() {
        use crate::parser::parse_response;
        use crate::protocol::{TREE_CLOSE, TREE_OPEN};

        for tree in sample_trees() {
            let json = export_tree_as_json(&tree);
            let tagged = format!("Here is the layout.\n{TREE_OPEN}\n{json}\n{TREE_CLOSE}\n");
            let parsed = parse_response(&tagged);
            assert!(!parsed.is_degraded());
            assert_eq!(parsed.tree.node_type, NodeType::Root);
            check_laws(&parsed.tree);

            // Output cut off mid-way still yields a lawful tree.
            let mut end = json.len() / 2;
            while !json.is_char_boundary(end) {
                end -= 1;
            }
            let cut = &json[..end];
            let truncated = parse_response(&format!("{TREE_OPEN}{cut}"));
            check_laws(&truncated.tree);
        }
    }

    #[test]
    fn deep_chain_serialises_without_overflow() {
        let tree = deep_chain(100_000);
        assert_eq!(count_elements(&tree), 100_001);
        assert_eq!(tree_depth(&tree), 100_000);
        let compact = serde_json::to_string(&tree).unwrap();
        let back = parse_tree_json(&compact).unwrap();
        assert_eq!(count_elements(&back), 100_001);
    }

    #[test]
    fn export_runs_on_a_small_stack() {
        let handle = std::thread::Builder::new()
            .stack_size(128 * 1024)
            .spawn(|| {
                let tree = deep_chain(1_000);
                let json = export_tree_as_json(&tree);
                json.starts_with("{\n  \"id\": \"d0\"")
            })
            .unwrap();
        assert!(handle.join().unwrap());
    }
}
