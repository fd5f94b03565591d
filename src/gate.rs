//! Eligibility checks run before anything is rewritten.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tree_sitter::Node;

use crate::registry::is_query_method;
use crate::source_tree::{for_each_node, SourceTree};

/// `*.spec.js`, `*.test.tsx`, ... anchored at the end of the path.
pub const TEST_FILE_PATTERN: &str = r"\.(spec|test)\.(js|ts)x?$";

fn test_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TEST_FILE_PATTERN).expect("TEST_FILE_PATTERN is a valid regex"))
}

/// Naming-convention filter: only test/spec files are ever migrated.
pub fn is_test_file(path: &Path) -> bool {
    test_file_regex().is_match(&path.to_string_lossy())
}

/// Returns the callee name when `node` is `name(...)` with `name` a registry query.
pub fn query_call_name<'s>(tree: &'s SourceTree, node: Node) -> Option<&'s str> {
    if node.kind() != "call_expression" {
        return None;
    }
    let callee = node.child_by_field_name("function")?;
    if callee.kind() != "identifier" {
        return None;
    }
    let name = tree.text(callee);
    is_query_method(name).then_some(name)
}

/// Existence filter: does the file call any registry query directly?
pub fn has_query_calls(tree: &SourceTree) -> bool {
    let mut found = false;
    for_each_node(tree.root(), |node| {
        if !found && query_call_name(tree, node).is_some() {
            found = true;
        }
    });
    found
}
