//! Routes bare registry query calls through the `screen` object.

use anyhow::Result;
use tracing::debug;

use crate::gate::query_call_name;
use crate::registry::ACCESSOR;
use crate::source_tree::{for_each_node, EditSet, SourceTree};

/// Rewrite every `getByText(...)`-style call into `screen.getByText(...)`.
///
/// Only the callee identifier is replaced, so type arguments, optional
/// chaining and the argument list are carried over byte for byte. Returns the
/// number of call sites rewritten.
pub fn rewrite_call_sites(tree: &SourceTree, edits: &mut EditSet) -> Result<usize> {
    let mut callees = Vec::new();
    for_each_node(tree.root(), |node| {
        if let Some(name) = query_call_name(tree, node) {
            if let Some(callee) = node.child_by_field_name("function") {
                callees.push((callee.byte_range(), name));
            }
        }
    });

    for (range, name) in &callees {
        debug!(
            file = %tree.path().display(),
            offset = range.start,
            method = name,
            "routing query call through {ACCESSOR}"
        );
        edits.replace(range.clone(), format!("{ACCESSOR}.{name}"))?;
    }

    Ok(callees.len())
}
