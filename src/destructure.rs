//! Removes query bindings from `const { getByText, ... } = render(...)`.
//!
//! A declarator is a candidate when its pattern is an object pattern, its
//! initializer is a plain-named call (optionally awaited) that is not
//! `within(...)`, and at least one property binds a registry query under its
//! own name. Each candidate resolves to exactly one [`DeclaratorPlan`]:
//! trim the pattern down to the remaining properties, or, when nothing is
//! left, promote the initializer to a standalone expression statement.

use std::collections::BTreeMap;
use std::ops::Range;

use anyhow::Result;
use tracing::debug;
use tree_sitter::Node;

use crate::registry::{is_query_method, SCOPED_QUERY_HELPER};
use crate::source_tree::{for_each_node, EditSet, SourceTree};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    /// Query bindings dropped from patterns.
    pub bindings_removed: usize,
    /// Patterns that kept at least one non-query property.
    pub patterns_trimmed: usize,
    /// Declarators whose initializer now stands alone as a statement.
    pub declarators_promoted: usize,
}

impl CleanupReport {
    pub fn changed(&self) -> bool {
        self.patterns_trimmed + self.declarators_promoted > 0
    }
}

enum DeclaratorPlan<'t> {
    /// Keep the declaration; rewrite the pattern to `kept` (indices into `properties`).
    Trim {
        pattern: Node<'t>,
        properties: Vec<Node<'t>>,
        kept: Vec<usize>,
    },
    /// Nothing left to bind: the initializer becomes an expression statement.
    Promote { init: Node<'t> },
}

struct Candidate<'t> {
    declaration: Node<'t>,
    declarator: Node<'t>,
    removed: usize,
    plan: DeclaratorPlan<'t>,
}

/// Declarations may only be split into statements inside statement lists.
const STATEMENT_LISTS: &[&str] = &["program", "statement_block", "switch_case", "switch_default"];

pub fn clean_destructured_queries(tree: &SourceTree, edits: &mut EditSet) -> Result<CleanupReport> {
    let mut candidates = Vec::new();
    for_each_node(tree.root(), |node| {
        if let Some(c) = candidate(tree, node) {
            candidates.push(c);
        }
    });

    let mut report = CleanupReport::default();

    // Keyed by start byte and applied back to front, so an inner rewrite is
    // recorded before any enclosing node renders it.
    let mut trims: Vec<(usize, Node, Vec<Node>, Vec<usize>)> = Vec::new();
    let mut promotions: BTreeMap<usize, (Node, Vec<(usize, Node)>)> = BTreeMap::new();

    for c in candidates {
        match c.plan {
            DeclaratorPlan::Trim {
                pattern,
                properties,
                kept,
            } => {
                report.bindings_removed += c.removed;
                report.patterns_trimmed += 1;
                trims.push((pattern.start_byte(), pattern, properties, kept));
            }
            DeclaratorPlan::Promote { init } => {
                let parent_kind = c.declaration.parent().map(|p| p.kind()).unwrap_or("");
                if !STATEMENT_LISTS.contains(&parent_kind) {
                    debug!(
                        file = %tree.path().display(),
                        line = c.declaration.start_position().row + 1,
                        parent = parent_kind,
                        "emptied declaration is not in a statement list; leaving it"
                    );
                    continue;
                }
                report.bindings_removed += c.removed;
                report.declarators_promoted += 1;
                promotions
                    .entry(c.declaration.start_byte())
                    .or_insert_with(|| (c.declaration, Vec::new()))
                    .1
                    .push((c.declarator.id(), init));
            }
        }
    }

    enum Step<'t> {
        Trim(Node<'t>, Vec<Node<'t>>, Vec<usize>),
        Promote(Node<'t>, Vec<(usize, Node<'t>)>),
    }
    let mut steps: Vec<(usize, Step)> = trims
        .into_iter()
        .map(|(at, pattern, props, kept)| (at, Step::Trim(pattern, props, kept)))
        .chain(
            promotions
                .into_iter()
                .map(|(at, (decl, emptied))| (at, Step::Promote(decl, emptied))),
        )
        .collect();
    steps.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, step) in steps {
        match step {
            Step::Trim(pattern, properties, kept) => {
                let text = trimmed_pattern(tree, edits, pattern, &properties, &kept);
                edits.replace(pattern.byte_range(), text)?;
            }
            Step::Promote(declaration, emptied) => {
                let text = promoted_declaration(tree, edits, declaration, &emptied);
                debug!(
                    file = %tree.path().display(),
                    line = declaration.start_position().row + 1,
                    "promoting setup call to a statement"
                );
                edits.replace(declaration.byte_range(), text)?;
            }
        }
    }

    Ok(report)
}

fn candidate<'t>(tree: &SourceTree, node: Node<'t>) -> Option<Candidate<'t>> {
    if node.kind() != "variable_declarator" {
        return None;
    }
    let pattern = node.child_by_field_name("name")?;
    if pattern.kind() != "object_pattern" {
        return None;
    }
    let init = node.child_by_field_name("value")?;
    if !is_setup_call(tree, init) {
        return None;
    }

    let declaration = node.parent()?;
    if !matches!(declaration.kind(), "lexical_declaration" | "variable_declaration") {
        return None;
    }
    // Dropping an exported binding would change the module's interface.
    if declaration.parent().map(|p| p.kind()) == Some("export_statement") {
        return None;
    }

    let properties: Vec<Node<'t>> = named_children(pattern)
        .into_iter()
        .filter(|p| p.kind() != "comment")
        .collect();
    let kept: Vec<usize> = (0..properties.len())
        .filter(|&i| !binds_query_method(tree, properties[i]))
        .collect();
    let removed = properties.len() - kept.len();
    if removed == 0 {
        return None;
    }

    let plan = if kept.is_empty() {
        DeclaratorPlan::Promote { init }
    } else {
        DeclaratorPlan::Trim {
            pattern,
            properties,
            kept,
        }
    };
    Some(Candidate {
        declaration,
        declarator: node,
        removed,
        plan,
    })
}

/// `render(...)` or `await render(...)` where the callee is a plain name other than `within`.
/// Parentheses around either the awaited value or the call are ignored.
fn is_setup_call(tree: &SourceTree, init: Node) -> bool {
    let init = unparenthesized(init);
    let call = match init.kind() {
        "call_expression" => init,
        "await_expression" => match named_children(init).into_iter().find(|c| c.kind() != "comment") {
            Some(inner) if unparenthesized(inner).kind() == "call_expression" => unparenthesized(inner),
            _ => return false,
        },
        _ => return false,
    };
    match call.child_by_field_name("function") {
        Some(callee) if callee.kind() == "identifier" => tree.text(callee) != SCOPED_QUERY_HELPER,
        _ => false,
    }
}

/// True only when the property binds a registry query under its own name.
///
/// `{ getByRole: gbr }` is deliberately not matched: removing it would leave
/// every later `gbr(...)` dangling. String, numeric and computed keys, rest
/// elements and nested patterns are never matched either.
fn binds_query_method(tree: &SourceTree, prop: Node) -> bool {
    match prop.kind() {
        "shorthand_property_identifier_pattern" => is_query_method(tree.text(prop)),
        "object_assignment_pattern" => prop
            .child_by_field_name("left")
            .filter(|l| l.kind() == "shorthand_property_identifier_pattern")
            .is_some_and(|l| is_query_method(tree.text(l))),
        "pair_pattern" => {
            let (Some(key), Some(value)) = (
                prop.child_by_field_name("key"),
                prop.child_by_field_name("value"),
            ) else {
                return false;
            };
            key.kind() == "property_identifier"
                && value.kind() == "identifier"
                && tree.text(key) == tree.text(value)
                && is_query_method(tree.text(key))
        }
        _ => false,
    }
}

/// Rebuild the pattern from its kept properties, reusing the separator that
/// followed each kept property and the original closing segment.
fn trimmed_pattern(
    tree: &SourceTree,
    edits: &EditSet,
    pattern: Node,
    properties: &[Node],
    kept: &[usize],
) -> String {
    let render = |range: Range<usize>| tree.render(edits, range);
    let (Some(first), Some(last)) = (properties.first(), properties.last()) else {
        return render(pattern.byte_range());
    };

    let mut out = render(pattern.start_byte()..first.start_byte());
    for (pos, &idx) in kept.iter().enumerate() {
        let prop = properties[idx];
        out.push_str(&render(prop.byte_range()));
        if pos + 1 < kept.len() {
            out.push_str(&render(prop.end_byte()..properties[idx + 1].start_byte()));
        }
    }
    out.push_str(&render(last.end_byte()..pattern.end_byte()));
    out
}

/// Split a declaration into statements: runs of surviving declarators stay
/// under the original keyword, emptied ones become `init;`. Order is kept so
/// initializers still evaluate in sequence.
fn promoted_declaration(
    tree: &SourceTree,
    edits: &EditSet,
    declaration: Node,
    emptied: &[(usize, Node)],
) -> String {
    let render = |range: Range<usize>| tree.render(edits, range);
    let keyword = {
        let mut cursor = declaration.walk();
        let first = declaration.children(&mut cursor).next();
        first.map(|k| tree.text(k)).unwrap_or("const")
    };
    let semicolon = if tree.text(declaration).ends_with(';') { ";" } else { "" };

    let mut statements: Vec<String> = Vec::new();
    let mut survivors: Vec<String> = Vec::new();
    for declarator in named_children(declaration)
        .into_iter()
        .filter(|d| d.kind() == "variable_declarator")
    {
        let Some((_, init)) = emptied.iter().find(|(id, _)| *id == declarator.id()) else {
            survivors.push(render(declarator.byte_range()));
            continue;
        };
        if !survivors.is_empty() {
            statements.push(format!("{keyword} {}{semicolon}", survivors.join(", ")));
            survivors.clear();
        }
        statements.push(format!("{}{semicolon}", render(init.byte_range())));
    }
    if !survivors.is_empty() {
        statements.push(format!("{keyword} {}{semicolon}", survivors.join(", ")));
    }

    let separator = format!("{}{}", tree.line_ending(), tree.line_indent_at(declaration.start_byte()));
    statements.join(&separator)
}

fn unparenthesized(mut node: Node) -> Node {
    while node.kind() == "parenthesized_expression" {
        match named_children(node).into_iter().find(|c| c.kind() != "comment") {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_tree::SyntaxService;
    use std::path::Path;

    fn clean(src: &str) -> (String, CleanupReport) {
        let tree = SyntaxService::new()
            .parse(Path::new("a.test.tsx"), src)
            .unwrap();
        let mut edits = EditSet::new();
        let report = clean_destructured_queries(&tree, &mut edits).unwrap();
        (tree.serialize(&edits), report)
    }

    #[test]
    fn trims_query_bindings_and_keeps_the_rest() {
        let (out, report) = clean("const { getByText, within: w } = renderWithProviders(x);\n");
        assert_eq!(out, "const { within: w } = renderWithProviders(x);\n");
        assert_eq!(report.bindings_removed, 1);
        assert_eq!(report.patterns_trimmed, 1);
    }

    #[test]
    fn keeps_relative_order_of_survivors() {
        let (out, _) = clean("const { container, getByRole, rerender, queryByText, unmount } = render(<A />);");
        assert_eq!(out, "const { container, rerender, unmount } = render(<A />);");
    }

    #[test]
    fn keeps_multiline_layout() {
        let src = "const {\n  getByText,\n  container,\n  queryByRole,\n} = render(<A />);\n";
        let (out, _) = clean(src);
        assert_eq!(out, "const {\n  container,\n} = render(<A />);\n");
    }

    #[test]
    fn promotes_emptied_declaration_and_keeps_comment() {
        let src = "it('x', () => {\n  // mount it\n  const { getByRole } = render(<Foo />);\n});\n";
        let (out, report) = clean(src);
        assert_eq!(out, "it('x', () => {\n  // mount it\n  render(<Foo />);\n});\n");
        assert_eq!(report.declarators_promoted, 1);
    }

    #[test]
    fn promotes_awaited_setup_calls() {
        let (out, _) = clean("const { findByText, getAllByRole } = await setup();");
        assert_eq!(out, "await setup();");
    }

    #[test]
    fn keeps_missing_semicolon_style() {
        let (out, _) = clean("const { getByText } = render(<A />)\nfoo()\n");
        assert_eq!(out, "render(<A />)\nfoo()\n");
    }

    #[test]
    fn within_results_are_never_touched() {
        let src = "const { getByText } = within(container);\n";
        let (out, report) = clean(src);
        assert_eq!(out, src);
        assert!(!report.changed());
    }

    #[test]
    fn awaited_within_results_are_never_touched() {
        let src = "const { getByText, findByRole } = await within(container);\n";
        let (out, report) = clean(src);
        assert_eq!(out, src);
        assert!(!report.changed());

        let parenthesized = "const { getByText } = await (within(container));\n";
        assert_eq!(clean(parenthesized).0, parenthesized);
    }

    #[test]
    fn parenthesized_setup_calls_are_candidates() {
        let (out, _) = clean("const { getByText } = await (render(<A />));\n");
        assert_eq!(out, "await (render(<A />));\n");

        let (out, _) = clean("const { getByText, container } = (render(<A />));\n");
        assert_eq!(out, "const { container } = (render(<A />));\n");
    }

    #[test]
    fn aliased_query_bindings_are_kept() {
        let src = "const { getByRole: gbr } = render(<A />);\n";
        let (out, report) = clean(src);
        assert_eq!(out, src);
        assert_eq!(report, CleanupReport::default());

        let (out, _) = clean("const { getByRole: gbr, getByText } = render(<A />);\n");
        assert_eq!(out, "const { getByRole: gbr } = render(<A />);\n");
    }

    #[test]
    fn unusual_properties_are_kept() {
        let (out, _) = clean("const { 'getByText': a, [key]: b, getByRole, ...rest } = render(<A />);");
        assert_eq!(out, "const { 'getByText': a, [key]: b, ...rest } = render(<A />);");
    }

    #[test]
    fn non_call_initializers_are_ignored() {
        let src = "const { getByText } = utils;\nconst { getByRole } = screen.render();\n";
        let (out, _) = clean(src);
        assert_eq!(out, src);
    }

    #[test]
    fn splits_multi_declarator_declarations_in_order() {
        let src = "  let a = 1, { getByText } = render(<A />), b = 2;\n";
        let (out, report) = clean(src);
        assert_eq!(out, "  let a = 1;\n  render(<A />);\n  let b = 2;\n");
        assert_eq!(report.declarators_promoted, 1);
    }

    #[test]
    fn split_declarations_keep_crlf_line_endings() {
        let src = "it('x', () => {\r\n  const a = 1, { getByText } = render(<A />);\r\n});\r\n";
        let (out, _) = clean(src);
        assert_eq!(out, "it('x', () => {\r\n  const a = 1;\r\n  render(<A />);\r\n});\r\n");
        assert!(!out.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn exported_declarations_are_left_alone() {
        let src = "export const { getByText } = render(<A />);\n";
        let (out, _) = clean(src);
        assert_eq!(out, src);
    }

    #[test]
    fn promotion_keeps_edits_recorded_inside_the_initializer() {
        let src = "const { getByText } = render(<A onClick={() => getByText('x')} />);";
        let tree = SyntaxService::new()
            .parse(Path::new("a.test.tsx"), src)
            .unwrap();
        let mut edits = EditSet::new();
        crate::calls::rewrite_call_sites(&tree, &mut edits).unwrap();
        clean_destructured_queries(&tree, &mut edits).unwrap();
        assert_eq!(
            tree.serialize(&edits),
            "render(<A onClick={() => screen.getByText('x')} />);"
        );
    }
}
