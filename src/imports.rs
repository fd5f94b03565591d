//! Adds `screen` to the file's `@testing-library/react` import, or inserts one.

use anyhow::Result;
use serde::Serialize;
use tracing::debug;
use tree_sitter::Node;

use crate::registry::{ACCESSOR, TESTING_LIBRARY_MODULE};
use crate::source_tree::{EditSet, SourceTree};

/// What the import step did to the file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportChange {
    /// `screen` was already imported, or the step did not run.
    #[default]
    Unchanged,
    /// `screen` was appended to an existing import of the module.
    Extended,
    /// A new `import { screen } from ...` declaration was added.
    Inserted,
}

struct ModuleImport<'t> {
    statement: Node<'t>,
    clause: Option<Node<'t>>,
}

/// Make sure `screen` is importable from `@testing-library/react`.
///
/// Only value imports count: `import type { ... }` cannot provide a runtime
/// binding, and namespace or side-effect imports have no list to extend.
pub fn ensure_accessor_import(tree: &SourceTree, edits: &mut EditSet) -> Result<ImportChange> {
    let statements = top_level_imports(tree.root());
    let value_imports: Vec<ModuleImport> = statements
        .iter()
        .filter(|s| !is_type_only(**s))
        .map(|s| ModuleImport {
            statement: *s,
            clause: child_of_kind(*s, "import_clause"),
        })
        .collect();

    // `screen` bound from any module counts, e.g. a re-export from local test utils.
    if let Some(existing) = value_imports.iter().find(|m| binds_accessor(tree, m)) {
        debug!(
            file = %tree.path().display(),
            line = existing.statement.start_position().row + 1,
            "{ACCESSOR} already imported"
        );
        return Ok(ImportChange::Unchanged);
    }

    let module_imports: Vec<&ModuleImport> = value_imports
        .iter()
        .filter(|m| import_source(tree, m.statement).as_deref() == Some(TESTING_LIBRARY_MODULE))
        .collect();

    if let Some(target) = module_imports.iter().copied().find(|m| is_extendable(m)) {
        extend_import(tree, edits, target)?;
        debug!(
            file = %tree.path().display(),
            line = target.statement.start_position().row + 1,
            "appended {ACCESSOR} to existing import"
        );
        return Ok(ImportChange::Extended);
    }

    let (at, declaration) = match statements.first() {
        Some(first) => (first.start_byte(), new_import_like(tree, Some(*first))),
        None => (top_of_file(tree), new_import_like(tree, None)),
    };
    edits.insert_before(at, format!("{declaration}{}", tree.line_ending()))?;
    debug!(file = %tree.path().display(), offset = at, "inserted {ACCESSOR} import");
    Ok(ImportChange::Inserted)
}

fn top_level_imports(root: Node) -> Vec<Node> {
    let mut cursor = root.walk();
    let imports = root
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "import_statement")
        .collect();
    imports
}

fn import_source(tree: &SourceTree, statement: Node) -> Option<String> {
    let source = statement.child_by_field_name("source")?;
    Some(strip_string_quotes(tree.text(source)))
}

fn strip_string_quotes(s: &str) -> String {
    let t = s.trim();
    if t.len() >= 2 {
        let bytes = t.as_bytes();
        let first = bytes[0];
        let last = bytes[t.len() - 1];
        if (first == b'\'' || first == b'"') && first == last {
            return t[1..t.len() - 1].to_string();
        }
    }
    t.to_string()
}

fn is_type_only(statement: Node) -> bool {
    let mut cursor = statement.walk();
    let only = statement
        .children(&mut cursor)
        .any(|c| !c.is_named() && matches!(c.kind(), "type" | "typeof"));
    only
}

fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn specifiers(named_imports: Node) -> Vec<Node> {
    let mut cursor = named_imports.walk();
    let specs = named_imports
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "import_specifier")
        .collect();
    specs
}

/// Any specifier whose *local* name is `screen` (`screen` or `x as screen`).
fn binds_accessor(tree: &SourceTree, import: &ModuleImport) -> bool {
    let Some(named) = import.clause.and_then(|c| child_of_kind(c, "named_imports")) else {
        return false;
    };
    specifiers(named).into_iter().any(|spec| {
        let local = spec
            .child_by_field_name("alias")
            .or_else(|| spec.child_by_field_name("name"));
        local.is_some_and(|l| tree.text(l) == ACCESSOR)
    })
}

fn is_extendable(import: &ModuleImport) -> bool {
    match import.clause {
        Some(clause) => child_of_kind(clause, "namespace_import").is_none(),
        None => false,
    }
}

fn extend_import(tree: &SourceTree, edits: &mut EditSet, import: &ModuleImport) -> Result<()> {
    let Some(clause) = import.clause else {
        return Ok(());
    };

    let Some(named) = child_of_kind(clause, "named_imports") else {
        // Default import only: `import render from ...` → `import render, { screen } from ...`.
        edits.insert_before(clause.end_byte(), format!(", {{ {ACCESSOR} }}"))?;
        return Ok(());
    };

    let specs = specifiers(named);
    let Some(last) = specs.last().copied() else {
        edits.replace(named.byte_range(), format!("{{ {ACCESSOR} }}"))?;
        return Ok(());
    };

    let trailing_comma = next_non_comment_sibling(last).filter(|n| n.kind() == ",");
    let multiline = named.start_position().row != named.end_position().row;

    match (multiline, trailing_comma) {
        (false, None) => edits.insert_before(last.end_byte(), format!(", {ACCESSOR}"))?,
        (false, Some(comma)) => edits.insert_before(comma.end_byte(), format!(" {ACCESSOR},"))?,
        (true, None) => {
            let indent = tree.line_indent_at(last.start_byte());
            edits.insert_before(last.end_byte(), format!(",{}{indent}{ACCESSOR}", tree.line_ending()))?
        }
        (true, Some(comma)) => {
            let indent = tree.line_indent_at(last.start_byte());
            edits.insert_before(comma.end_byte(), format!("{}{indent}{ACCESSOR},", tree.line_ending()))?
        }
    }
    Ok(())
}

fn next_non_comment_sibling(node: Node) -> Option<Node> {
    let mut next = node.next_sibling();
    while let Some(n) = next {
        if n.kind() != "comment" {
            return Some(n);
        }
        next = n.next_sibling();
    }
    None
}

/// `import { screen } from '@testing-library/react';` in the style of `like`.
fn new_import_like(tree: &SourceTree, like: Option<Node>) -> String {
    let quote = like
        .and_then(|s| s.child_by_field_name("source"))
        .and_then(|src| tree.text(src).chars().next())
        .filter(|c| *c == '"' || *c == '\'')
        .unwrap_or('\'');
    let semicolon = match like {
        Some(s) if !tree.text(s).trim_end().ends_with(';') => "",
        _ => ";",
    };
    format!("import {{ {ACCESSOR} }} from {quote}{TESTING_LIBRARY_MODULE}{quote}{semicolon}")
}

/// First top-level node, skipping a hashbang line.
fn top_of_file(tree: &SourceTree) -> usize {
    let root = tree.root();
    let mut cursor = root.walk();
    let mut after_hashbang = 0;
    for child in root.children(&mut cursor) {
        if matches!(child.kind(), "hash_bang_line" | "hashbang_comment") {
            after_hashbang = tree.source()[child.end_byte()..]
                .find('\n')
                .map(|i| child.end_byte() + i + 1)
                .unwrap_or(tree.source().len());
            continue;
        }
        return child.start_byte();
    }
    after_hashbang
}
