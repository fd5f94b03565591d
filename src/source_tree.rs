//! Parse → edit → serialize service used by every rewrite stage.
//!
//! Tree-sitter trees are immutable, so "mutating" the tree means recording
//! byte-range edits in an [`EditSet`] overlay. Stages read the original CST
//! through [`SourceTree`] and observe earlier stages' work through
//! [`EditSet::render`], which applies every edit nested in a range.

use std::ops::Range;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tree_sitter::{Language, Node, Parser, Tree};

#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("failed to load the {dialect} grammar: {reason}")]
    Grammar { dialect: &'static str, reason: String },

    #[error("tree-sitter produced no tree for {path}")]
    NoTree { path: PathBuf },

    #[error("{path}:{line}:{column}: malformed source, refusing to rewrite")]
    Malformed {
        path: PathBuf,
        line: usize,
        column: usize,
    },

    #[error("edit {start}..{end} overlaps an existing edit {other_start}..{other_end}")]
    OverlappingEdit {
        start: usize,
        end: usize,
        other_start: usize,
        other_end: usize,
    },
}

/// Which grammar a file is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Plain TypeScript; needed for `<T>value` casts that TSX rejects.
    TypeScript,
    /// TSX; also the grammar for `.js` / `.jsx` since React tests carry JSX.
    Tsx,
}

impl Dialect {
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "ts" => Dialect::TypeScript,
            _ => Dialect::Tsx,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::TypeScript => "typescript",
            Dialect::Tsx => "tsx",
        }
    }

    fn language(self) -> Language {
        match self {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Owns one parser per dialect so a worker can parse many files without
/// reloading grammars. Not `Sync`: give each thread its own service.
#[derive(Default)]
pub struct SyntaxService {
    typescript: Option<Parser>,
    tsx: Option<Parser>,
}

impl SyntaxService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source`, failing when the tree contains ERROR or MISSING nodes.
    pub fn parse(&mut self, path: &Path, source: &str) -> Result<SourceTree, SyntaxError> {
        let dialect = Dialect::for_path(path);
        let parser = self.parser_for(dialect)?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| SyntaxError::NoTree {
                path: path.to_path_buf(),
            })?;

        if let Some(bad) = first_error_node(tree.root_node()) {
            let pos = bad.start_position();
            return Err(SyntaxError::Malformed {
                path: path.to_path_buf(),
                line: pos.row + 1,
                column: pos.column + 1,
            });
        }

        Ok(SourceTree {
            path: path.to_path_buf(),
            source: source.to_string(),
            tree,
        })
    }

    fn parser_for(&mut self, dialect: Dialect) -> Result<&mut Parser, SyntaxError> {
        let slot = match dialect {
            Dialect::TypeScript => &mut self.typescript,
            Dialect::Tsx => &mut self.tsx,
        };
        if slot.is_none() {
            let mut parser = Parser::new();
            parser
                .set_language(&dialect.language())
                .map_err(|e| SyntaxError::Grammar {
                    dialect: dialect.name(),
                    reason: e.to_string(),
                })?;
            *slot = Some(parser);
        }
        slot.as_mut().ok_or_else(|| SyntaxError::Grammar {
            dialect: dialect.name(),
            reason: "parser slot empty".to_string(),
        })
    }
}

fn first_error_node(root: Node) -> Option<Node> {
    if !root.has_error() {
        return None;
    }
    let mut found = None;
    for_each_node(root, |n| {
        if found.is_none() && (n.is_error() || n.is_missing()) {
            found = Some(n);
        }
    });
    found.or(Some(root))
}

/// Pre-order walk over every node (named and anonymous) under `root`.
///
/// Iterative so deeply nested JSX cannot blow the stack.
pub fn for_each_node<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// A parsed file: original text plus its concrete syntax tree.
pub struct SourceTree {
    path: PathBuf,
    source: String,
    tree: Tree,
}

impl SourceTree {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// `"\r\n"` when the file uses CRLF line endings, `"\n"` otherwise.
    pub fn line_ending(&self) -> &'static str {
        if self.source.contains("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Original text of `node`, ignoring any recorded edits.
    pub fn text(&self, node: Node) -> &str {
        self.source.get(node.byte_range()).unwrap_or("")
    }

    /// Leading whitespace of the line that contains `byte`.
    pub fn line_indent_at(&self, byte: usize) -> &str {
        let byte = byte.min(self.source.len());
        let line_start = self.source[..byte].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line = &self.source[line_start..];
        let width = line
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(line.len());
        &line[..width]
    }

    /// Render `range` with every edit of `edits` nested inside it applied.
    pub fn render(&self, edits: &EditSet, range: Range<usize>) -> String {
        edits.render(&self.source, range)
    }

    /// Render the whole file.
    pub fn serialize(&self, edits: &EditSet) -> String {
        edits.serialize(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

impl Edit {
    fn is_insertion(&self) -> bool {
        self.start == self.end
    }

    /// Strictly inside `range` for insertions; fully covered for replacements.
    fn nested_in(&self, range: &Range<usize>) -> bool {
        if self.is_insertion() {
            range.start < self.start && self.start < range.end
        } else {
            range.start <= self.start && self.end <= range.end
        }
    }
}

/// Ordered, non-overlapping set of pending edits against one source text.
#[derive(Debug, Default, Clone)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `range` with `text`. Edits nested inside `range` are dropped, so
    /// callers that want to keep them must build `text` from [`EditSet::render`].
    pub fn replace(&mut self, range: Range<usize>, text: impl Into<String>) -> Result<(), SyntaxError> {
        for e in &self.edits {
            if e.nested_in(&range) {
                continue;
            }
            let disjoint = if e.is_insertion() {
                e.start <= range.start || e.start >= range.end
            } else {
                e.end <= range.start || e.start >= range.end
            };
            if !disjoint {
                return Err(SyntaxError::OverlappingEdit {
                    start: range.start,
                    end: range.end,
                    other_start: e.start,
                    other_end: e.end,
                });
            }
        }
        self.edits.retain(|e| !e.nested_in(&range));
        self.push(Edit {
            start: range.start,
            end: range.end,
            text: text.into(),
        });
        Ok(())
    }

    /// Insert `text` at `offset`. Several insertions at one offset keep call order.
    pub fn insert_before(&mut self, offset: usize, text: impl Into<String>) -> Result<(), SyntaxError> {
        if let Some(e) = self
            .edits
            .iter()
            .find(|e| !e.is_insertion() && e.start < offset && offset < e.end)
        {
            return Err(SyntaxError::OverlappingEdit {
                start: offset,
                end: offset,
                other_start: e.start,
                other_end: e.end,
            });
        }
        self.push(Edit {
            start: offset,
            end: offset,
            text: text.into(),
        });
        Ok(())
    }

    fn push(&mut self, edit: Edit) {
        let key = (edit.start, edit.end);
        let at = self.edits.partition_point(|e| (e.start, e.end) <= key);
        self.edits.insert(at, edit);
    }

    pub fn render(&self, source: &str, range: Range<usize>) -> String {
        let nested = self.edits.iter().filter(|e| e.nested_in(&range));
        splice(source, range.clone(), nested)
    }

    pub fn serialize(&self, source: &str) -> String {
        splice(source, 0..source.len(), self.edits.iter())
    }
}

fn splice<'e>(source: &str, range: Range<usize>, edits: impl Iterator<Item = &'e Edit>) -> String {
    let mut out = String::with_capacity(range.len());
    let mut cursor = range.start;
    for e in edits {
        if e.start < cursor {
            continue;
        }
        out.push_str(&source[cursor..e.start]);
        out.push_str(&e.text);
        cursor = e.end;
    }
    out.push_str(&source[cursor..range.end]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str, src: &str) -> SourceTree {
        SyntaxService::new().parse(Path::new(path), src).unwrap()
    }

    #[test]
    fn dialect_follows_extension() {
        assert_eq!(Dialect::for_path(Path::new("a.test.ts")), Dialect::TypeScript);
        assert_eq!(Dialect::for_path(Path::new("a.test.tsx")), Dialect::Tsx);
        assert_eq!(Dialect::for_path(Path::new("a.spec.js")), Dialect::Tsx);
        assert_eq!(Dialect::for_path(Path::new("a.spec.jsx")), Dialect::Tsx);
    }

    #[test]
    fn parses_jsx_in_js_files() {
        let tree = parse("a.test.js", "render(<Foo bar={1} />);\n");
        assert_eq!(tree.root().kind(), "program");
    }

    #[test]
    fn malformed_source_is_rejected() {
        let err = SyntaxService::new()
            .parse(Path::new("a.test.ts"), "const = ;\nfoo(")
            .err()
            .unwrap();
        assert!(matches!(err, SyntaxError::Malformed { .. }), "{err}");
    }

    #[test]
    fn render_applies_nested_edits_only() {
        let src = "abcdefghij";
        let mut edits = EditSet::new();
        edits.replace(2..4, "XY").unwrap();
        edits.replace(6..7, "Z").unwrap();
        assert_eq!(edits.render(src, 0..5), "abXYe");
        assert_eq!(edits.serialize(src), "abXYefZhij");
    }

    #[test]
    fn replace_supersedes_nested_edits() {
        let src = "foo(bar(1))";
        let mut edits = EditSet::new();
        edits.replace(4..7, "baz").unwrap();
        let inner = edits.render(src, 0..11);
        edits.replace(0..11, format!("{inner};")).unwrap();
        assert_eq!(edits.edits.len(), 1);
        assert_eq!(edits.serialize(src), "foo(baz(1));");
    }

    #[test]
    fn partial_overlap_is_an_error() {
        let mut edits = EditSet::new();
        edits.replace(2..6, "x").unwrap();
        assert!(edits.replace(4..8, "y").is_err());
        assert!(edits.insert_before(3, "z").is_err());
    }

    #[test]
    fn insertions_keep_call_order() {
        let src = "ab";
        let mut edits = EditSet::new();
        edits.insert_before(1, "1").unwrap();
        edits.insert_before(1, "2").unwrap();
        edits.insert_before(2, "!").unwrap();
        assert_eq!(edits.serialize(src), "a12b!");
    }

    #[test]
    fn render_of_a_borrowed_range_sees_nested_edits() {
        let src = "foo(bar(1)); baz();";
        let mut edits = EditSet::new();
        edits.replace(4..7, "qux").unwrap();
        let range = 0..11;
        assert_eq!(edits.render(src, range.clone()), "foo(qux(1))");
        assert_eq!(edits.render(src, range), "foo(qux(1))");
    }

    #[test]
    fn line_ending_follows_the_file() {
        assert_eq!(parse("a.test.ts", "foo();\r\nbar();\r\n").line_ending(), "\r\n");
        assert_eq!(parse("a.test.ts", "foo();\nbar();\n").line_ending(), "\n");
    }

    #[test]
    fn line_indent_is_read_from_the_enclosing_line() {
        let tree = parse("a.test.ts", "if (x) {\n    foo();\n}\n");
        let offset = tree.source().find("foo").unwrap();
        assert_eq!(tree.line_indent_at(offset), "    ");
        assert_eq!(tree.line_indent_at(0), "");
    }
}
