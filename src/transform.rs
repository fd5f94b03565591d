//! Entry point: one file in, migrated source out.
//!
//! Stages run once, in order, against the same edit overlay:
//! gate → call sites → destructuring → import → serialize.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::calls::rewrite_call_sites;
use crate::destructure::clean_destructured_queries;
use crate::gate::{has_query_calls, is_test_file};
use crate::imports::{ensure_accessor_import, ImportChange};
use crate::source_tree::{EditSet, SyntaxService};

/// A file handed to the codemod.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub source: String,
}

impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Counts of what changed in one file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub calls_rewritten: usize,
    pub bindings_removed: usize,
    pub patterns_trimmed: usize,
    pub declarations_promoted: usize,
    pub import: ImportChange,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub source: String,
    pub report: MigrationReport,
    changed: bool,
}

impl Migration {
    fn untouched(file: &FileInfo) -> Self {
        Self {
            source: file.source.clone(),
            report: MigrationReport::default(),
            changed: false,
        }
    }

    /// Whether `source` differs from the input.
    pub fn changed(&self) -> bool {
        self.changed
    }
}

/// Migrate one file. Files outside the test naming convention, or without a
/// single bare query call, come back byte-identical. Malformed files are an
/// error and are never partially rewritten.
pub fn transform(file: &FileInfo, service: &mut SyntaxService) -> Result<Migration> {
    if !is_test_file(&file.path) {
        debug!(file = %file.path.display(), "not a test file; skipping");
        return Ok(Migration::untouched(file));
    }

    let tree = service
        .parse(&file.path, &file.source)
        .with_context(|| format!("Failed to parse {}", file.path.display()))?;

    if !has_query_calls(&tree) {
        debug!(file = %file.path.display(), "no query calls; skipping");
        return Ok(Migration::untouched(file));
    }

    let mut edits = EditSet::new();
    let calls_rewritten = rewrite_call_sites(&tree, &mut edits)
        .with_context(|| format!("Failed to rewrite query calls in {}", file.path.display()))?;
    let cleanup = clean_destructured_queries(&tree, &mut edits)
        .with_context(|| format!("Failed to clean destructuring in {}", file.path.display()))?;

    let import = if calls_rewritten > 0 || cleanup.changed() {
        ensure_accessor_import(&tree, &mut edits)
            .with_context(|| format!("Failed to update imports in {}", file.path.display()))?
    } else {
        ImportChange::Unchanged
    };

    let source = tree.serialize(&edits);
    let changed = source != file.source;
    Ok(Migration {
        source,
        report: MigrationReport {
            calls_rewritten,
            bindings_removed: cleanup.bindings_removed,
            patterns_trimmed: cleanup.patterns_trimmed,
            declarations_promoted: cleanup.declarators_promoted,
            import,
        },
        changed,
    })
}
