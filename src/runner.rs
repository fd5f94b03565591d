//! Batch application of the codemod over scanned files.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;

use crate::imports::ImportChange;
use crate::scanner::FileEntry;
use crate::source_tree::SyntaxService;
use crate::transform::{transform, FileInfo, Migration, MigrationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Rewrite changed files in place.
    Write,
    /// Report only.
    DryRun,
    /// Report only; the caller fails when anything would change.
    Check,
    /// Report and keep migrated sources for printing; nothing is written.
    Print,
}

impl Mode {
    fn writes(self) -> bool {
        self == Mode::Write
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: Mode,
    /// 0 = rayon's global pool.
    pub jobs: usize,
    pub progress: bool,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Totals {
    pub calls_rewritten: usize,
    pub bindings_removed: usize,
    pub patterns_trimmed: usize,
    pub declarations_promoted: usize,
    pub imports_extended: usize,
    pub imports_inserted: usize,
}

impl Totals {
    fn add(&mut self, r: &MigrationReport) {
        self.calls_rewritten += r.calls_rewritten;
        self.bindings_removed += r.bindings_removed;
        self.patterns_trimmed += r.patterns_trimmed;
        self.declarations_promoted += r.declarations_promoted;
        match r.import {
            ImportChange::Extended => self.imports_extended += 1,
            ImportChange::Inserted => self.imports_inserted += 1,
            ImportChange::Unchanged => {}
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangedFile {
    pub path: String,
    pub report: MigrationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub scanned: usize,
    pub unchanged: usize,
    pub changed: Vec<ChangedFile>,
    pub failed: Vec<FailedFile>,
    pub totals: Totals,
    /// Migrated sources, kept only in [`Mode::Print`].
    #[serde(skip)]
    pub migrated: Vec<(PathBuf, String)>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

enum FileResult {
    Done { entry: FileEntry, migration: Migration },
    Failed { entry: FileEntry, error: anyhow::Error },
}

fn migrate_entry(service: &mut SyntaxService, entry: &FileEntry, mode: Mode) -> Result<Migration> {
    let source = std::fs::read_to_string(&entry.abs_path)
        .with_context(|| format!("Failed to read {}", entry.abs_path.display()))?;
    let file = FileInfo::new(entry.rel_path.clone(), source);
    let migration = transform(&file, service)?;
    if mode.writes() && migration.changed() {
        std::fs::write(&entry.abs_path, &migration.source)
            .with_context(|| format!("Failed to write {}", entry.abs_path.display()))?;
    }
    Ok(migration)
}

/// Migrate every entry. Per-file failures are collected, never fatal.
pub fn run(entries: Vec<FileEntry>, opts: &RunOptions) -> Result<RunSummary> {
    let bar = if opts.progress {
        let bar = ProgressBar::new(entries.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} {pos}/{len} {wide_msg}")
                .context("Invalid progress template")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let mode = opts.mode;
    let work = || -> Vec<FileResult> {
        entries
            .into_par_iter()
            .map_init(SyntaxService::new, |service, entry| {
                bar.set_message(entry.rel_path.display().to_string());
                let result = match migrate_entry(service, &entry, mode) {
                    Ok(migration) => FileResult::Done { entry, migration },
                    Err(error) => FileResult::Failed { entry, error },
                };
                bar.inc(1);
                result
            })
            .collect()
    };

    let results = if opts.jobs > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.jobs)
            .build()
            .context("Failed to build worker pool")?;
        pool.install(work)
    } else {
        work()
    };
    bar.finish_and_clear();

    let mut summary = RunSummary {
        scanned: results.len(),
        ..RunSummary::default()
    };
    for result in results {
        match result {
            FileResult::Done { entry, migration } => {
                let path = display_path(&entry);
                if !migration.changed() {
                    summary.unchanged += 1;
                    continue;
                }
                tracing::info!(file = %path, calls = migration.report.calls_rewritten, "migrated");
                summary.totals.add(&migration.report);
                summary.changed.push(ChangedFile {
                    path,
                    report: migration.report,
                });
                if mode == Mode::Print {
                    summary.migrated.push((entry.rel_path, migration.source));
                }
            }
            FileResult::Failed { entry, error } => {
                let path = display_path(&entry);
                tracing::warn!(file = %path, error = %format!("{error:#}"), "migration failed");
                summary.failed.push(FailedFile {
                    path,
                    error: format!("{error:#}"),
                });
            }
        }
    }
    Ok(summary)
}

fn display_path(entry: &FileEntry) -> String {
    entry.rel_path.to_string_lossy().replace('\\', "/")
}

/// Human-readable summary for stderr.
pub fn render_summary(summary: &RunSummary, mode: Mode) -> String {
    let verb = if mode.writes() { "migrated" } else { "would migrate" };
    let mut out = String::new();
    for f in &summary.changed {
        out.push_str(&format!(
            "{verb} {} ({} calls, {} bindings)\n",
            f.path, f.report.calls_rewritten, f.report.bindings_removed
        ));
    }
    for f in &summary.failed {
        out.push_str(&format!("failed {}: {}\n", f.path, f.error));
    }
    out.push_str(&format!(
        "{} scanned, {} {verb}, {} unchanged, {} failed\n",
        summary.scanned,
        summary.changed.len(),
        summary.unchanged,
        summary.failed.len()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{scan_test_files, ScanOptions};
    use tempfile::TempDir;

    const NEEDS_MIGRATION: &str =
        "import { render } from '@testing-library/react';\nconst { getByText } = render(<A />);\ngetByText('x');\n";

    fn fixture() -> (TempDir, Vec<FileEntry>) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::write(root.join("a.test.tsx"), NEEDS_MIGRATION).unwrap();
        std::fs::write(root.join("b.test.tsx"), "it('x', () => {});\n").unwrap();
        std::fs::write(root.join("c.test.ts"), "getByText('x'\n").unwrap();
        let entries = scan_test_files(&ScanOptions {
            repo_root: root.to_path_buf(),
            target: PathBuf::from("."),
            max_file_bytes: 1 << 20,
            exclude_dir_names: vec![],
        })
        .unwrap();
        (tmp, entries)
    }

    fn opts(mode: Mode) -> RunOptions {
        RunOptions {
            mode,
            jobs: 2,
            progress: false,
        }
    }

    #[test]
    fn write_mode_rewrites_changed_files_and_collects_failures() {
        let (tmp, entries) = fixture();
        let summary = run(entries, &opts(Mode::Write)).unwrap();

        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.changed.len(), 1);
        assert_eq!(summary.changed[0].path, "a.test.tsx");
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].path, "c.test.ts");
        assert_eq!(summary.totals.imports_extended, 1);

        let written = std::fs::read_to_string(tmp.path().join("a.test.tsx")).unwrap();
        assert_eq!(
            written,
            "import { render, screen } from '@testing-library/react';\nrender(<A />);\nscreen.getByText('x');\n"
        );
    }

    #[test]
    fn dry_run_and_print_leave_files_alone() {
        let (tmp, entries) = fixture();
        let summary = run(entries.clone(), &opts(Mode::DryRun)).unwrap();
        assert_eq!(summary.changed.len(), 1);
        assert!(summary.migrated.is_empty());

        let printed = run(entries, &opts(Mode::Print)).unwrap();
        assert_eq!(printed.migrated.len(), 1);
        assert!(printed.migrated[0].1.contains("screen.getByText('x')"));

        let on_disk = std::fs::read_to_string(tmp.path().join("a.test.tsx")).unwrap();
        assert_eq!(on_disk, NEEDS_MIGRATION);
    }

    #[test]
    fn summary_mentions_every_bucket() {
        let (_tmp, entries) = fixture();
        let summary = run(entries, &opts(Mode::Check)).unwrap();
        let text = render_summary(&summary, Mode::Check);
        assert!(text.contains("would migrate a.test.tsx"));
        assert!(text.contains("failed c.test.ts"));
        assert!(text.ends_with("3 scanned, 1 would migrate, 1 unchanged, 1 failed\n"));
    }
}
