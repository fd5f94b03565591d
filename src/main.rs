use anyhow::{Context, Result};
use clap::Parser;
use screenify::config::load_config;
use screenify::runner::{render_summary, run, Mode, RunOptions};
use screenify::scanner::{scan_test_files, ScanOptions};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "screenify")]
#[command(version)]
#[command(about = "Migrate Testing Library tests from destructured render queries to `screen`")]
struct Cli {
    /// Files or directories to migrate (directories are scanned for *.test.* / *.spec.* files)
    #[arg(value_name = "PATHS", default_value = ".")]
    paths: Vec<PathBuf>,

    /// Report what would change without writing anything
    #[arg(long, conflicts_with_all = ["check", "print"])]
    dry_run: bool,

    /// Like --dry-run, but exit with status 1 when any file would change
    #[arg(long, conflicts_with = "print")]
    check: bool,

    /// Print the migrated source of every changed file to stdout instead of writing it
    #[arg(long)]
    print: bool,

    /// Emit the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Worker threads (defaults to `jobs` in .screenify.json, then to the CPU count)
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// No progress bar, no human summary
    #[arg(long, short = 'q')]
    quiet: bool,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.print {
            Mode::Print
        } else if self.check {
            Mode::Check
        } else if self.dry_run {
            Mode::DryRun
        } else {
            Mode::Write
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default `screenify=warn`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("screenify=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let mode = cli.mode();

    let repo_root = std::env::current_dir().context("Failed to get current dir")?;
    let cfg = load_config(&repo_root);

    let mut entries = Vec::new();
    for target in &cli.paths {
        let opts = ScanOptions {
            repo_root: repo_root.clone(),
            target: target.clone(),
            max_file_bytes: cfg.effective_max_file_bytes(),
            exclude_dir_names: cfg.scan.exclude_dir_names.clone(),
        };
        entries.extend(scan_test_files(&opts)?);
    }
    entries.sort_by(|a, b| a.abs_path.cmp(&b.abs_path));
    entries.dedup_by(|a, b| a.abs_path == b.abs_path);
    tracing::debug!(files = entries.len(), "scan complete");

    let run_opts = RunOptions {
        mode,
        jobs: cli.jobs.unwrap_or(cfg.jobs),
        progress: !cli.quiet && !cli.json && std::io::stderr().is_terminal(),
    };
    let summary = run(entries, &run_opts)?;

    if mode == Mode::Print {
        for (path, source) in &summary.migrated {
            println!("// {}", path.display());
            print!("{source}");
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !cli.quiet {
        eprint!("{}", render_summary(&summary, mode));
    }

    if summary.has_failures() || (mode == Mode::Check && !summary.changed.is_empty()) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
