use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the optional per-repo config file, looked up in the run root.
pub const CONFIG_FILE_NAME: &str = ".screenify.json";

/// Hard safety ceiling: files larger than this are **always** skipped, regardless of config.
/// A multi-megabyte "test" is generated output, not something to hand-migrate.
pub const ABSOLUTE_MAX_FILE_BYTES: u64 = 1_000_000; // 1 MB

/// Controls workspace scanning behavior (what to skip).
///
/// Note: `.gitignore` is always respected by the scanner; these are additional
/// hard skips for noisy monorepo directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory *names* to skip anywhere in the tree (e.g. "fixtures", "__generated__").
    ///
    /// These are compared against path components, not full paths.
    pub exclude_dir_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    /// Files above this size are skipped (clamped to [`ABSOLUTE_MAX_FILE_BYTES`]).
    pub max_file_bytes: u64,
    /// Worker threads for batch runs; 0 lets rayon decide.
    pub jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            // 512 KB; far above any hand-written test file.
            max_file_bytes: 512 * 1024,
            jobs: 0,
        }
    }
}

impl Config {
    pub fn effective_max_file_bytes(&self) -> u64 {
        self.max_file_bytes.min(ABSOLUTE_MAX_FILE_BYTES)
    }
}

pub fn load_config(repo_root: &Path) -> Config {
    let primary = repo_root.join(CONFIG_FILE_NAME);

    let text = std::fs::read_to_string(&primary);
    let Ok(text) = text else { return Config::default() };

    match serde_json::from_str::<Config>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(path = %primary.display(), error = %e, "ignoring unreadable config");
            Config::default()
        }
    }
}
