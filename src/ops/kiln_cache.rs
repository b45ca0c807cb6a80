//! Implementation of `kiln cache`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::util::context::BuildPaths;
use crate::util::fs;

/// Remove compiler caches, rule hashes and the workspace cache from a build
/// tree. Returns what was actually removed.
pub fn clear(binary_dir: &Path) -> Result<Vec<PathBuf>> {
    let paths = BuildPaths::new(binary_dir, binary_dir);
    let mut removed = Vec::new();

    let platform = paths.kiln_dir().join("platform");
    if platform.exists() {
        fs::remove_dir_all_if_exists(&platform)?;
        removed.push(platform);
    }
    for file in [paths.rule_hashes(), paths.workspace_cache()] {
        if fs::remove_file_if_exists(&file)? {
            removed.push(file);
        }
    }
    Ok(removed)
}
