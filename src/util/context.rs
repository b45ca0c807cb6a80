//! Global context for Kiln operations.
//!
//! Provides centralized access to the working directory and user-level paths, plus
//! [`BuildPaths`], the fixed layout of files kiln keeps inside a build tree.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::util::diagnostic::suggestions;

/// Name of the per-directory project description.
pub const PROJECT_FILE: &str = "Kiln.toml";

/// Name of kiln's private directory inside source and build trees.
pub const KILN_DIR: &str = ".kiln";

/// Version string used to key compiler caches.
pub const KILN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Global context containing the working directory and user-level paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global kiln data (~/.kiln/)
    home: PathBuf,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let home = crate::util::config::global_config_dir()
            .unwrap_or_else(|| PathBuf::from(KILN_DIR));

        Ok(GlobalContext { cwd, home })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Get the global toolchain file path.
    pub fn toolchain_path(&self) -> PathBuf {
        self.home.join("toolchain.toml")
    }

    /// Resolve a user-supplied path against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Find the top-level source directory.
    ///
    /// Searches upward from `start` (or cwd) for a `Kiln.toml`, and keeps
    /// going while parent directories also have one so the result is the
    /// outermost project.
    pub fn find_source_root(&self, start: Option<&Path>) -> Result<PathBuf> {
        let start = start.map(|p| self.resolve(p)).unwrap_or_else(|| self.cwd.clone());
        let mut found: Option<PathBuf> = None;
        let mut current = Some(start.as_path());

        while let Some(dir) = current {
            if dir.join(PROJECT_FILE).is_file() {
                found = Some(dir.to_path_buf());
            } else if found.is_some() {
                break;
            }
            current = dir.parent();
        }

        match found {
            Some(root) => Ok(root),
            None => bail!(
                "could not find `{}` in `{}` or any parent directory\n{}",
                PROJECT_FILE,
                start.display(),
                suggestions::NO_PROJECT
            ),
        }
    }
}

/// Layout of the files kiln owns inside a build tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    source_dir: PathBuf,
    binary_dir: PathBuf,
}

impl BuildPaths {
    pub fn new(source_dir: impl Into<PathBuf>, binary_dir: impl Into<PathBuf>) -> Self {
        BuildPaths {
            source_dir: source_dir.into(),
            binary_dir: binary_dir.into(),
        }
    }

    /// Top-level source directory.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Top-level binary (build) directory.
    pub fn binary_dir(&self) -> &Path {
        &self.binary_dir
    }

    /// `<binary>/.kiln`
    pub fn kiln_dir(&self) -> PathBuf {
        self.binary_dir.join(KILN_DIR)
    }

    /// Persisted rule-hash map.
    pub fn rule_hashes(&self) -> PathBuf {
        self.kiln_dir().join("RuleHashes.txt")
    }

    /// Directory manifest listing every target's support directory.
    pub fn target_directories(&self) -> PathBuf {
        self.kiln_dir().join("TargetDirectories.txt")
    }

    /// Workspace cache holding the platform-info marker.
    pub fn workspace_cache(&self) -> PathBuf {
        self.kiln_dir().join("cache.toml")
    }

    /// Versioned directory of per-language compiler caches.
    pub fn platform_dir(&self) -> PathBuf {
        self.kiln_dir().join("platform").join(KILN_VERSION)
    }

    /// Compiler cache file for a language.
    pub fn compiler_cache(&self, lang: &str) -> PathBuf {
        self.platform_dir().join(format!("{}Compiler.toml", lang))
    }

    /// Scratch area for try-compile projects.
    pub fn scratch_dir(&self) -> PathBuf {
        self.kiln_dir().join("tmp")
    }

    /// Cross-cutting export artifact.
    pub fn exports_file(&self) -> PathBuf {
        self.binary_dir.join("kiln-exports.json")
    }

    /// Generator record read back by `kiln build` and `kiln test`.
    pub fn generator_record(&self) -> PathBuf {
        self.kiln_dir().join("generator.toml")
    }
}

/// Name of the per-directory test manifest.
pub const TEST_MANIFEST: &str = "KilnTests.json";
