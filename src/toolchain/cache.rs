//! Persisted toolchain state.
//!
//! Two kinds of file live under `<binary>/.kiln`:
//! - `platform/<version>/<LANG>Compiler.toml`, one [`CompilerCache`] per
//!   language, written when a compiler is discovered
//! - `cache.toml`, the [`WorkspaceCache`] holding the platform-info marker

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::fs;

/// Linker preference as written in a compiler cache.
///
/// Older caches store a word instead of a number. Its first character
/// decides: `P` (Preferred) means 100, anything else 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkerPreference {
    Value(i64),
    Legacy(String),
}

impl LinkerPreference {
    /// Numeric preference before clamping.
    pub fn raw(&self) -> i64 {
        match self {
            LinkerPreference::Value(v) => *v,
            LinkerPreference::Legacy(s) if s.starts_with('P') => 100,
            LinkerPreference::Legacy(_) => 0,
        }
    }
}

impl Default for LinkerPreference {
    fn default() -> Self {
        LinkerPreference::Value(0)
    }
}

/// Cached description of a discovered compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerCache {
    pub loaded: bool,
    pub compiler: PathBuf,
    pub output_extension: String,
    #[serde(default)]
    pub linker_preference: LinkerPreference,
    #[serde(default)]
    pub source_extensions: Vec<String>,
    #[serde(default)]
    pub ignore_extensions: Vec<String>,
    #[serde(default)]
    pub shared_library_flags: Vec<String>,
}

impl CompilerCache {
    /// Load a cache file.
    ///
    /// A missing file, an unreadable one or one without `loaded = true` all
    /// count as "no cache"; the compiler is then rediscovered.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let Some(contents) = fs::read_optional(path)? else {
            return Ok(None);
        };
        match toml::from_str::<CompilerCache>(&contents) {
            Ok(cache) if cache.loaded => Ok(Some(cache)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!("ignoring unreadable compiler cache {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).context("failed to serialize compiler cache")?;
        fs::write_string(path, &contents)
    }
}

/// Workspace-level cache entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceCache {
    pub platform_info_initialized: bool,
}

impl WorkspaceCache {
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_optional(path)? {
            Some(contents) => toml::from_str(&contents)
                .with_context(|| format!("failed to parse workspace cache: {}", path.display())),
            None => Ok(WorkspaceCache::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).context("failed to serialize workspace cache")?;
        fs::write_string(path, &contents)
    }
}
