//! Configuration file support for Kiln.
//!
//! Kiln reads two configuration file locations:
//! - Global: `~/.kiln/config.toml` - User-wide defaults
//! - Project: `<source>/.kiln/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.
//!
//! Per-language toolchain overrides are stored separately:
//! - Global: `~/.kiln/toolchain.toml`
//! - Project: `<source>/.kiln/toolchain.toml`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Kiln configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generation settings
    pub generate: GenerateConfig,
}

/// Settings for the configure/compute/generate pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Default backend (makefiles, manifest)
    pub backend: Option<String>,

    /// Skip emitting install rules
    pub skip_install_rules: bool,

    /// Allow several utility targets with the same name
    pub allow_duplicate_custom_targets: bool,

    /// IDE-metadata post-pass to run after generation (compile-db)
    pub ide_metadata: Option<String>,

    /// Timeout for each compiler try-compile, in seconds
    pub try_compile_timeout_secs: Option<u64>,

    /// Timeout for `kiln build` and each `kiln test` command, in seconds
    pub build_timeout_secs: Option<u64>,
}

/// Default try-compile timeout when none is configured.
pub const DEFAULT_TRY_COMPILE_TIMEOUT: Duration = Duration::from_secs(60);

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let g = other.generate;
        if g.backend.is_some() {
            self.generate.backend = g.backend;
        }
        if g.skip_install_rules {
            self.generate.skip_install_rules = true;
        }
        if g.allow_duplicate_custom_targets {
            self.generate.allow_duplicate_custom_targets = true;
        }
        if g.ide_metadata.is_some() {
            self.generate.ide_metadata = g.ide_metadata;
        }
        if g.try_compile_timeout_secs.is_some() {
            self.generate.try_compile_timeout_secs = g.try_compile_timeout_secs;
        }
        if g.build_timeout_secs.is_some() {
            self.generate.build_timeout_secs = g.build_timeout_secs;
        }
    }

    /// Try-compile timeout, falling back to the default.
    pub fn try_compile_timeout(&self) -> Duration {
        self.generate
            .try_compile_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TRY_COMPILE_TIMEOUT)
    }

    /// Build/test timeout, if any.
    pub fn build_timeout(&self) -> Option<Duration> {
        self.generate.build_timeout_secs.map(Duration::from_secs)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.kiln/config.toml)
/// 2. Global config (~/.kiln/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path.filter(|p| p.exists()) {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Toolchain configuration for per-language compiler overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Overrides keyed by language name (C, CXX, Fortran, ASM)
    pub languages: BTreeMap<String, LanguageOverride>,
}

/// Overrides for a single language.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageOverride {
    /// Path to the compiler
    pub compiler: Option<PathBuf>,

    /// Linker preference
    pub linker_preference: Option<i64>,

    /// Object file extension
    pub output_extension: Option<String>,

    /// Flags for building shared libraries
    pub shared_library_flags: Option<Vec<String>>,
}

impl LanguageOverride {
    fn merge(&mut self, other: LanguageOverride) {
        if other.compiler.is_some() {
            self.compiler = other.compiler;
        }
        if other.linker_preference.is_some() {
            self.linker_preference = other.linker_preference;
        }
        if other.output_extension.is_some() {
            self.output_extension = other.output_extension;
        }
        if other.shared_library_flags.is_some() {
            self.shared_library_flags = other.shared_library_flags;
        }
    }
}

impl ToolchainConfig {
    /// Load toolchain configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read toolchain config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse toolchain config: {}", path.display()))
    }

    /// Load toolchain configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to load toolchain config from {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Save toolchain configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .with_context(|| "failed to serialize toolchain config")?;
        crate::util::fs::write_string(path, &contents)
    }

    /// Override for a language, if configured.
    pub fn language(&self, name: &str) -> Option<&LanguageOverride> {
        self.languages.get(name)
    }

    /// Merge another config into this one (other takes precedence per key).
    pub fn merge(&mut self, other: ToolchainConfig) {
        for (lang, over) in other.languages {
            self.languages.entry(lang).or_default().merge(over);
        }
    }
}

/// Load merged toolchain configuration from global and project locations.
pub fn load_toolchain_config(global_path: Option<&Path>, project_path: &Path) -> ToolchainConfig {
    let mut config = ToolchainConfig::default();

    if let Some(global_path) = global_path.filter(|p| p.exists()) {
        config.merge(ToolchainConfig::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(ToolchainConfig::load_or_default(project_path));
    }

    config
}

/// Get the global kiln config directory (~/.kiln).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".kiln"))
}

/// Get the project config path (.kiln/config.toml).
pub fn project_config_path(source_root: &Path) -> PathBuf {
    source_root.join(".kiln").join("config.toml")
}

/// Get the project toolchain config path (.kiln/toolchain.toml).
pub fn project_toolchain_config_path(source_root: &Path) -> PathBuf {
    source_root.join(".kiln").join("toolchain.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.generate.backend.is_none());
        assert!(!config.generate.skip_install_rules);
        assert_eq!(config.try_compile_timeout(), DEFAULT_TRY_COMPILE_TIMEOUT);
        assert!(config.build_timeout().is_none());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[generate]
backend = "manifest"
skip_install_rules = true
try_compile_timeout_secs = 5
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.generate.backend, Some("manifest".to_string()));
        assert!(config.generate.skip_install_rules);
        assert_eq!(config.try_compile_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");

        std::fs::write(
            &global,
            "[generate]\nbackend = \"manifest\"\nbuild_timeout_secs = 30\n",
        )
        .unwrap();
        std::fs::write(&project, "[generate]\nbackend = \"makefiles\"\n").unwrap();

        let config = load_config(Some(&global), &project);
        assert_eq!(config.generate.backend, Some("makefiles".to_string()));
        assert_eq!(config.build_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_toolchain_config_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("toolchain.toml");

        std::fs::write(
            &path,
            r#"
[languages.C]
compiler = "/usr/bin/clang"
linker_preference = 15

[languages.CXX]
shared_library_flags = ["-fPIC"]
"#,
        )
        .unwrap();

        let config = ToolchainConfig::load(&path).unwrap();
        let c = config.language("C").unwrap();
        assert_eq!(c.compiler, Some(PathBuf::from("/usr/bin/clang")));
        assert_eq!(c.linker_preference, Some(15));
        assert_eq!(
            config.language("CXX").unwrap().shared_library_flags,
            Some(vec!["-fPIC".to_string()])
        );
        assert!(config.language("Fortran").is_none());
    }

    #[test]
    fn test_toolchain_config_merge_per_key() {
        let mut base = ToolchainConfig::default();
        base.languages.insert(
            "C".to_string(),
            LanguageOverride {
                compiler: Some(PathBuf::from("/usr/bin/gcc")),
                output_extension: Some(".o".to_string()),
                ..Default::default()
            },
        );

        let mut over = ToolchainConfig::default();
        over.languages.insert(
            "C".to_string(),
            LanguageOverride {
                compiler: Some(PathBuf::from("/usr/bin/clang")),
                ..Default::default()
            },
        );

        base.merge(over);
        let c = base.language("C").unwrap();
        assert_eq!(c.compiler, Some(PathBuf::from("/usr/bin/clang")));
        assert_eq!(c.output_extension, Some(".o".to_string()));
    }

    #[test]
    fn test_toolchain_config_save_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("toolchain.toml");

        let mut config = ToolchainConfig::default();
        config.languages.insert(
            "Fortran".to_string(),
            LanguageOverride {
                compiler: Some(PathBuf::from("/opt/bin/flang")),
                ..Default::default()
            },
        );
        config.save(&path).unwrap();

        let loaded = ToolchainConfig::load(&path).unwrap();
        assert_eq!(
            loaded.language("Fortran").unwrap().compiler,
            Some(PathBuf::from("/opt/bin/flang"))
        );
    }
}
