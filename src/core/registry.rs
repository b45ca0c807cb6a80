//! Target registry - the process-wide name index.
//!
//! Maps target names to [`TargetId`]s, resolves aliases and owns the list of
//! reserved pseudo-target names. The registry performs no I/O.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::core::target::{Target, TargetId};
use crate::util::diagnostic::Diagnostic;

/// Built-in pseudo-target names no user target or alias may take.
pub const RESERVED_NAMES: &[&str] = &[
    "all",
    "help",
    "install",
    "preinstall",
    "test",
    "package",
    "package_source",
    "clean",
    "edit_cache",
    "rebuild_cache",
    "ZERO_CHECK",
];

/// Error raised while registering an alias.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum RegistryError {
    #[error("`{name}` is a reserved target name")]
    #[diagnostic(code(kiln::registry::reserved))]
    Reserved { name: String },

    #[error("alias `{alias}` has the same name as an existing target")]
    #[diagnostic(code(kiln::registry::alias_shadows_target))]
    AliasShadowsTarget { alias: String },

    #[error("target `{name}` has the same name as an alias of `{target}`")]
    #[diagnostic(code(kiln::registry::target_shadows_alias))]
    TargetShadowsAlias { name: String, target: String },

    #[error("alias `{alias}` is already defined for `{existing}`")]
    #[diagnostic(code(kiln::registry::duplicate_alias))]
    DuplicateAlias { alias: String, existing: String },

    #[error("alias `{alias}` refers to unknown target `{target}`")]
    #[diagnostic(code(kiln::registry::unknown_target))]
    UnknownTarget { alias: String, target: String },
}

impl RegistryError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            RegistryError::Reserved { .. } => diag
                .with_context(format!("reserved names: {}", RESERVED_NAMES.join(", ")))
                .with_suggestion("Rename the target or alias"),
            RegistryError::AliasShadowsTarget { alias } => diag
                .with_suggestion(format!("Pick an alias name other than `{}`", alias)),
            RegistryError::TargetShadowsAlias { name, .. } => diag
                .with_suggestion(format!("Rename the target or the `{}` alias", name)),
            RegistryError::DuplicateAlias { .. } => diag,
            RegistryError::UnknownTarget { .. } => {
                diag.with_suggestion("Declare the target before the alias")
            }
        }
    }
}

/// Name → target index with alias resolution.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    index: HashMap<String, TargetId>,
    aliases: HashMap<String, String>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        TargetRegistry::default()
    }

    /// Index a target by name.
    ///
    /// Imported targets without global visibility are skipped; they are only
    /// reachable through their directory. Returns whether the target was
    /// indexed.
    pub fn index(&mut self, id: TargetId, target: &Target) -> bool {
        if target.imported && !target.global {
            return false;
        }
        self.index.insert(target.name.clone(), id);
        true
    }

    /// Look up a target by name, resolving aliases unless `exclude_aliases`.
    pub fn find(&self, name: &str, exclude_aliases: bool) -> Option<TargetId> {
        if !exclude_aliases {
            if let Some(real) = self.aliases.get(name) {
                if let Some(&id) = self.index.get(real) {
                    return Some(id);
                }
            }
        }
        self.index.get(name).copied()
    }

    /// Whether a concrete target with this name is indexed.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Record `name` as an alias of `target_name`.
    ///
    /// An alias of an alias is stored against the concrete target.
    pub fn add_alias(&mut self, name: &str, target_name: &str) -> Result<(), RegistryError> {
        if Self::is_reserved(name) {
            return Err(RegistryError::Reserved {
                name: name.to_string(),
            });
        }
        if self.index.contains_key(name) {
            return Err(RegistryError::AliasShadowsTarget {
                alias: name.to_string(),
            });
        }
        if let Some(existing) = self.aliases.get(name) {
            return Err(RegistryError::DuplicateAlias {
                alias: name.to_string(),
                existing: existing.clone(),
            });
        }

        let concrete = self
            .aliases
            .get(target_name)
            .cloned()
            .unwrap_or_else(|| target_name.to_string());

        if !self.index.contains_key(&concrete) {
            return Err(RegistryError::UnknownTarget {
                alias: name.to_string(),
                target: target_name.to_string(),
            });
        }

        tracing::debug!("alias `{}` -> `{}`", name, concrete);
        self.aliases.insert(name.to_string(), concrete);
        Ok(())
    }

    /// Check whether `name` is a built-in pseudo-target name.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED_NAMES.contains(&name)
    }

    /// Whether `name` is a registered alias.
    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Target name an alias stands for.
    pub fn alias_target(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    /// Aliases pointing at `target_name`, sorted.
    pub fn aliases_of(&self, target_name: &str) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .aliases
            .iter()
            .filter(|(_, real)| real.as_str() == target_name)
            .map(|(alias, _)| alias.as_str())
            .collect();
        out.sort_unstable();
        out
    }

    /// All aliases, sorted by name.
    pub fn aliases(&self) -> BTreeMap<&str, &str> {
        self.aliases
            .iter()
            .map(|(a, t)| (a.as_str(), t.as_str()))
            .collect()
    }

    /// Number of indexed targets.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
