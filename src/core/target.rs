//! Target definitions - what gets built.
//!
//! Targets live in a [`TargetArena`] owned by the session and are addressed
//! by [`TargetId`]. Everything else (the registry, dependency sets, directory
//! contexts) refers to targets by id.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::directory::DirectoryId;

/// Index of a target in the [`TargetArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u32);

impl TargetId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The kind of target being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    /// Executable binary
    #[serde(alias = "exe", alias = "bin")]
    Executable,

    /// Static library (.a / .lib)
    #[serde(alias = "static")]
    StaticLib,

    /// Shared/dynamic library (.so / .dylib / .dll)
    #[serde(alias = "shared")]
    SharedLib,

    /// Loadable module, never linked against
    Module,

    /// Collection of object files
    ObjectLib,

    /// Usage requirements only, nothing is built
    Interface,

    /// Runs custom commands
    Utility,

    /// Built-in pseudo-target such as `all`
    Global,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Executable => "executable",
            TargetKind::StaticLib => "static-lib",
            TargetKind::SharedLib => "shared-lib",
            TargetKind::Module => "module",
            TargetKind::ObjectLib => "object-lib",
            TargetKind::Interface => "interface",
            TargetKind::Utility => "utility",
            TargetKind::Global => "global",
        }
    }

    /// Check if this is a library others can link.
    pub fn is_linkable(&self) -> bool {
        matches!(
            self,
            TargetKind::StaticLib | TargetKind::SharedLib | TargetKind::ObjectLib
        )
    }

    /// Whether the target compiles sources.
    pub fn compiles_sources(&self) -> bool {
        matches!(
            self,
            TargetKind::Executable
                | TargetKind::StaticLib
                | TargetKind::SharedLib
                | TargetKind::Module
                | TargetKind::ObjectLib
        )
    }

    /// Get the output filename for a target of this kind.
    pub fn output_filename(&self, name: &str) -> Option<String> {
        let windows = cfg!(windows);
        let macos = cfg!(target_os = "macos");
        let file = match self {
            TargetKind::Executable if windows => format!("{}.exe", name),
            TargetKind::Executable => name.to_string(),
            TargetKind::StaticLib if windows => format!("{}.lib", name),
            TargetKind::StaticLib => format!("lib{}.a", name),
            TargetKind::SharedLib | TargetKind::Module if windows => format!("{}.dll", name),
            TargetKind::SharedLib if macos => format!("lib{}.dylib", name),
            TargetKind::SharedLib => format!("lib{}.so", name),
            TargetKind::Module => format!("{}.so", name),
            TargetKind::ObjectLib | TargetKind::Interface | TargetKind::Utility | TargetKind::Global => {
                return None
            }
        };
        Some(file)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A build target with its configuration.
#[derive(Debug, Clone)]
pub struct Target {
    /// Unique target name
    pub name: String,

    /// What kind of artifact to produce
    pub kind: TargetKind,

    /// Owning directory context
    pub directory: DirectoryId,

    /// Left out of the directory's default build
    pub exclude_from_all: bool,

    /// Provided from outside the build
    pub imported: bool,

    /// Imported target visible from every directory
    pub global: bool,

    /// Source files, absolute
    pub sources: Vec<PathBuf>,

    /// Declared dependency names (targets or plain link items)
    pub depends: Vec<String>,

    /// Link items after variable expansion
    pub link_items: Vec<String>,

    /// Include directories after variable expansion
    pub include_dirs: Vec<String>,

    /// Commands of a utility target, each an argv vector
    pub commands: Vec<Vec<String>>,

    /// Files produced by the commands, absolute
    pub outputs: Vec<PathBuf>,

    /// Listed in the export artifact
    pub export: bool,

    /// On-disk location of an imported target
    pub location: Option<PathBuf>,
}

impl Target {
    /// Create a new target with the given name and kind.
    pub fn new(name: impl Into<String>, kind: TargetKind, directory: DirectoryId) -> Self {
        Target {
            name: name.into(),
            kind,
            directory,
            exclude_from_all: false,
            imported: false,
            global: false,
            sources: Vec::new(),
            depends: Vec::new(),
            link_items: Vec::new(),
            include_dirs: Vec::new(),
            commands: Vec::new(),
            outputs: Vec::new(),
            export: false,
            location: None,
        }
    }

    /// Create an imported target.
    pub fn imported(
        name: impl Into<String>,
        kind: TargetKind,
        directory: DirectoryId,
        global: bool,
    ) -> Self {
        let mut t = Self::new(name, kind, directory);
        t.imported = true;
        t.global = global;
        t
    }

    /// Add sources.
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Add dependency names.
    pub fn with_depends(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends = names.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the target as excluded from its directory's default build.
    pub fn excluded(mut self) -> Self {
        self.exclude_from_all = true;
        self
    }

    /// Get the output filename for this target.
    pub fn output_filename(&self) -> Option<String> {
        self.kind.output_filename(&self.name)
    }
}

/// Owner of every target in a session.
#[derive(Debug, Default)]
pub struct TargetArena {
    targets: Vec<Target>,
}

impl TargetArena {
    pub fn new() -> Self {
        TargetArena::default()
    }

    /// Store a target and return its id.
    pub fn alloc(&mut self, target: Target) -> TargetId {
        let id = TargetId(self.targets.len() as u32);
        self.targets.push(target);
        id
    }

    pub fn get(&self, id: TargetId) -> &Target {
        &self.targets[id.index()]
    }

    pub fn get_mut(&mut self, id: TargetId) -> &mut Target {
        &mut self.targets[id.index()]
    }

    /// Iterate over all targets in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &Target)> {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, t)| (TargetId(i as u32), t))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl std::ops::Index<TargetId> for TargetArena {
    type Output = Target;

    fn index(&self, id: TargetId) -> &Target {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let kind: TargetKind = serde_json::from_str("\"static-lib\"").unwrap();
        assert_eq!(kind, TargetKind::StaticLib);
        let kind: TargetKind = serde_json::from_str("\"exe\"").unwrap();
        assert_eq!(kind, TargetKind::Executable);
        assert_eq!(TargetKind::ObjectLib.to_string(), "object-lib");
    }

    #[test]
    fn test_output_filename() {
        assert!(TargetKind::Interface.output_filename("x").is_none());
        let lib = TargetKind::StaticLib.output_filename("core").unwrap();
        assert!(lib.contains("core"));
    }

    #[test]
    fn test_arena_ids_are_stable() {
        let mut arena = TargetArena::new();
        let dir = DirectoryId::ROOT;
        let a = arena.alloc(Target::new("a", TargetKind::StaticLib, dir));
        let b = arena.alloc(Target::new("b", TargetKind::Executable, dir).with_depends(["a"]));

        assert_ne!(a, b);
        assert_eq!(arena[a].name, "a");
        assert_eq!(arena.get(b).depends, vec!["a".to_string()]);
        assert_eq!(arena.iter().count(), 2);
    }
}
