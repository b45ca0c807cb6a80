//! Per-invocation state.
//!
//! A [`Session`] owns everything one configure/compute/generate run builds
//! up: the target arena, the directory tree, the name registry, the language
//! enabler and the rule-hash store. It is passed explicitly to every phase.

use std::collections::{BTreeMap, HashMap};

use crate::core::directory::{DirectoryId, DirectoryTree};
use crate::core::errors::KilnError;
use crate::core::registry::{RegistryError, TargetRegistry};
use crate::core::target::{Target, TargetArena, TargetId, TargetKind};
use crate::generator::rule_hash::RuleHashStore;
use crate::graph::depends::TargetDepends;
use crate::toolchain::enabler::LanguageEnabler;
use crate::util::context::BuildPaths;
use crate::util::diagnostic::{Diagnostic, Diagnostics};

/// Name of the per-directory umbrella target.
pub const ALL_TARGET: &str = "all";

/// Switches that shape a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Allow utility targets with the same name in different directories
    pub allow_duplicate_custom_targets: bool,
    /// Do not emit install rules anywhere
    pub skip_install_rules: bool,
}

/// State of one kiln run.
#[derive(Debug)]
pub struct Session {
    pub paths: BuildPaths,
    pub options: SessionOptions,
    pub targets: TargetArena,
    pub dirs: DirectoryTree,
    pub registry: TargetRegistry,
    pub enabler: LanguageEnabler,
    pub rule_hashes: RuleHashStore,
    /// Project name → directories belonging to it
    pub project_map: BTreeMap<String, Vec<DirectoryId>>,
    /// Direct dependencies, available once Compute has run
    pub depends: Option<TargetDepends>,
    custom_commands_frozen: bool,
}

impl Session {
    pub fn new(paths: BuildPaths, options: SessionOptions, enabler: LanguageEnabler) -> Self {
        let dirs = DirectoryTree::new(paths.source_dir(), paths.binary_dir());
        let rule_hashes = RuleHashStore::new(paths.binary_dir());
        Session {
            paths,
            options,
            targets: TargetArena::new(),
            dirs,
            registry: TargetRegistry::new(),
            enabler,
            rule_hashes,
            project_map: BTreeMap::new(),
            depends: None,
            custom_commands_frozen: false,
        }
    }

    /// Declare a build target in its directory.
    ///
    /// A reserved name is recorded as a deferred error and the target is
    /// dropped. A name that is already taken is an immediate error, except
    /// for utility targets in different directories when duplicates are
    /// allowed.
    pub fn declare_target(
        &mut self,
        target: Target,
        diags: &mut Diagnostics,
    ) -> Result<Option<TargetId>, KilnError> {
        if TargetRegistry::is_reserved(&target.name) {
            let err = RegistryError::Reserved {
                name: target.name.clone(),
            };
            diags.push(
                err.to_diagnostic()
                    .with_location(self.dirs.get(target.directory).source_dir.clone())
                    .deferred(),
            );
            return Ok(None);
        }

        if target.kind == TargetKind::Utility && self.custom_commands_frozen {
            return Err(KilnError::configuration(format!(
                "custom target `{}` added after dependency tracing",
                target.name
            )));
        }

        self.check_alias_collision(&target)?;

        let mut index = true;
        if let Some(existing) = self.visible_target(target.directory, &target.name) {
            let first = &self.targets[existing];
            let duplicate_ok = self.options.allow_duplicate_custom_targets
                && first.kind == TargetKind::Utility
                && target.kind == TargetKind::Utility
                && first.directory != target.directory;
            if !duplicate_ok {
                return Err(self.duplicate(existing, &target));
            }
            tracing::debug!("allowing duplicate custom target `{}`", target.name);
            index = false;
        }

        let dir = target.directory;
        let id = self.targets.alloc(target);
        self.dirs.get_mut(dir).targets.push(id);
        if index {
            self.registry.index(id, &self.targets[id]);
        }
        Ok(Some(id))
    }

    /// Declare an imported target.
    ///
    /// Global ones go into the registry; the rest are visible from their
    /// directory and the directories below it.
    pub fn declare_imported(&mut self, target: Target) -> Result<TargetId, KilnError> {
        self.check_alias_collision(&target)?;
        if let Some(existing) = self.visible_target(target.directory, &target.name) {
            return Err(self.duplicate(existing, &target));
        }

        let dir = target.directory;
        let name = target.name.clone();
        let id = self.targets.alloc(target);
        if !self.registry.index(id, &self.targets[id]) {
            self.dirs.get_mut(dir).local_imported.insert(name, id);
        }
        Ok(id)
    }

    /// Register an alias.
    pub fn add_alias(&mut self, name: &str, target_name: &str) -> Result<(), RegistryError> {
        self.registry.add_alias(name, target_name)
    }

    /// Resolve a name as seen from `dir`: local imported targets first, then
    /// the global registry (aliases included).
    pub fn find_target_to_use(&self, dir: DirectoryId, name: &str) -> Option<TargetId> {
        self.dirs
            .ancestors(dir)
            .find_map(|ctx| ctx.local_imported.get(name).copied())
            .or_else(|| self.registry.find(name, false))
    }

    fn visible_target(&self, dir: DirectoryId, name: &str) -> Option<TargetId> {
        self.dirs
            .ancestors(dir)
            .find_map(|ctx| ctx.local_imported.get(name).copied())
            .or_else(|| self.registry.find(name, true))
    }

    fn check_alias_collision(&self, target: &Target) -> Result<(), KilnError> {
        match self.registry.alias_target(&target.name) {
            Some(real) => Err(RegistryError::TargetShadowsAlias {
                name: target.name.clone(),
                target: real.to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn duplicate(&self, existing: TargetId, target: &Target) -> KilnError {
        KilnError::DuplicateTarget {
            name: target.name.clone(),
            first: self.dirs.get(self.targets[existing].directory).source_dir.clone(),
            second: self.dirs.get(target.directory).source_dir.clone(),
        }
    }

    /// Add the built-in pseudo-targets.
    ///
    /// Every directory gets an `all` umbrella. The root also gets `clean`,
    /// plus `install` and `test` when there is something to install or test.
    pub fn install_pseudo_targets(&mut self) {
        let ids: Vec<DirectoryId> = self.dirs.iter().map(|d| d.id).collect();
        let any_tests = self.dirs.iter().any(|d| !d.tests.is_empty());
        let any_install = self.dirs.iter().any(|d| !d.install_rules.is_empty());

        for dir in ids {
            let mut names = vec![ALL_TARGET];
            if dir == DirectoryId::ROOT {
                names.push("clean");
                if any_install && !self.options.skip_install_rules {
                    names.push("install");
                }
                if any_tests {
                    names.push("test");
                }
            }
            for name in names {
                let id = self.targets.alloc(Target::new(name, TargetKind::Global, dir));
                self.dirs.get_mut(dir).targets.push(id);
            }
        }
    }

    /// Build the project-name → directories map.
    ///
    /// Each directory is listed once under every distinct project name on
    /// its ancestor chain.
    pub fn fill_project_map(&mut self) {
        let mut map: BTreeMap<String, Vec<DirectoryId>> = BTreeMap::new();
        for ctx in self.dirs.iter() {
            let mut last = "";
            for anc in self.dirs.ancestors(ctx.id) {
                let name = self.dirs.project_name(anc.id).unwrap_or("");
                if name != last {
                    last = name;
                    let list = map.entry(name.to_string()).or_default();
                    if list.last() != Some(&ctx.id) {
                        list.push(ctx.id);
                    }
                }
            }
        }
        self.project_map = map;
    }

    /// Utility targets whose outputs feed other targets in the same
    /// directory. Freezes custom commands.
    pub fn trace_custom_command_depends(&mut self) -> HashMap<TargetId, Vec<TargetId>> {
        let mut producers: HashMap<(DirectoryId, &std::path::Path), TargetId> = HashMap::new();
        for (id, t) in self.targets.iter() {
            if t.kind == TargetKind::Utility {
                for out in &t.outputs {
                    producers.entry((t.directory, out.as_path())).or_insert(id);
                }
            }
        }

        let mut traced: HashMap<TargetId, Vec<TargetId>> = HashMap::new();
        for (id, t) in self.targets.iter() {
            for src in &t.sources {
                if let Some(&producer) = producers.get(&(t.directory, src.as_path())) {
                    if producer != id {
                        let list = traced.entry(id).or_default();
                        if !list.contains(&producer) {
                            list.push(producer);
                        }
                    }
                }
            }
        }

        self.custom_commands_frozen = true;
        traced
    }

    /// Check that every compiled target has sources.
    pub fn check_sources(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for (_, t) in self.targets.iter() {
            if t.imported || !t.kind.compiles_sources() {
                continue;
            }
            if t.sources.is_empty() {
                diags.push(
                    Diagnostic::error(format!("no sources given to target `{}`", t.name))
                        .with_location(self.dirs.get(t.directory).source_dir.clone())
                        .deferred(),
                );
            }
        }
        diags
    }

    /// Name of a target.
    pub fn target_name(&self, id: TargetId) -> &str {
        &self.targets[id].name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_session, ProjectTree};
    use std::path::PathBuf;

    fn lib(name: &str, dir: DirectoryId) -> Target {
        Target::new(name, TargetKind::StaticLib, dir).with_sources([format!("/src/{}.c", name)])
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        let mut diags = Diagnostics::new();
        s.declare_target(lib("core", DirectoryId::ROOT), &mut diags).unwrap();

        let err = s
            .declare_target(lib("core", DirectoryId::ROOT), &mut diags)
            .unwrap_err();
        assert!(matches!(err, KilnError::DuplicateTarget { ref name, .. } if name == "core"));
    }

    #[test]
    fn test_reserved_name_is_deferred() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        let mut diags = Diagnostics::new();
        let id = s.declare_target(lib("clean", DirectoryId::ROOT), &mut diags).unwrap();
        assert!(id.is_none());
        assert_eq!(diags.deferred().count(), 1);
        assert!(diags.has_fatal());
    }

    #[test]
    fn test_duplicate_custom_targets_when_allowed() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        s.options.allow_duplicate_custom_targets = true;
        let sub = s.dirs.add_child(DirectoryId::ROOT, "/src/sub", "/build/sub");
        let mut diags = Diagnostics::new();

        let first = s
            .declare_target(Target::new("docs", TargetKind::Utility, DirectoryId::ROOT), &mut diags)
            .unwrap()
            .unwrap();
        let second = s
            .declare_target(Target::new("docs", TargetKind::Utility, sub), &mut diags)
            .unwrap();
        assert!(second.is_some());
        assert_eq!(s.registry.find("docs", false), Some(first));

        let same_dir = s.declare_target(Target::new("docs", TargetKind::Utility, sub), &mut diags);
        assert!(same_dir.is_err());
    }

    #[test]
    fn test_local_imported_visibility() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        let a = s.dirs.add_child(DirectoryId::ROOT, "/src/a", "/build/a");
        let below = s.dirs.add_child(a, "/src/a/x", "/build/a/x");
        let b = s.dirs.add_child(DirectoryId::ROOT, "/src/b", "/build/b");

        let z = s
            .declare_imported(Target::imported("zlib", TargetKind::SharedLib, a, false))
            .unwrap();
        assert_eq!(s.find_target_to_use(a, "zlib"), Some(z));
        assert_eq!(s.find_target_to_use(below, "zlib"), Some(z));
        assert_eq!(s.find_target_to_use(b, "zlib"), None);
        assert_eq!(s.registry.find("zlib", false), None);
    }

    #[test]
    fn test_local_imported_preferred_over_registry() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        let mut diags = Diagnostics::new();
        let sub = s.dirs.add_child(DirectoryId::ROOT, "/src/sub", "/build/sub");
        let local = s
            .declare_imported(Target::imported("pkg::core", TargetKind::StaticLib, sub, false))
            .unwrap();
        let real = s.declare_target(lib("core", DirectoryId::ROOT), &mut diags).unwrap().unwrap();
        s.add_alias("pkg::core", "core").unwrap();

        assert_eq!(s.find_target_to_use(DirectoryId::ROOT, "pkg::core"), Some(real));
        assert_eq!(s.find_target_to_use(sub, "pkg::core"), Some(local));
    }

    #[test]
    fn test_target_named_like_alias_rejected() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        let mut diags = Diagnostics::new();
        let a = s.declare_target(lib("A", DirectoryId::ROOT), &mut diags).unwrap().unwrap();
        s.add_alias("App", "A").unwrap();

        let err = s
            .declare_target(lib("App", DirectoryId::ROOT), &mut diags)
            .unwrap_err();
        assert!(matches!(
            err,
            KilnError::Registry(RegistryError::TargetShadowsAlias { ref name, ref target })
                if name == "App" && target == "A"
        ));
        assert_eq!(s.registry.find("App", false), Some(a));
        assert_eq!(s.find_target_to_use(DirectoryId::ROOT, "App"), Some(a));
    }

    #[test]
    fn test_imported_named_like_alias_rejected() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        let mut diags = Diagnostics::new();
        let sub = s.dirs.add_child(DirectoryId::ROOT, "/src/sub", "/build/sub");
        let a = s.declare_target(lib("A", DirectoryId::ROOT), &mut diags).unwrap().unwrap();
        s.add_alias("App", "A").unwrap();

        let global = s.declare_imported(Target::imported("App", TargetKind::SharedLib, sub, true));
        assert!(matches!(
            global,
            Err(KilnError::Registry(RegistryError::TargetShadowsAlias { .. }))
        ));
        let local = s.declare_imported(Target::imported("App", TargetKind::SharedLib, sub, false));
        assert!(local.is_err());
        assert_eq!(s.find_target_to_use(sub, "App"), Some(a));
    }

    #[test]
    fn test_project_map_lists_directory_once_per_project() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        s.dirs.get_mut(DirectoryId::ROOT).project_name = Some("top".into());
        let lib = s.dirs.add_child(DirectoryId::ROOT, "/src/lib", "/build/lib");
        let inner = s.dirs.add_child(lib, "/src/lib/inner", "/build/lib/inner");
        s.dirs.get_mut(lib).project_name = Some("libproj".into());
        s.dirs.get_mut(inner).project_name = Some("top".into());

        s.fill_project_map();
        assert_eq!(s.project_map["top"], vec![DirectoryId::ROOT, lib, inner]);
        assert_eq!(s.project_map["libproj"], vec![lib, inner]);
    }

    #[test]
    fn test_project_map_records_name_changes() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        s.dirs.get_mut(DirectoryId::ROOT).project_name = Some("top".into());
        let lib = s.dirs.add_child(DirectoryId::ROOT, "/src/lib", "/build/lib");
        let inner = s.dirs.add_child(lib, "/src/lib/inner", "/build/lib/inner");
        let tools = s.dirs.add_child(DirectoryId::ROOT, "/src/tools", "/build/tools");
        s.dirs.get_mut(lib).project_name = Some("libproj".into());

        s.fill_project_map();
        assert_eq!(s.project_map["top"], vec![DirectoryId::ROOT, lib, inner, tools]);
        assert_eq!(s.project_map["libproj"], vec![lib, inner]);
    }

    #[test]
    fn test_trace_custom_command_depends() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        let mut diags = Diagnostics::new();
        let mut gen = Target::new("gen", TargetKind::Utility, DirectoryId::ROOT);
        gen.outputs = vec![PathBuf::from("/build/gen.c")];
        let gen = s.declare_target(gen, &mut diags).unwrap().unwrap();
        let app = s
            .declare_target(
                Target::new("app", TargetKind::Executable, DirectoryId::ROOT)
                    .with_sources(["/src/main.c", "/build/gen.c"]),
                &mut diags,
            )
            .unwrap()
            .unwrap();

        let traced = s.trace_custom_command_depends();
        assert_eq!(traced[&app], vec![gen]);

        let late = s.declare_target(Target::new("late", TargetKind::Utility, DirectoryId::ROOT), &mut diags);
        assert!(late.is_err());
    }

    #[test]
    fn test_check_sources() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        let mut diags = Diagnostics::new();
        s.declare_target(Target::new("empty", TargetKind::Executable, DirectoryId::ROOT), &mut diags)
            .unwrap();
        s.declare_target(Target::new("iface", TargetKind::Interface, DirectoryId::ROOT), &mut diags)
            .unwrap();
        let report = s.check_sources();
        assert_eq!(report.len(), 1);
        assert!(report.format(false).contains("`empty`"));
    }

    #[test]
    fn test_pseudo_targets() {
        let tree = ProjectTree::new();
        let mut s = test_session(&tree);
        let sub = s.dirs.add_child(DirectoryId::ROOT, "/src/sub", "/build/sub");
        s.install_pseudo_targets();

        let names = |dir: DirectoryId| -> Vec<String> {
            s.dirs.get(dir).targets.iter().map(|&t| s.targets[t].name.clone()).collect()
        };
        assert_eq!(names(DirectoryId::ROOT), vec!["all", "clean"]);
        assert_eq!(names(sub), vec!["all"]);
        assert_eq!(s.registry.find("all", false), None);
    }
}
