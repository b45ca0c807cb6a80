//! Backend strategies.
//!
//! A [`Backend`] turns the computed build graph into files a native build
//! tool understands. The orchestrator calls it once per directory context in
//! Compute order. An [`ExtraGenerator`] runs once after every backend file has
//! been written and produces IDE metadata.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::directory::DirectoryId;
use crate::core::session::Session;
use crate::core::target::{TargetId, TargetKind};
use crate::generator::compile_db::CompileDb;
use crate::generator::generator_target::{link_item_arg, GeneratorTarget};
use crate::generator::makefiles::Makefiles;
use crate::generator::manifest::ManifestBackend;
use crate::generator::rule_hash::RuleHashStore;
use crate::generator::test_manifest;
use crate::graph::closure::target_set;
use crate::graph::depends::TargetDepends;
use crate::toolchain::enabler::LanguageState;
use crate::util::diagnostic::Diagnostics;
use crate::util::process::ProcessBuilder;

/// Backend used when neither the CLI nor config picks one.
pub const DEFAULT_BACKEND: &str = "makefiles";

/// Names accepted by [`backend_for`].
pub const BACKENDS: &[&str] = &["makefiles", "manifest"];

/// Names accepted by [`extra_generator_for`].
pub const EXTRA_GENERATORS: &[&str] = &["compile-db"];

/// Read-only view handed to backends during Generate.
pub struct EmitContext<'a> {
    pub session: &'a Session,
    pub depends: &'a TargetDepends,
    pub targets: &'a BTreeMap<TargetId, GeneratorTarget>,
}

impl<'a> EmitContext<'a> {
    pub fn generator_target(&self, id: TargetId) -> Option<&'a GeneratorTarget> {
        self.targets.get(&id)
    }

    /// Targets built by `dir`'s default goal.
    pub fn default_build(&self, dir: DirectoryId) -> BTreeSet<TargetId> {
        let contexts = self.session.dirs.preorder(dir);
        target_set(
            dir,
            &contexts,
            &self.session.dirs,
            &self.session.targets,
            self.depends,
        )
    }

    /// Include directories of `id` followed by those of everything it
    /// depends on, first occurrence kept.
    pub fn include_dirs(&self, id: TargetId) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for t in self.dependency_walk(id) {
            let target = &self.session.targets[t];
            let base = &self.session.dirs.get(target.directory).source_dir;
            for dir in &target.include_dirs {
                let path = base.join(dir);
                if seen.insert(path.clone()) {
                    out.push(path);
                }
            }
        }
        out
    }

    /// Link line entries after the objects of `id`: dependency artifacts in
    /// dependency order, each followed by its plain link items.
    pub fn link_libraries(&self, id: TargetId) -> Vec<String> {
        let mut out = Vec::new();
        for t in self.dependency_walk(id) {
            if t != id {
                let target = &self.session.targets[t];
                let linkable = target.kind.is_linkable() || target.imported;
                if let Some(gt) = self.generator_target(t) {
                    if target.kind == TargetKind::ObjectLib {
                        out.extend(gt.objects.iter().map(|o| o.object.display().to_string()));
                    } else if linkable {
                        if let Some(output) = &gt.output {
                            out.push(output.display().to_string());
                        }
                    }
                }
            }
            out.extend(self.depends.link_items(t).iter().map(|i| link_item_arg(i)));
        }
        out
    }

    /// `id` and its transitive dependencies, depth first, each once.
    fn dependency_walk(&self, id: TargetId) -> Vec<TargetId> {
        fn visit(id: TargetId, deps: &TargetDepends, seen: &mut HashSet<TargetId>, out: &mut Vec<TargetId>) {
            if !seen.insert(id) {
                return;
            }
            out.push(id);
            for dep in deps.direct(id) {
                visit(dep, deps, seen, out);
            }
        }
        let mut out = Vec::new();
        visit(id, self.depends, &mut HashSet::new(), &mut out);
        out
    }
}

/// Strategy writing one native build-tool format.
pub trait Backend {
    fn name(&self) -> &'static str;

    /// Called once for each language that became ready during Configure.
    fn enable_language_hook(&self, _state: &LanguageState, _diags: &mut Diagnostics) {}

    fn supports_duplicate_custom_targets(&self) -> bool {
        false
    }

    /// Write the build files of `dir`. File rules are recorded in `hashes`.
    fn emit_build_files(
        &self,
        ctx: &EmitContext<'_>,
        dir: DirectoryId,
        hashes: &mut RuleHashStore,
    ) -> Result<Vec<PathBuf>>;

    /// Write the install rules of `dir`, if it has any.
    fn emit_install_rules(&self, ctx: &EmitContext<'_>, dir: DirectoryId) -> Result<Option<PathBuf>>;

    /// Register the tests of `dir`.
    fn emit_test_files(&self, ctx: &EmitContext<'_>, dir: DirectoryId) -> Result<PathBuf> {
        test_manifest::write(ctx, dir)
    }

    /// Native command building `target` (or the default goal) in
    /// `binary_dir`. `None` when the format has no build tool.
    fn build_command(&self, binary_dir: &Path, target: Option<&str>) -> Option<ProcessBuilder>;
}

/// Post-pass writing IDE metadata.
pub trait ExtraGenerator {
    fn name(&self) -> &'static str;

    fn generate(&self, ctx: &EmitContext<'_>) -> Result<PathBuf>;
}

pub fn backend_for(name: &str) -> Option<Box<dyn Backend>> {
    match name {
        "makefiles" => Some(Box::new(Makefiles::new())),
        "manifest" => Some(Box::new(ManifestBackend)),
        _ => None,
    }
}

pub fn extra_generator_for(name: &str) -> Option<Box<dyn ExtraGenerator>> {
    match name {
        "compile-db" => Some(Box::new(CompileDb)),
        _ => None,
    }
}
