//! Configure → Compute → Generate.
//!
//! [`GlobalGenerator`] owns the [`Session`] for one run and a backend
//! strategy. Each phase returns the [`Diagnostics`] it collected; hard errors
//! ([`KilnError`], I/O) come back as `Err`. [`GlobalGenerator::run`] stops
//! after the first phase that reports a fatal diagnostic.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::directory::{DirectoryId, TestDecl};
use crate::core::errors::KilnError;
use crate::core::project::{
    expand_vars, notfound_variable, AliasDecl, ProjectDescription, TargetDecl, DEFAULT_LANGUAGES,
};
use crate::core::session::Session;
use crate::core::target::{Target, TargetId};
use crate::generator::backend::{Backend, EmitContext, ExtraGenerator};
use crate::generator::generator_target::GeneratorTarget;
use crate::generator::rule_hash::RuleHashStore;
use crate::generator::summary::{self, GeneratorRecord};
use crate::graph::depends::TargetDepends;
use crate::util::context::PROJECT_FILE;
use crate::util::diagnostic::{suggestions, Diagnostic, Diagnostics};
use crate::util::fs;
use crate::util::shell::{Shell, Status};

/// Drives one generation run.
pub struct GlobalGenerator {
    session: Session,
    backend: Box<dyn Backend>,
    extra: Option<Box<dyn ExtraGenerator>>,
    shell: Option<Arc<Shell>>,
    generator_targets: BTreeMap<TargetId, GeneratorTarget>,
    compute_order: Vec<DirectoryId>,
}

impl GlobalGenerator {
    pub fn new(session: Session, backend: Box<dyn Backend>) -> Self {
        GlobalGenerator {
            session,
            backend,
            extra: None,
            shell: None,
            generator_targets: BTreeMap::new(),
            compute_order: Vec::new(),
        }
    }

    /// Run `extra` after the backend files are written.
    pub fn with_extra_generator(mut self, extra: Box<dyn ExtraGenerator>) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Report status lines and progress through `shell`.
    pub fn with_shell(mut self, shell: Arc<Shell>) -> Self {
        self.shell = Some(shell);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn generator_targets(&self) -> &BTreeMap<TargetId, GeneratorTarget> {
        &self.generator_targets
    }

    /// Run every phase, stopping after the first one with a fatal
    /// diagnostic. The returned diagnostics cover every phase that ran.
    pub fn run(&mut self) -> Result<Diagnostics> {
        let mut all = Diagnostics::new();

        all.merge(self.configure()?);
        if all.has_fatal() {
            return Ok(all);
        }
        all.merge(self.compute()?);
        if all.has_fatal() {
            return Ok(all);
        }
        all.merge(self.generate()?);
        Ok(all)
    }

    // ------------------------------------------------------------------
    // Configure
    // ------------------------------------------------------------------

    /// Read every `Kiln.toml`, enable languages and declare targets.
    pub fn configure(&mut self) -> Result<Diagnostics> {
        let mut diags = Diagnostics::new();
        if let Some(shell) = &self.shell {
            shell.status(Status::Configuring, self.session.paths.source_dir().display());
        }

        self.configure_directory(DirectoryId::ROOT, &mut diags)?;
        self.session.install_pseudo_targets();
        diags.merge(self.notfound_sweep());

        tracing::debug!(
            "configured {} directories, {} targets",
            self.session.dirs.len(),
            self.session.targets.len()
        );
        Ok(diags)
    }

    fn configure_directory(&mut self, dir: DirectoryId, diags: &mut Diagnostics) -> Result<()> {
        let (source_dir, binary_dir) = {
            let ctx = self.session.dirs.get(dir);
            (ctx.source_dir.clone(), ctx.binary_dir.clone())
        };
        let manifest_path = source_dir.join(PROJECT_FILE);
        let desc = ProjectDescription::load(&manifest_path)?;
        tracing::debug!("configuring {}", source_dir.display());

        self.set_builtin_variables(dir);
        self.configure_project(dir, &desc, &manifest_path, diags)?;

        {
            let ctx = self.session.dirs.get_mut(dir);
            ctx.exclude_from_all = desc.directory.exclude_from_all;
            for (name, value) in &desc.variables {
                let value = expand_vars(value, &ctx.variables);
                ctx.variables.insert(name.clone(), value);
            }
        }

        for decl in &desc.imported {
            let vars = &self.session.dirs.get(dir).variables;
            let mut target = Target::imported(decl.name.clone(), decl.kind, dir, decl.global);
            target.location = decl
                .location
                .as_ref()
                .map(|loc| source_dir.join(expand_vars(loc, vars)));
            self.session.declare_imported(target)?;
        }

        for decl in &desc.targets {
            let target = self.build_target(dir, decl)?;
            self.session.declare_target(target, diags)?;
        }

        for sub in &desc.directory.subdirs {
            let sub_source = source_dir.join(sub);
            if !sub_source.join(PROJECT_FILE).is_file() {
                diags.push(
                    Diagnostic::error(format!("subdirectory `{}` has no {}", sub, PROJECT_FILE))
                        .with_location(manifest_path.clone())
                        .deferred(),
                );
                continue;
            }
            let child = self.session.dirs.add_child(dir, sub_source, binary_dir.join(sub));
            self.configure_directory(child, diags)?;
        }

        for AliasDecl { name, target } in &desc.aliases {
            if let Err(e) = self.session.add_alias(name, target) {
                diags.push(e.to_diagnostic().with_location(manifest_path.clone()).deferred());
            }
        }

        let vars = self.session.dirs.get(dir).variables.clone();
        let ctx = self.session.dirs.get_mut(dir);
        for test in &desc.tests {
            ctx.tests.push(TestDecl {
                name: test.name.clone(),
                command: test.command.iter().map(|a| expand_vars(a, &vars)).collect(),
                working_dir: test.working_dir.as_ref().map(PathBuf::from),
            });
        }
        if desc.directory.skip_install_rules {
            tracing::debug!("skipping install rules of {}", source_dir.display());
        } else {
            ctx.install_rules.extend(desc.install.iter().cloned());
        }
        Ok(())
    }

    fn set_builtin_variables(&mut self, dir: DirectoryId) {
        let top_source = self.session.paths.source_dir().display().to_string();
        let top_binary = self.session.paths.binary_dir().display().to_string();
        let ctx = self.session.dirs.get_mut(dir);
        let current_source = ctx.source_dir.display().to_string();
        let current_binary = ctx.binary_dir.display().to_string();
        let vars = &mut ctx.variables;
        vars.insert("KILN_SOURCE_DIR".into(), top_source);
        vars.insert("KILN_BINARY_DIR".into(), top_binary);
        vars.insert("KILN_CURRENT_SOURCE_DIR".into(), current_source);
        vars.insert("KILN_CURRENT_BINARY_DIR".into(), current_binary);
    }

    fn configure_project(
        &mut self,
        dir: DirectoryId,
        desc: &ProjectDescription,
        manifest_path: &Path,
        diags: &mut Diagnostics,
    ) -> Result<()> {
        let (name, required, optional) = match &desc.project {
            Some(project) => (
                project.name.clone(),
                project.languages(),
                project.optional_languages.clone(),
            ),
            None if dir == DirectoryId::ROOT => {
                let name = self
                    .session
                    .paths
                    .source_dir()
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "project".to_string());
                diags.push(
                    Diagnostic::warning(format!(
                        "no [project] section in the top-level {}; using `{}`",
                        PROJECT_FILE, name
                    ))
                    .with_location(manifest_path.to_path_buf())
                    .with_suggestion(suggestions::NO_PROJECT),
                );
                let required = DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect();
                (name, required, Vec::new())
            }
            None => return Ok(()),
        };

        {
            let ctx = self.session.dirs.get_mut(dir);
            ctx.project_name = Some(name.clone());
            ctx.variables.insert("PROJECT_NAME".into(), name);
        }

        let report = self
            .session
            .enabler
            .enable(&self.session.paths, &required, &optional)?;
        for lang in &report.newly_ready {
            if let Some(state) = self.session.enabler.state(lang) {
                if let Some(shell) = &self.shell {
                    let compiler = state
                        .compiler
                        .as_deref()
                        .map(|c| c.display().to_string())
                        .unwrap_or_default();
                    shell.status(Status::Enabling, format!("{} ({})", lang, compiler));
                }
                self.backend.enable_language_hook(state, diags);
            }
        }
        diags.merge(report.diagnostics);
        Ok(())
    }

    fn build_target(&self, dir: DirectoryId, decl: &TargetDecl) -> Result<Target> {
        let ctx = self.session.dirs.get(dir);
        let vars = &ctx.variables;
        let expand_all = |values: &[String]| -> Vec<String> {
            values
                .iter()
                .map(|v| expand_vars(v, vars))
                .filter(|v| !v.is_empty())
                .collect()
        };

        let patterns = expand_all(&decl.sources);
        let sources = fs::glob_files(&ctx.source_dir, &patterns)
            .with_context(|| format!("failed to expand sources of target `{}`", decl.name))?;

        let mut target = Target::new(decl.name.clone(), decl.kind, dir)
            .with_sources(sources)
            .with_depends(expand_all(&decl.depends));
        target.exclude_from_all = decl.exclude_from_all;
        target.export = decl.export;
        target.link_items = expand_all(&decl.link);
        target.include_dirs = expand_all(&decl.include_dirs);
        target.commands = decl.commands.iter().map(|c| expand_all(c)).collect();
        target.outputs = expand_all(&decl.outputs)
            .into_iter()
            .map(|o| ctx.binary_dir.join(o))
            .collect();
        Ok(target)
    }

    /// Report `-NOTFOUND` values used as link items or include directories.
    fn notfound_sweep(&self) -> Diagnostics {
        let mut uses: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for (_, target) in self.session.targets.iter() {
            let dir = self.session.dirs.get(target.directory).source_dir.display().to_string();
            for item in &target.link_items {
                if let Some(var) = notfound_variable(item) {
                    uses.entry(var).or_default().insert(format!(
                        "linked by target `{}` in directory {}",
                        target.name, dir
                    ));
                }
            }
            for inc in &target.include_dirs {
                if let Some(var) = notfound_variable(inc) {
                    uses.entry(var).or_default().insert(format!(
                        "used as include directory in target `{}` in directory {}",
                        target.name, dir
                    ));
                }
            }
        }

        let mut diags = Diagnostics::new();
        for (var, lines) in uses {
            let mut diag = Diagnostic::error(format!(
                "variable `{}` is used in this project but it is set to NOTFOUND",
                var
            ))
            .deferred();
            for line in lines {
                diag = diag.with_context(line);
            }
            diags.push(diag.with_suggestion(format!("Set `{}` in [variables]", var)));
        }
        diags
    }

    // ------------------------------------------------------------------
    // Compute
    // ------------------------------------------------------------------

    /// Build generator targets and the dependency graph.
    pub fn compute(&mut self) -> Result<Diagnostics> {
        let mut diags = Diagnostics::new();

        if self.session.options.allow_duplicate_custom_targets
            && !self.backend.supports_duplicate_custom_targets()
        {
            return Err(KilnError::configuration(format!(
                "the `{}` backend does not support duplicate custom targets",
                self.backend.name()
            ))
            .into());
        }

        self.generator_targets.clear();
        for (id, _) in self.session.targets.iter() {
            let mut gt = GeneratorTarget::new(&self.session, id);
            gt.classify_sources(&self.session, &mut diags);
            self.generator_targets.insert(id, gt);
        }

        self.session.fill_project_map();
        let traced = self.session.trace_custom_command_depends();
        diags.merge(self.session.check_sources());

        for gt in self.generator_targets.values_mut() {
            gt.compute_linker_language(&self.session.enabler, &mut diags);
        }

        let depends = TargetDepends::compute(&self.session, &traced)?;
        self.session.depends = Some(depends);
        self.compute_order = self.session.dirs.preorder(DirectoryId::ROOT);
        Ok(diags)
    }

    // ------------------------------------------------------------------
    // Generate
    // ------------------------------------------------------------------

    /// Write every build file, then the cross-cutting artifacts.
    pub fn generate(&mut self) -> Result<Diagnostics> {
        let binary_dir = self.session.paths.binary_dir().to_path_buf();
        let mut hashes = std::mem::replace(&mut self.session.rule_hashes, RuleHashStore::new(&binary_dir));
        let result = self.emit_all(&mut hashes);
        self.session.rule_hashes = hashes;
        result
    }

    fn emit_all(&self, hashes: &mut RuleHashStore) -> Result<Diagnostics> {
        let diags = Diagnostics::new();
        let session = &self.session;
        let paths = &session.paths;
        let depends = session
            .depends
            .as_ref()
            .context("generate requires a computed dependency graph")?;
        let ctx = EmitContext {
            session,
            depends,
            targets: &self.generator_targets,
        };

        let span = self
            .shell
            .as_ref()
            .map(|s| s.span(Status::Generating, format!("{} build files", self.backend.name())));
        let mut progress = self
            .shell
            .as_ref()
            .map(|s| s.progress(self.compute_order.len() as u64, "directories"));

        for &dir in &self.compute_order {
            self.backend.emit_build_files(&ctx, dir, hashes)?;
            if !session.options.skip_install_rules {
                self.backend.emit_install_rules(&ctx, dir)?;
            }
            self.backend.emit_test_files(&ctx, dir)?;
            if let Some(p) = progress.as_mut() {
                p.inc(1);
            }
        }
        if let Some(p) = &progress {
            p.finish();
        }

        summary::write_exports(&ctx, paths)?;
        summary::write_target_directories(&ctx, paths)?;
        GeneratorRecord::new(
            self.backend.name(),
            paths.source_dir(),
            self.extra.as_ref().map(|e| e.name()),
        )
        .save(&paths.generator_record())?;

        let removed = hashes.check(&paths.rule_hashes())?;
        if !removed.is_empty() {
            tracing::info!("removed {} outputs whose rules changed", removed.len());
        }
        hashes.write(&paths.rule_hashes())?;

        if let Some(extra) = &self.extra {
            let path = extra.generate(&ctx)?;
            tracing::debug!("{} wrote {}", extra.name(), path.display());
        }

        if let Some(span) = span {
            span.finish_with_message(format!("{} directories", self.compute_order.len()));
        }
        Ok(diags)
    }
}
