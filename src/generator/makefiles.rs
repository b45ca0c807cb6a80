//! Makefile backend.
//!
//! Every directory context gets a self-contained `Makefile` in its binary
//! dir holding the rules of its default build plus its own targets, so
//! `make -C <dir>` works anywhere in the tree. Install rules go to a
//! separate `install.mk` driven from the top-level `install` goal.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::directory::DirectoryId;
use crate::core::session::ALL_TARGET;
use crate::core::target::{TargetId, TargetKind};
use crate::generator::backend::{Backend, EmitContext};
use crate::generator::rule_hash::RuleHashStore;
use crate::graph::closure::expand;
use crate::toolchain::enabler::LanguageState;
use crate::util::context::KILN_VERSION;
use crate::util::diagnostic::{Diagnostic, Diagnostics};
use crate::util::fs;
use crate::util::process::{find_executable, ProcessBuilder};

const MAKEFILE: &str = "Makefile";
const INSTALL_FILE: &str = "install.mk";

pub struct Makefiles {
    /// Program the `test` goal runs
    kiln: PathBuf,
}

impl Makefiles {
    pub fn new() -> Self {
        let kiln = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("kiln"));
        Makefiles { kiln }
    }
}

impl Default for Makefiles {
    fn default() -> Self {
        Makefiles::new()
    }
}

impl Backend for Makefiles {
    fn name(&self) -> &'static str {
        "makefiles"
    }

    fn enable_language_hook(&self, state: &LanguageState, diags: &mut Diagnostics) {
        let is_msvc = state
            .compiler
            .as_deref()
            .and_then(|c| c.file_stem())
            .is_some_and(|stem| stem.eq_ignore_ascii_case("cl"));
        if is_msvc {
            diags.push(Diagnostic::warning(format!(
                "the makefiles backend writes GCC-style command lines; `cl` ({}) may reject them",
                state.name
            )));
        }
    }

    fn emit_build_files(
        &self,
        ctx: &EmitContext<'_>,
        dir: DirectoryId,
        hashes: &mut RuleHashStore,
    ) -> Result<Vec<PathBuf>> {
        let session = ctx.session;
        let context = session.dirs.get(dir);
        let default_build = ctx.default_build(dir);

        let mut rules = BTreeSet::new();
        for &id in default_build.iter().chain(&context.targets) {
            expand(id, ctx.depends, &mut rules);
        }
        let ordered: Vec<TargetId> = ctx
            .depends
            .topological_order()
            .into_iter()
            .filter(|id| rules.contains(id) && has_rules(ctx, *id))
            .collect();

        let mut out = String::new();
        writeln!(
            out,
            "# Generated by kiln {} from {}. Do not edit.\n",
            KILN_VERSION,
            context.source_dir.display()
        )?;
        let phony: Vec<&str> = ordered
            .iter()
            .map(|&id| session.target_name(id))
            .chain(std::iter::once(ALL_TARGET))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        writeln!(out, ".PHONY: {}", phony.join(" "))?;
        writeln!(out, ".DEFAULT_GOAL := {}\n", ALL_TARGET)?;

        let all: Vec<&str> = ordered
            .iter()
            .copied()
            .filter(|id| default_build.contains(id))
            .filter(|&id| session.targets[id].kind != TargetKind::Global)
            .map(|id| session.target_name(id))
            .collect();
        writeln!(out, "{}: {}\n", ALL_TARGET, all.join(" "))?;

        for &id in &ordered {
            let target = &session.targets[id];
            if target.kind == TargetKind::Global {
                if target.directory == dir {
                    self.pseudo_rule(ctx, target.name.as_str(), &ordered, &mut out)?;
                }
                continue;
            }
            self.target_rules(ctx, id, hashes, &mut out)?;
        }

        let path = context.binary_dir.join(MAKEFILE);
        if fs::write_if_changed(&path, &out)? {
            tracing::debug!("wrote {}", path.display());
        }
        Ok(vec![path])
    }

    fn emit_install_rules(&self, ctx: &EmitContext<'_>, dir: DirectoryId) -> Result<Option<PathBuf>> {
        let session = ctx.session;
        let context = session.dirs.get(dir);
        if context.install_rules.is_empty() {
            return Ok(None);
        }

        let mut out = String::new();
        writeln!(out, "# Generated by kiln {}. Do not edit.\n", KILN_VERSION)?;
        out.push_str("PREFIX ?= /usr/local\n\n.PHONY: install\ninstall:\n");
        for rule in &context.install_rules {
            let dest = format!("$(DESTDIR)$(PREFIX)/{}", rule.destination);
            writeln!(out, "\tmkdir -p {}", dest)?;

            for name in &rule.targets {
                let artifact = session
                    .find_target_to_use(dir, name)
                    .and_then(|id| ctx.generator_target(id))
                    .and_then(|gt| gt.output.as_ref());
                match artifact {
                    Some(path) => writeln!(out, "\tcp {} {}/", make_word(&path.display().to_string()), dest)?,
                    None => tracing::warn!("install rule names unknown target `{}`", name),
                }
            }
            for file in &rule.files {
                let src = context.source_dir.join(file);
                writeln!(out, "\tcp {} {}/", make_word(&src.display().to_string()), dest)?;
            }
        }

        let path = context.binary_dir.join(INSTALL_FILE);
        fs::write_if_changed(&path, &out)?;
        Ok(Some(path))
    }

    fn build_command(&self, binary_dir: &Path, target: Option<&str>) -> Option<ProcessBuilder> {
        let make = find_executable("make").or_else(|| find_executable("gmake"))?;
        let mut cmd = ProcessBuilder::new(make).arg("-C").arg(binary_dir);
        if let Some(target) = target {
            cmd = cmd.arg(target);
        }
        Some(cmd)
    }
}

impl Makefiles {
    fn target_rules(
        &self,
        ctx: &EmitContext<'_>,
        id: TargetId,
        hashes: &mut RuleHashStore,
        out: &mut String,
    ) -> std::fmt::Result {
        let session = ctx.session;
        let target = &session.targets[id];
        let Some(gt) = ctx.generator_target(id) else {
            return Ok(());
        };

        let dep_names: Vec<&str> = ctx
            .depends
            .direct(id)
            .into_iter()
            .filter(|&d| has_rules(ctx, d))
            .map(|d| session.target_name(d))
            .collect();

        match target.kind {
            TargetKind::Utility => {
                let mut prereqs = dep_names.clone();
                let outputs: Vec<String> = target.outputs.iter().map(|p| make_path(p)).collect();
                prereqs.extend(outputs.iter().map(String::as_str));
                writeln!(out, "{}: {}", target.name, prereqs.join(" "))?;

                let recipe = recipe(&target.commands);
                if let Some((first, rest)) = outputs.split_first() {
                    out.push('\n');
                    writeln!(out, "{}: {}", first, dep_names.join(" "))?;
                    out.push_str(&recipe);
                    for other in rest {
                        writeln!(out, "{}: {}", other, first)?;
                    }
                    hashes.add(&target.outputs, &recipe);
                } else {
                    out.push_str(&recipe);
                }
                out.push('\n');
            }
            TargetKind::Interface => {
                writeln!(out, "{}: {}\n", target.name, dep_names.join(" "))?;
            }
            _ => {
                let mut prereqs = dep_names.clone();
                let objects: Vec<String> = gt.objects.iter().map(|o| make_path(&o.object)).collect();
                let output = gt.output.as_deref().map(make_path);
                match &output {
                    Some(output) => prereqs.push(output),
                    None => prereqs.extend(objects.iter().map(String::as_str)),
                }
                writeln!(out, "{}: {}\n", target.name, prereqs.join(" "))?;

                if let (Some(output), Some(link)) = (&output, gt.link_command(ctx)) {
                    let mut inputs = objects.clone();
                    for dep in ctx.depends.direct(id) {
                        let linked = ctx
                            .generator_target(dep)
                            .filter(|d| !d.is_imported(session) && d.kind.is_linkable())
                            .and_then(|d| d.output.as_ref());
                        if let Some(path) = linked {
                            inputs.push(make_path(path));
                        }
                    }
                    let parent = gt
                        .output
                        .as_ref()
                        .and_then(|p| p.parent())
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| ".".into());
                    let text = format!("\t@mkdir -p {}\n{}", make_word(&parent), recipe(&[link]));
                    writeln!(out, "{}: {}", output, inputs.join(" "))?;
                    out.push_str(&text);
                    out.push('\n');
                    if let Some(path) = &gt.output {
                        hashes.add(std::slice::from_ref(path), &text);
                    }
                }

                for obj in &gt.objects {
                    let text = format!(
                        "\t@mkdir -p {}\n{}",
                        make_word(&gt.support_dir.display().to_string()),
                        recipe(&[gt.compile_command(ctx, obj)])
                    );
                    writeln!(out, "{}: {}", make_path(&obj.object), make_path(&obj.source))?;
                    out.push_str(&text);
                    out.push('\n');
                    hashes.add(std::slice::from_ref(&obj.object), &text);
                }
            }
        }
        Ok(())
    }

    fn pseudo_rule(
        &self,
        ctx: &EmitContext<'_>,
        name: &str,
        ordered: &[TargetId],
        out: &mut String,
    ) -> std::fmt::Result {
        let session = ctx.session;
        match name {
            "clean" => {
                let mut files: Vec<String> = Vec::new();
                for &id in ordered {
                    let target = &session.targets[id];
                    if let Some(gt) = ctx.generator_target(id) {
                        if target.kind.compiles_sources() {
                            files.extend(gt.products().iter().map(|p| make_word(&p.display().to_string())));
                        }
                    }
                    files.extend(target.outputs.iter().map(|p| make_word(&p.display().to_string())));
                }
                out.push_str("clean:\n");
                if !files.is_empty() {
                    writeln!(out, "\trm -f {}", files.join(" "))?;
                }
                out.push('\n');
            }
            "install" => {
                out.push_str("install: all\n");
                for context in session.dirs.iter() {
                    if !context.install_rules.is_empty() {
                        let file = context.binary_dir.join(INSTALL_FILE);
                        writeln!(out, "\t$(MAKE) -f {} install", make_word(&file.display().to_string()))?;
                    }
                }
                out.push('\n');
            }
            "test" => {
                writeln!(
                    out,
                    "test: all\n\t{} test -B {}\n",
                    make_word(&self.kiln.display().to_string()),
                    make_word(&session.paths.binary_dir().display().to_string())
                )?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Whether `id` gets rules of its own in a Makefile.
fn has_rules(ctx: &EmitContext<'_>, id: TargetId) -> bool {
    let target = &ctx.session.targets[id];
    !target.imported && target.name != ALL_TARGET
}

fn recipe(commands: &[Vec<String>]) -> String {
    let mut out = String::new();
    for cmd in commands {
        let words: Vec<String> = cmd.iter().map(|w| make_word(w)).collect();
        out.push('\t');
        out.push_str(&words.join(" "));
        out.push('\n');
    }
    out
}

/// Escape a path used as a rule target or prerequisite.
fn make_path(path: &Path) -> String {
    let mut out = String::new();
    for c in path.display().to_string().chars() {
        match c {
            ' ' | '#' | '\t' => {
                out.push('\\');
                out.push(c);
            }
            '$' => out.push_str("$$"),
            _ => out.push(c),
        }
    }
    out
}

/// Quote a word for a recipe line run by `/bin/sh`.
fn make_word(word: &str) -> String {
    let escaped = word.replace('$', "$$");
    if escaped.is_empty() || escaped.contains([' ', '\t', '"', '\'', ';', '&', '|', '(', ')', '<', '>']) {
        format!("'{}'", escaped.replace('\'', "'\\''"))
    } else {
        escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_word_quoting() {
        assert_eq!(make_word("plain"), "plain");
        assert_eq!(make_word("$HOME"), "$$HOME");
        assert_eq!(make_word("a b"), "'a b'");
        assert_eq!(make_word("it's"), "'it'\\''s'");
        assert_eq!(make_word(""), "''");
    }

    #[test]
    fn test_make_path_escaping() {
        assert_eq!(make_path(Path::new("/build/obj/a.o")), "/build/obj/a.o");
        assert_eq!(make_path(Path::new("/my src/a b.c")), "/my\\ src/a\\ b.c");
        assert_eq!(make_path(Path::new("/src/$v/#1.c")), "/src/$$v/\\#1.c");
    }

    #[test]
    fn test_recipe_lines() {
        let text = recipe(&[vec!["echo".into(), "hi there".into()], vec!["true".into()]]);
        assert_eq!(text, "\techo 'hi there'\n\ttrue\n");
    }

    #[test]
    fn test_msvc_hook_warns() {
        let mut diags = Diagnostics::new();
        let state = LanguageState {
            name: "C".into(),
            compiler: Some(PathBuf::from("C:/VC/bin/cl.exe")),
            ..Default::default()
        };
        Makefiles::new().enable_language_hook(&state, &mut diags);
        assert_eq!(diags.len(), 1);
        assert!(!diags.has_fatal());
    }
}
