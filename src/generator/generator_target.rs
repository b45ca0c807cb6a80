//! Generate-time view of a target.
//!
//! A [`GeneratorTarget`] wraps a configured [`Target`](crate::core::Target)
//! with everything backends need: its support directory, the object file of
//! each source, the artifact path and the linker language.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::session::Session;
use crate::core::target::{TargetId, TargetKind};
use crate::generator::backend::EmitContext;
use crate::toolchain::enabler::LanguageEnabler;
use crate::util::context::KILN_DIR;
use crate::util::diagnostic::{Diagnostic, Diagnostics};
use crate::util::fs;

/// One compiled source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFile {
    pub source: PathBuf,
    pub object: PathBuf,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct GeneratorTarget {
    pub id: TargetId,
    pub name: String,
    pub kind: TargetKind,
    /// `<dir binary>/.kiln/<name>.dir`
    pub support_dir: PathBuf,
    /// Built artifact, or the location of an imported target
    pub output: Option<PathBuf>,
    pub linker_language: Option<String>,
    pub objects: Vec<ObjectFile>,
}

impl GeneratorTarget {
    pub fn new(session: &Session, id: TargetId) -> Self {
        let target = &session.targets[id];
        let binary_dir = &session.dirs.get(target.directory).binary_dir;
        let support_dir = binary_dir.join(KILN_DIR).join(format!("{}.dir", target.name));
        let output = if target.imported {
            target.location.clone()
        } else {
            target.output_filename().map(|file| binary_dir.join(file))
        };

        GeneratorTarget {
            id,
            name: target.name.clone(),
            kind: target.kind,
            support_dir,
            output,
            linker_language: None,
            objects: Vec::new(),
        }
    }

    /// Assign each source to an enabled language.
    ///
    /// Sources with an ignored extension (headers, objects) are skipped
    /// quietly; sources no enabled language claims get a warning.
    pub fn classify_sources(&mut self, session: &Session, diags: &mut Diagnostics) {
        let target = &session.targets[self.id];
        if target.imported || !target.kind.compiles_sources() {
            return;
        }

        let enabler = &session.enabler;
        for source in &target.sources {
            let ext = fs::extension(source).unwrap_or("");
            if let Some(lang) = enabler.language_for_extension(ext) {
                let state = enabler.state(lang);
                let suffix = state.map(|s| s.output_extension.as_str()).unwrap_or(".o");
                let file = source
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.objects.push(ObjectFile {
                    source: source.clone(),
                    object: self.support_dir.join(format!("{}{}", file, suffix)),
                    language: lang.to_string(),
                });
            } else if !enabler.ignore_file(ext) {
                diags.push(
                    Diagnostic::warning(format!(
                        "source `{}` of target `{}` has no enabled language",
                        source.display(),
                        self.name
                    ))
                    .deferred(),
                );
            }
        }
    }

    /// Pick the source language with the highest linker preference.
    ///
    /// Two different languages sharing the highest preference cannot be
    /// ordered and are reported.
    pub fn compute_linker_language(&mut self, enabler: &LanguageEnabler, diags: &mut Diagnostics) {
        let mut best: Option<(&str, u32)> = None;
        let mut tied: Vec<&str> = Vec::new();
        let mut seen = HashSet::new();

        for obj in &self.objects {
            if !seen.insert(obj.language.as_str()) {
                continue;
            }
            let pref = enabler
                .state(&obj.language)
                .map(|s| s.linker_preference)
                .unwrap_or(0);
            match best {
                Some((_, p)) if pref < p => {}
                Some((_, p)) if pref == p => tied.push(obj.language.as_str()),
                _ => {
                    best = Some((obj.language.as_str(), pref));
                    tied.clear();
                }
            }
        }

        let Some((lang, _)) = best else {
            if matches!(
                self.kind,
                TargetKind::Executable | TargetKind::SharedLib | TargetKind::Module
            ) && !self.objects.is_empty()
            {
                diags.push(
                    Diagnostic::error(format!(
                        "cannot determine the linker language of target `{}`",
                        self.name
                    ))
                    .deferred(),
                );
            }
            return;
        };

        if !tied.is_empty() {
            let mut langs: Vec<&str> = std::iter::once(lang).chain(tied).collect();
            langs.sort();
            diags.push(
                Diagnostic::error(format!(
                    "target `{}` contains multiple languages with the highest linker preference",
                    self.name
                ))
                .with_context(langs.join(", "))
                .with_suggestion("Raise the `linker_preference` of one language in toolchain.toml")
                .deferred(),
            );
        }
        self.linker_language = Some(lang.to_string());
    }

    /// Compiler invocation for one object.
    pub fn compile_command(&self, ctx: &EmitContext<'_>, obj: &ObjectFile) -> Vec<String> {
        let state = ctx.session.enabler.state(&obj.language);
        let compiler = state
            .and_then(|s| s.compiler.as_deref())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| obj.language.to_lowercase());

        let mut cmd = vec![compiler];
        if matches!(self.kind, TargetKind::SharedLib | TargetKind::Module) {
            if let Some(state) = state {
                cmd.extend(state.shared_library_flags.iter().cloned());
            }
        }
        for dir in ctx.include_dirs(self.id) {
            cmd.push(format!("-I{}", dir.display()));
        }
        cmd.push("-c".into());
        cmd.push(obj.source.display().to_string());
        cmd.push("-o".into());
        cmd.push(obj.object.display().to_string());
        cmd
    }

    /// Archiver or linker invocation producing the artifact.
    pub fn link_command(&self, ctx: &EmitContext<'_>) -> Option<Vec<String>> {
        let output = self.output.as_ref()?.display().to_string();
        let objects = self.objects.iter().map(|o| o.object.display().to_string());

        match self.kind {
            TargetKind::StaticLib => {
                let mut cmd = vec!["ar".to_string(), "rcs".into(), output];
                cmd.extend(objects);
                Some(cmd)
            }
            TargetKind::Executable | TargetKind::SharedLib | TargetKind::Module => {
                let linker = self
                    .linker_language
                    .as_deref()
                    .and_then(|lang| ctx.session.enabler.state(lang))
                    .and_then(|s| s.compiler.as_deref())
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "cc".to_string());

                let mut cmd = vec![linker];
                if self.kind != TargetKind::Executable {
                    cmd.push("-shared".into());
                }
                cmd.push("-o".into());
                cmd.push(output);
                cmd.extend(objects);
                cmd.extend(ctx.link_libraries(self.id));
                Some(cmd)
            }
            _ => None,
        }
    }

    /// Files this target's rules produce, objects included.
    pub fn products(&self) -> Vec<&Path> {
        let mut out: Vec<&Path> = self.objects.iter().map(|o| o.object.as_path()).collect();
        if let Some(output) = &self.output {
            out.push(output);
        }
        out
    }

    pub fn is_imported(&self, session: &Session) -> bool {
        session.targets[self.id].imported
    }
}

/// How a plain link item goes on a link line.
pub fn link_item_arg(item: &str) -> String {
    let is_path = item.contains('/') || item.contains('\\');
    let is_library_file = [".a", ".so", ".dylib", ".lib", ".dll"]
        .iter()
        .any(|ext| item.ends_with(ext));
    if item.starts_with('-') || is_path || is_library_file {
        item.to_string()
    } else {
        format!("-l{}", item)
    }
}
