//! JSON manifest backend.
//!
//! Writes `kiln-build.json` per directory describing every target the
//! directory owns: objects with their compile commands, the link command and
//! custom commands. Meant for external drivers, so it has no build tool of its
//! own.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::directory::{DirectoryId, InstallRule};
use crate::generator::backend::{Backend, EmitContext};
use crate::generator::rule_hash::RuleHashStore;
use crate::util::fs;
use crate::util::process::ProcessBuilder;

const BUILD_FILE: &str = "kiln-build.json";
const INSTALL_FILE: &str = "kiln-install.json";

#[derive(Debug, Serialize)]
struct DirectoryManifest<'a> {
    directory: &'a Path,
    default_build: Vec<&'a str>,
    targets: Vec<TargetEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct TargetEntry<'a> {
    name: &'a str,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    linker_language: Option<&'a str>,
    depends: Vec<&'a str>,
    objects: Vec<ObjectEntry<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<Vec<String>>,
    #[serde(skip_serializing_if = "no_commands")]
    commands: &'a [Vec<String>],
}

fn no_commands(commands: &&[Vec<String>]) -> bool {
    commands.is_empty()
}

#[derive(Debug, Serialize)]
struct ObjectEntry<'a> {
    source: &'a Path,
    object: &'a Path,
    command: Vec<String>,
}

#[derive(Debug, Serialize)]
struct InstallManifest<'a> {
    directory: &'a Path,
    rules: &'a [InstallRule],
    artifacts: Vec<(&'a str, &'a Path)>,
}

/// Backend writing JSON build descriptions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestBackend;

impl Backend for ManifestBackend {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn supports_duplicate_custom_targets(&self) -> bool {
        true
    }

    fn emit_build_files(
        &self,
        ctx: &EmitContext<'_>,
        dir: DirectoryId,
        hashes: &mut RuleHashStore,
    ) -> Result<Vec<PathBuf>> {
        let session = ctx.session;
        let context = session.dirs.get(dir);

        let mut targets = Vec::new();
        for &id in &context.targets {
            let target = &session.targets[id];
            let Some(gt) = ctx.generator_target(id) else {
                continue;
            };
            let objects = gt
                .objects
                .iter()
                .map(|obj| ObjectEntry {
                    source: &obj.source,
                    object: &obj.object,
                    command: gt.compile_command(ctx, obj),
                })
                .collect();
            let link = gt.link_command(ctx);
            if let (Some(output), Some(link)) = (&gt.output, &link) {
                hashes.add(std::slice::from_ref(output), &link.join(" "));
            }
            if !target.commands.is_empty() {
                let text: Vec<String> = target.commands.iter().map(|c| c.join(" ")).collect();
                hashes.add(&target.outputs, &text.join("\n"));
            }

            targets.push(TargetEntry {
                name: &target.name,
                kind: target.kind.as_str(),
                output: gt.output.as_deref(),
                linker_language: gt.linker_language.as_deref(),
                depends: ctx
                    .depends
                    .direct(id)
                    .into_iter()
                    .map(|d| session.target_name(d))
                    .collect(),
                objects,
                link,
                commands: &target.commands,
            });
        }

        let manifest = DirectoryManifest {
            directory: &context.source_dir,
            default_build: ctx
                .default_build(dir)
                .into_iter()
                .map(|id| session.target_name(id))
                .collect(),
            targets,
        };

        let path = context.binary_dir.join(BUILD_FILE);
        let json = serde_json::to_string_pretty(&manifest).context("failed to serialize build manifest")?;
        fs::write_if_changed(&path, &json)?;
        Ok(vec![path])
    }

    fn emit_install_rules(&self, ctx: &EmitContext<'_>, dir: DirectoryId) -> Result<Option<PathBuf>> {
        let session = ctx.session;
        let context = session.dirs.get(dir);
        if context.install_rules.is_empty() {
            return Ok(None);
        }

        let mut artifacts = Vec::new();
        for rule in &context.install_rules {
            for name in &rule.targets {
                let output = session
                    .find_target_to_use(dir, name)
                    .and_then(|id| ctx.generator_target(id))
                    .and_then(|gt| gt.output.as_deref());
                if let Some(output) = output {
                    artifacts.push((name.as_str(), output));
                }
            }
        }

        let manifest = InstallManifest {
            directory: &context.source_dir,
            rules: &context.install_rules,
            artifacts,
        };
        let path = context.binary_dir.join(INSTALL_FILE);
        let json = serde_json::to_string_pretty(&manifest).context("failed to serialize install manifest")?;
        fs::write_if_changed(&path, &json)?;
        Ok(Some(path))
    }

    fn build_command(&self, _binary_dir: &Path, _target: Option<&str>) -> Option<ProcessBuilder> {
        None
    }
}
