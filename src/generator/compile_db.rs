//! `compile_commands.json` post-pass for editors and language servers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::generator::backend::{EmitContext, ExtraGenerator};
use crate::util::fs;

pub const COMPILE_DB_FILE: &str = "compile_commands.json";

#[derive(Debug, Serialize)]
struct Entry<'a> {
    directory: &'a Path,
    file: &'a Path,
    arguments: Vec<String>,
    output: &'a Path,
}

/// Writes a JSON compilation database at the top of the binary tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompileDb;

impl ExtraGenerator for CompileDb {
    fn name(&self) -> &'static str {
        "compile-db"
    }

    fn generate(&self, ctx: &EmitContext<'_>) -> Result<PathBuf> {
        let mut entries = Vec::new();
        for gt in ctx.targets.values() {
            let directory = &ctx.session.dirs.get(ctx.session.targets[gt.id].directory).binary_dir;
            for obj in &gt.objects {
                entries.push(Entry {
                    directory,
                    file: &obj.source,
                    arguments: gt.compile_command(ctx, obj),
                    output: &obj.object,
                });
            }
        }

        let path = ctx.session.paths.binary_dir().join(COMPILE_DB_FILE);
        let json = serde_json::to_string_pretty(&entries)
            .context("failed to serialize compilation database")?;
        fs::write_if_changed(&path, &json)?;
        tracing::debug!("wrote {} compile commands", entries.len());
        Ok(path)
    }
}
