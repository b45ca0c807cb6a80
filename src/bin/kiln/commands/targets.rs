//! `kiln targets` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::TargetsArgs;
use crate::commands::resolve_tree;
use kiln::core::errors::KilnError;
use kiln::ops::kiln_generate::GenerateOptions;
use kiln::ops::kiln_targets::list_targets;
use kiln::util::diagnostic::emit_all;
use kiln::util::shell::Shell;
use kiln::util::GlobalContext;

pub fn execute(args: TargetsArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let (source_dir, binary_dir) = resolve_tree(&ctx, &args.tree)?;
    let opts = GenerateOptions {
        source_dir,
        binary_dir,
        ..Default::default()
    };

    let (rows, diags) = list_targets(&ctx, &opts)?;
    emit_all(&diags, shell.use_color());
    if diags.has_fatal() {
        return Err(KilnError::Aborted {
            count: diags.fatal_count(),
        }
        .into());
    }

    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for row in &rows {
        let dir = row.directory.display().to_string();
        let mut flags = Vec::new();
        if row.in_default_build {
            flags.push("all");
        }
        if row.imported {
            flags.push("imported");
        }
        println!(
            "{:<width$}  {:<14}  {:<12}  {}",
            row.name,
            row.kind,
            if dir.is_empty() { "." } else { dir.as_str() },
            flags.join(","),
            width = width
        );
    }
    Ok(())
}
