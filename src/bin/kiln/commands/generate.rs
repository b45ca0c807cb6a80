//! `kiln generate` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::GenerateArgs;
use crate::commands::resolve_tree;
use kiln::core::errors::KilnError;
use kiln::ops::kiln_generate::{generate, GenerateOptions};
use kiln::util::diagnostic::emit_all;
use kiln::util::shell::{Shell, Status};
use kiln::util::GlobalContext;

pub fn execute(args: GenerateArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let (source_dir, binary_dir) = resolve_tree(&ctx, &args.tree)?;

    let opts = GenerateOptions {
        source_dir,
        binary_dir,
        backend: args.backend,
        skip_install_rules: args.no_install_rules,
        ide_metadata: args.ide_metadata,
    };

    let result = generate(&ctx, shell, &opts)?;
    emit_all(&result.diagnostics, shell.use_color());

    let fatal = result.diagnostics.fatal_count();
    if fatal > 0 {
        shell.status(Status::Failed, "configuration incomplete, errors occurred");
        return Err(KilnError::Aborted { count: fatal }.into());
    }

    shell.status(
        Status::Generated,
        format!(
            "{} targets in {} directories ({})",
            result.targets, result.directories, result.backend
        ),
    );
    shell.status(Status::Finished, format!("build files written to {}", opts.binary_dir.display()));
    Ok(())
}
