//! `kiln cache` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::{CacheArgs, CacheCommands};
use kiln::ops::kiln_cache::clear;
use kiln::util::shell::{Shell, Status};
use kiln::util::GlobalContext;

pub fn execute(args: CacheArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    match args.command {
        CacheCommands::Clear { binary_dir } => {
            let binary_dir = ctx.resolve(&binary_dir);
            let removed = clear(&binary_dir)?;
            if removed.is_empty() {
                shell.note(format!("nothing to clear in {}", binary_dir.display()));
            }
            for path in removed {
                shell.status(Status::Removed, path.display());
            }
        }
    }
    Ok(())
}
