//! Command implementations

pub mod build;
pub mod cache;
pub mod completions;
pub mod generate;
pub mod targets;
pub mod test;

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::cli::TreeArgs;
use kiln::util::context::PROJECT_FILE;
use kiln::util::diagnostic::suggestions;
use kiln::util::GlobalContext;

/// Absolute source and binary directories for `-S`/`-B`.
pub fn resolve_tree(ctx: &GlobalContext, tree: &TreeArgs) -> Result<(PathBuf, PathBuf)> {
    let source_dir = match &tree.source_dir {
        Some(dir) => {
            let dir = ctx.resolve(dir);
            if !dir.join(PROJECT_FILE).is_file() {
                bail!(
                    "no `{}` in `{}`\n{}",
                    PROJECT_FILE,
                    dir.display(),
                    suggestions::NO_PROJECT
                );
            }
            dir
        }
        None => ctx.find_source_root(None)?,
    };
    Ok((source_dir, ctx.resolve(&tree.binary_dir)))
}
