//! Implementation of `kiln targets`.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::directory::DirectoryId;
use crate::core::target::TargetKind;
use crate::graph::closure::target_set;
use crate::ops::kiln_generate::{effective_config, generator, system_session, GenerateOptions};
use crate::util::context::{BuildPaths, GlobalContext};
use crate::util::diagnostic::Diagnostics;
use crate::util::fs;

/// One row of the target listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetListing {
    pub name: String,
    pub kind: &'static str,
    /// Source directory relative to the top-level source dir
    pub directory: PathBuf,
    pub imported: bool,
    pub in_default_build: bool,
}

/// Configure and compute without writing build files, then list every
/// declared target in directory order, imported ones included.
pub fn list_targets(ctx: &GlobalContext, opts: &GenerateOptions) -> Result<(Vec<TargetListing>, Diagnostics)> {
    let config = effective_config(ctx, opts);
    let paths = BuildPaths::new(&opts.source_dir, &opts.binary_dir);
    let mut gen = generator(system_session(ctx, paths, &config), &config)?;

    let mut diags = gen.configure()?;
    if diags.has_fatal() {
        return Ok((Vec::new(), diags));
    }
    diags.merge(gen.compute()?);
    if diags.has_fatal() {
        return Ok((Vec::new(), diags));
    }

    let session = gen.session();
    let Some(depends) = session.depends.as_ref() else {
        return Ok((Vec::new(), diags));
    };
    let contexts = session.dirs.preorder(DirectoryId::ROOT);
    let default_build = target_set(DirectoryId::ROOT, &contexts, &session.dirs, &session.targets, depends);

    let mut rows = Vec::new();
    for &dir in &contexts {
        let context = session.dirs.get(dir);
        let directory = fs::relative_path(session.paths.source_dir(), &context.source_dir);
        for (id, target) in session.targets.iter().filter(|(_, t)| t.directory == dir) {
            if target.kind == TargetKind::Global {
                continue;
            }
            rows.push(TargetListing {
                name: target.name.clone(),
                kind: target.kind.as_str(),
                directory: directory.clone(),
                imported: target.imported,
                in_default_build: default_build.contains(&id),
            });
        }
    }
    Ok((rows, diags))
}
