//! "Build everything" closures.
//!
//! The default build of a directory is the union of the dependency closures
//! of every target it and its non-excluded subdirectories own. Excluded and
//! interface targets are never seeds; they only enter through an included
//! dependent.

use std::collections::BTreeSet;

use crate::core::directory::{DirectoryId, DirectoryTree};
use crate::core::session::ALL_TARGET;
use crate::core::target::{Target, TargetArena, TargetId, TargetKind};
use crate::graph::depends::TargetDepends;

/// Insert `target` and, on first insertion only, everything it depends on.
pub fn expand(target: TargetId, depends: &TargetDepends, acc: &mut BTreeSet<TargetId>) {
    if acc.insert(target) {
        for dep in depends.direct(target) {
            expand(dep, depends, acc);
        }
    }
}

/// Whether `candidate` is left out of `root`'s default build.
///
/// Walks from `candidate` toward the top. Meeting `root` ends the walk: no
/// directory excludes itself. Any directory seen before that with
/// `exclude_from_all` excludes the candidate.
pub fn is_excluded(dirs: &DirectoryTree, root: DirectoryId, candidate: DirectoryId) -> bool {
    for ctx in dirs.ancestors(candidate) {
        if ctx.id == root {
            return false;
        }
        if ctx.exclude_from_all {
            return true;
        }
    }
    false
}

pub fn is_excluded_target(target: &Target) -> bool {
    target.exclude_from_all || target.kind == TargetKind::Interface
}

/// Pseudo-targets that only the owning directory builds.
fn is_root_only(target: &Target) -> bool {
    target.kind == TargetKind::Global || target.name == ALL_TARGET
}

/// Union of the closures of every target seeded from `contexts`, as seen
/// from `root`.
pub fn target_set(
    root: DirectoryId,
    contexts: &[DirectoryId],
    dirs: &DirectoryTree,
    targets: &TargetArena,
    depends: &TargetDepends,
) -> BTreeSet<TargetId> {
    let mut set = BTreeSet::new();
    for &ctx in contexts {
        if is_excluded(dirs, root, ctx) {
            continue;
        }
        for &id in &dirs.get(ctx).targets {
            let target = &targets[id];
            if is_root_only(target) && target.directory != root {
                continue;
            }
            if is_excluded_target(target) {
                continue;
            }
            expand(id, depends, &mut set);
        }
    }
    set
}
