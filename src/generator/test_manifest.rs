//! Per-directory test registration (`KilnTests.json`).
//!
//! Each directory's binary dir gets a manifest listing its tests and the
//! binary dirs of its subdirectories. `kiln test` starts at the top and
//! follows `subdirs`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::directory::DirectoryId;
use crate::core::target::TargetKind;
use crate::generator::backend::EmitContext;
use crate::util::context::TEST_MANIFEST;
use crate::util::fs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEntry {
    pub name: String,
    pub command: Vec<String>,
    pub working_dir: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestManifest {
    pub directory: PathBuf,
    #[serde(default)]
    pub tests: Vec<TestEntry>,
    #[serde(default)]
    pub subdirs: Vec<PathBuf>,
}

impl TestManifest {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let Some(contents) = fs::read_optional(path)? else {
            return Ok(None);
        };
        let manifest = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse test manifest: {}", path.display()))?;
        Ok(Some(manifest))
    }
}

/// Write the manifest of `dir`.
///
/// A command whose first word names an executable target runs that target's
/// artifact.
pub fn write(ctx: &EmitContext<'_>, dir: DirectoryId) -> Result<PathBuf> {
    let session = ctx.session;
    let context = session.dirs.get(dir);

    let tests = context
        .tests
        .iter()
        .map(|test| {
            let mut command = test.command.clone();
            if let Some(first) = command.first_mut() {
                let artifact = session
                    .find_target_to_use(dir, first)
                    .filter(|&id| session.targets[id].kind == TargetKind::Executable)
                    .and_then(|id| ctx.generator_target(id))
                    .and_then(|gt| gt.output.as_ref());
                if let Some(path) = artifact {
                    *first = path.display().to_string();
                }
            }
            let working_dir = match &test.working_dir {
                Some(wd) => context.binary_dir.join(wd),
                None => context.binary_dir.clone(),
            };
            TestEntry {
                name: test.name.clone(),
                command,
                working_dir,
            }
        })
        .collect();

    let manifest = TestManifest {
        directory: context.source_dir.clone(),
        tests,
        subdirs: context
            .children
            .iter()
            .map(|&c| session.dirs.get(c).binary_dir.clone())
            .collect(),
    };

    let path = context.binary_dir.join(TEST_MANIFEST);
    let json = serde_json::to_string_pretty(&manifest)
        .context("failed to serialize test manifest")?;
    fs::write_if_changed(&path, &json)?;
    Ok(path)
}

/// Every test reachable from the manifest in `binary_dir`, parents first.
pub fn collect(binary_dir: &Path) -> Result<Vec<TestEntry>> {
    let mut out = Vec::new();
    let mut stack = vec![binary_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Some(manifest) = TestManifest::load(&dir.join(TEST_MANIFEST))? else {
            continue;
        };
        out.extend(manifest.tests);
        stack.extend(manifest.subdirs.into_iter().rev());
    }
    Ok(out)
}
