//! Implementation of `kiln build`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};

use crate::core::errors::KilnError;
use crate::generator::backend::backend_for;
use crate::generator::summary::GeneratorRecord;
use crate::util::context::BuildPaths;
use crate::util::diagnostic::suggestions;
use crate::util::process::ProcessBuilder;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Generated binary directory
    pub binary_dir: PathBuf,

    /// Single target to build (default goal otherwise)
    pub target: Option<String>,

    /// Kill the build tool after this long
    pub timeout: Option<Duration>,
}

/// Read the record `kiln generate` left in `binary_dir`.
pub fn load_record(binary_dir: &Path) -> Result<GeneratorRecord> {
    let paths = BuildPaths::new(binary_dir, binary_dir);
    match GeneratorRecord::load(&paths.generator_record())? {
        Some(record) => Ok(record),
        None => bail!(
            "`{}` is not a kiln build tree\n{}",
            binary_dir.display(),
            suggestions::NOT_GENERATED
        ),
    }
}

/// The native build command for a generated tree.
pub fn build_command(opts: &BuildOptions) -> Result<ProcessBuilder> {
    let record = load_record(&opts.binary_dir)?;
    let Some(backend) = backend_for(&record.backend) else {
        bail!(
            "`{}` was generated by unknown backend `{}`\n{}",
            opts.binary_dir.display(),
            record.backend,
            suggestions::STALE_CACHE
        );
    };
    match backend.build_command(&opts.binary_dir, opts.target.as_deref()) {
        Some(cmd) => Ok(cmd.timeout(opts.timeout)),
        None => bail!(
            "the `{}` backend has no native build tool (or it was not found on PATH)",
            record.backend
        ),
    }
}

/// Run the backend's build tool, streaming its output to stderr.
pub fn build(opts: &BuildOptions) -> Result<ProcessBuilder> {
    let cmd = build_command(opts)?;
    let outcome = cmd.run_teed(&mut io::stderr());
    if !outcome.success() {
        return Err(KilnError::ToolInvocation {
            command: cmd.display_command(),
            status: outcome.status,
        }
        .into());
    }
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_requires_generated_tree() {
        let tmp = TempDir::new().unwrap();
        let opts = BuildOptions {
            binary_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let err = build_command(&opts).unwrap_err().to_string();
        assert!(err.contains("not a kiln build tree"));
    }

    #[test]
    fn test_manifest_backend_has_no_build_tool() {
        let tmp = TempDir::new().unwrap();
        let paths = BuildPaths::new(tmp.path(), tmp.path());
        GeneratorRecord::new("manifest", tmp.path(), None)
            .save(&paths.generator_record())
            .unwrap();
        let opts = BuildOptions {
            binary_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let err = build_command(&opts).unwrap_err().to_string();
        assert!(err.contains("no native build tool"));
    }
}
