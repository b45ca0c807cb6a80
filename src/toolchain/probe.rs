//! Compiler discovery and validation.
//!
//! [`CompilerProbe`] is the seam between the enabler and the outside world.
//! [`SystemProbe`] searches PATH with `which` and runs real try-compiles;
//! tests substitute a scripted probe.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::toolchain::languages::LanguageSpec;
use crate::util::process::{ProcessBuilder, ProcessOutcome, ProcessStatus};

/// Locates and validates compilers.
pub trait CompilerProbe {
    /// Find the compiler for `spec`.
    ///
    /// A `hint` (from config or environment) is used on its own: an absolute
    /// path must exist, a bare name must resolve on PATH. Without a hint the
    /// built-in candidates are searched in order.
    fn locate(&self, spec: &LanguageSpec, hint: Option<&Path>) -> Option<PathBuf>;

    /// Build and run a minimal program with `compiler` inside `scratch`.
    fn try_compile(
        &self,
        spec: &LanguageSpec,
        compiler: &Path,
        scratch: &Path,
        timeout: Duration,
    ) -> ProcessOutcome;
}

/// Probe backed by the real filesystem and processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl SystemProbe {
    fn resolve(name: &Path) -> Option<PathBuf> {
        if name.is_absolute() {
            return name.is_file().then(|| name.to_path_buf());
        }
        which::which(name).ok()
    }
}

impl CompilerProbe for SystemProbe {
    fn locate(&self, spec: &LanguageSpec, hint: Option<&Path>) -> Option<PathBuf> {
        if let Some(hint) = hint {
            return Self::resolve(hint);
        }
        spec.candidates
            .iter()
            .find_map(|c| Self::resolve(Path::new(c)))
    }

    fn try_compile(
        &self,
        spec: &LanguageSpec,
        compiler: &Path,
        scratch: &Path,
        timeout: Duration,
    ) -> ProcessOutcome {
        let Some((file_name, contents)) = spec.test_source else {
            return ProcessOutcome {
                status: ProcessStatus::Exited(0),
                output: String::new(),
            };
        };

        if let Err(e) = std::fs::create_dir_all(scratch) {
            return error_outcome(format!("failed to create {}: {}", scratch.display(), e));
        }
        let dir = match tempfile::Builder::new().prefix("try-").tempdir_in(scratch) {
            Ok(dir) => dir,
            Err(e) => return error_outcome(format!("failed to create scratch directory: {}", e)),
        };

        let source = dir.path().join(file_name);
        if let Err(e) = std::fs::write(&source, contents) {
            return error_outcome(format!("failed to write {}: {}", source.display(), e));
        }
        let exe = dir.path().join(if cfg!(windows) { "try.exe" } else { "try" });

        let compile = ProcessBuilder::new(compiler)
            .arg(&source)
            .arg("-o")
            .arg(&exe)
            .cwd(dir.path())
            .timeout(Some(timeout))
            .run();
        if !compile.success() {
            return compile;
        }

        let run = ProcessBuilder::new(&exe)
            .cwd(dir.path())
            .timeout(Some(timeout))
            .run();
        ProcessOutcome {
            status: run.status,
            output: compile.output + &run.output,
        }
    }
}

fn error_outcome(message: String) -> ProcessOutcome {
    ProcessOutcome {
        status: ProcessStatus::Error(message),
        output: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::languages;

    #[test]
    fn test_absolute_hint_must_exist() {
        let spec = languages::lookup("C").unwrap();
        assert!(SystemProbe
            .locate(spec, Some(Path::new("/definitely/missing/cc")))
            .is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_bare_hint_resolves_on_path() {
        let spec = languages::lookup("C").unwrap();
        let found = SystemProbe.locate(spec, Some(Path::new("sh"))).unwrap();
        assert!(found.is_absolute());
    }

    #[test]
    fn test_no_test_source_is_trusted() {
        let spec = languages::lookup("ASM").unwrap();
        let tmp = tempfile::TempDir::new().unwrap();
        let outcome =
            SystemProbe.try_compile(spec, Path::new("as"), tmp.path(), Duration::from_secs(1));
        assert!(outcome.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_compiler_reports_exit() {
        let spec = languages::lookup("C").unwrap();
        let tmp = tempfile::TempDir::new().unwrap();
        let outcome =
            SystemProbe.try_compile(spec, Path::new("false"), tmp.path(), Duration::from_secs(5));
        assert_eq!(outcome.status, ProcessStatus::Exited(1));
    }
}
