//! Test utilities and mocks for kiln unit tests.
//!
//! [`MockProbe`] stands in for real compilers so language enablement can be
//! tested without a toolchain on PATH. Fixture builders for on-disk project
//! trees live in [`fixtures`].
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln::test_support::{MockProbe, ProjectTree};
//!
//! #[test]
//! fn test_example() {
//!     let probe = MockProbe::new().with_compiler("C", "/usr/bin/cc");
//!     let tree = ProjectTree::new();
//!     tree.manifest("", "[project]\nname = \"demo\"\nlanguages = [\"C\"]\n");
//!     // Drive the generator with `probe`...
//! }
//! ```

pub mod fixtures;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::toolchain::enabler::LanguageEnabler;
use crate::toolchain::languages::LanguageSpec;
use crate::toolchain::probe::CompilerProbe;
use crate::util::config::ToolchainConfig;
use crate::util::process::{ProcessOutcome, ProcessStatus};

pub use fixtures::*;

#[derive(Debug, Default)]
struct ProbeState {
    compilers: HashMap<String, PathBuf>,
    failing: HashSet<String>,
    calls: Vec<String>,
    hints: Vec<Option<PathBuf>>,
}

/// Scripted compiler probe.
///
/// Clones share state, so a test can keep one handle while the enabler owns
/// another and inspect the recorded calls afterwards.
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl MockProbe {
    /// Create a probe that finds no compilers.
    pub fn new() -> Self {
        MockProbe::default()
    }

    /// Make `locate` return `path` for `lang`.
    pub fn with_compiler(self, lang: &str, path: impl Into<PathBuf>) -> Self {
        self.lock().compilers.insert(lang.to_string(), path.into());
        self
    }

    /// Make every try-compile for `lang` fail.
    pub fn with_failing_compile(self, lang: &str) -> Self {
        self.lock().failing.insert(lang.to_string());
        self
    }

    /// Let try-compiles for `lang` succeed again.
    pub fn set_compile_ok(&self, lang: &str) {
        self.lock().failing.remove(lang);
    }

    /// Calls made so far, as `"locate C"` / `"try_compile C"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Hints passed to `locate`, in call order.
    pub fn hints(&self) -> Vec<Option<PathBuf>> {
        self.lock().hints.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CompilerProbe for MockProbe {
    fn locate(&self, spec: &LanguageSpec, hint: Option<&Path>) -> Option<PathBuf> {
        let mut state = self.lock();
        state.calls.push(format!("locate {}", spec.name));
        state.hints.push(hint.map(Path::to_path_buf));
        state.compilers.get(spec.name).cloned()
    }

    fn try_compile(
        &self,
        spec: &LanguageSpec,
        _compiler: &Path,
        _scratch: &Path,
        _timeout: Duration,
    ) -> ProcessOutcome {
        let mut state = self.lock();
        state.calls.push(format!("try_compile {}", spec.name));
        if state.failing.contains(spec.name) {
            ProcessOutcome {
                status: ProcessStatus::Exited(1),
                output: format!("error: {} compiler is broken\n", spec.name),
            }
        } else {
            ProcessOutcome {
                status: ProcessStatus::Exited(0),
                output: String::new(),
            }
        }
    }
}

/// Enabler driven by `probe` with an empty environment.
pub fn mock_enabler(probe: &MockProbe) -> LanguageEnabler {
    LanguageEnabler::new(
        Box::new(probe.clone()),
        ToolchainConfig::default(),
        Duration::from_secs(5),
    )
    .with_env(|_| None)
}

/// Probe that finds C and C++ compilers.
pub fn c_and_cxx_probe() -> MockProbe {
    MockProbe::new()
        .with_compiler("C", "/usr/bin/cc")
        .with_compiler("CXX", "/usr/bin/c++")
}
