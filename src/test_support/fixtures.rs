//! On-disk project fixtures.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::session::{Session, SessionOptions};
use crate::test_support::{c_and_cxx_probe, mock_enabler};
use crate::util::context::{BuildPaths, PROJECT_FILE};

/// A temporary source tree with a sibling binary directory.
///
/// ```text
/// <tmp>/src    source root
/// <tmp>/build  binary root
/// ```
pub struct ProjectTree {
    dir: TempDir,
}

impl ProjectTree {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("src")).expect("failed to create src");
        ProjectTree { dir }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    pub fn binary_dir(&self) -> PathBuf {
        self.dir.path().join("build")
    }

    pub fn paths(&self) -> BuildPaths {
        BuildPaths::new(self.source_dir(), self.binary_dir())
    }

    /// Write a file relative to the source root.
    pub fn file(&self, rel: impl AsRef<Path>, contents: &str) -> &Self {
        let path = self.source_dir().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent");
        }
        std::fs::write(&path, contents).expect("failed to write fixture file");
        self
    }

    /// Write the `Kiln.toml` of a directory (`""` for the root).
    pub fn manifest(&self, dir: &str, contents: &str) -> &Self {
        let rel = if dir.is_empty() {
            PathBuf::from(PROJECT_FILE)
        } else {
            Path::new(dir).join(PROJECT_FILE)
        };
        self.file(rel, contents)
    }

    /// A C project with a library in `lib/`, an app at the root that links
    /// it and a test.
    pub fn app_and_lib() -> Self {
        let tree = ProjectTree::new();
        tree.manifest(
            "",
            r#"[project]
name = "demo"
languages = ["C"]

[directory]
subdirs = ["lib"]

[[target]]
name = "app"
kind = "executable"
sources = ["main.c"]
depends = ["core"]

[[target]]
name = "extras"
kind = "executable"
sources = ["extras.c"]
exclude_from_all = true

[[test]]
name = "app-runs"
command = ["app"]
"#,
        )
        .file("main.c", "int core_init(void);\nint main(void) { return core_init(); }\n")
        .file("extras.c", "int main(void) { return 0; }\n")
        .manifest(
            "lib",
            r#"[[target]]
name = "core"
kind = "static-lib"
sources = ["core.c"]

[[alias]]
name = "demo::core"
target = "core"
"#,
        )
        .file("lib/core.c", "int core_init(void) { return 0; }\n");
        tree
    }
}

impl Default for ProjectTree {
    fn default() -> Self {
        ProjectTree::new()
    }
}

/// Session over `tree` whose probe finds C and C++ compilers.
pub fn test_session(tree: &ProjectTree) -> Session {
    let probe = c_and_cxx_probe();
    Session::new(tree.paths(), SessionOptions::default(), mock_enabler(&probe))
}
