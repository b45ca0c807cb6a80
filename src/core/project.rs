//! Project description (`Kiln.toml`) parsing.
//!
//! Every source directory that takes part in the build carries a `Kiln.toml`.
//! The top-level one usually declares `[project]`; subdirectories are pulled
//! in through `[directory] subdirs` and inherit the project name and
//! variables of their parent.
//!
//! ```toml
//! [project]
//! name = "demo"
//! languages = ["C"]
//!
//! [directory]
//! subdirs = ["lib"]
//!
//! [variables]
//! ZLIB_LIBRARY = "/usr/lib/libz.so"
//!
//! [[target]]
//! name = "app"
//! kind = "executable"
//! sources = ["main.c"]
//! depends = ["core"]
//! link = ["${ZLIB_LIBRARY}"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use miette::{NamedSource, SourceSpan};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::core::directory::InstallRule;
use crate::core::target::TargetKind;

/// Suffix marking a variable whose lookup failed.
pub const NOTFOUND_SUFFIX: &str = "-NOTFOUND";

/// Languages enabled when `[project]` does not list any.
pub const DEFAULT_LANGUAGES: &[&str] = &["C", "CXX"];

static VAR_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("variable reference pattern is valid")
});

/// Parsed contents of one `Kiln.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectDescription {
    pub project: Option<ProjectSection>,
    pub directory: DirectorySection,
    pub variables: BTreeMap<String, String>,
    #[serde(rename = "target")]
    pub targets: Vec<TargetDecl>,
    #[serde(rename = "alias")]
    pub aliases: Vec<AliasDecl>,
    #[serde(rename = "imported")]
    pub imported: Vec<ImportedDecl>,
    #[serde(rename = "test")]
    pub tests: Vec<TestSection>,
    #[serde(rename = "install")]
    pub install: Vec<InstallRule>,
}

/// `[project]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    pub name: String,
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub optional_languages: Vec<String>,
}

impl ProjectSection {
    /// Required languages, defaulting to C and CXX.
    pub fn languages(&self) -> Vec<String> {
        match &self.languages {
            Some(langs) => langs.clone(),
            None => DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// `[directory]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectorySection {
    pub subdirs: Vec<String>,
    pub exclude_from_all: bool,
    pub skip_install_rules: bool,
}

/// `[[target]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDecl {
    pub name: String,
    pub kind: TargetKind,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub link: Vec<String>,
    #[serde(default)]
    pub include_dirs: Vec<String>,
    #[serde(default)]
    pub exclude_from_all: bool,
    #[serde(default)]
    pub export: bool,
    #[serde(default)]
    pub commands: Vec<Vec<String>>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// `[[alias]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasDecl {
    pub name: String,
    pub target: String,
}

/// `[[imported]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportedDecl {
    pub name: String,
    #[serde(default = "default_imported_kind")]
    pub kind: TargetKind,
    #[serde(default)]
    pub global: bool,
    pub location: Option<String>,
}

fn default_imported_kind() -> TargetKind {
    TargetKind::SharedLib
}

/// `[[test]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSection {
    pub name: String,
    pub command: Vec<String>,
    pub working_dir: Option<String>,
}

/// A `Kiln.toml` that could not be parsed.
#[derive(Debug, Error, miette::Diagnostic)]
#[error("failed to parse `{}`: {message}", .path.display())]
#[diagnostic(code(kiln::project::parse))]
pub struct ProjectParseError {
    pub path: PathBuf,
    pub message: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("here")]
    pub span: Option<SourceSpan>,
}

impl ProjectDescription {
    /// Parse a project description from a string.
    pub fn parse(path: &Path, contents: &str) -> Result<Self, ProjectParseError> {
        toml::from_str(contents).map_err(|e| ProjectParseError {
            path: path.to_path_buf(),
            message: e.message().to_string(),
            src: NamedSource::new(path.display().to_string(), contents.to_string()),
            span: e.span().map(SourceSpan::from),
        })
    }

    /// Load a project description from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        Ok(Self::parse(path, &contents)?)
    }
}

/// Expand `${VAR}` references. Unknown variables expand to nothing.
pub fn expand_vars(input: &str, vars: &BTreeMap<String, String>) -> String {
    VAR_REF
        .replace_all(input, |caps: &regex::Captures<'_>| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Names of variables referenced by `input`.
pub fn referenced_vars(input: &str) -> Vec<&str> {
    VAR_REF
        .captures_iter(input)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// If `value` is a not-found marker, the variable it stands for.
pub fn notfound_variable(value: &str) -> Option<&str> {
    value.strip_suffix(NOTFOUND_SUFFIX).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[project]
name = "demo"
languages = ["C"]
optional_languages = ["Fortran"]

[directory]
subdirs = ["lib", "tools"]

[variables]
ZLIB = "/usr/lib/libz.so"

[[target]]
name = "app"
kind = "executable"
sources = ["main.c"]
depends = ["core"]
link = ["${ZLIB}", "m"]

[[target]]
name = "gen"
kind = "utility"
commands = [["python3", "gen.py"]]
outputs = ["gen.c"]

[[alias]]
name = "demo::app"
target = "app"

[[imported]]
name = "ssl"
global = true
location = "/usr/lib/libssl.so"

[[test]]
name = "smoke"
command = ["app", "--version"]

[[install]]
targets = ["app"]
destination = "bin"
"#;

    #[test]
    fn test_parse_full_description() {
        let desc = ProjectDescription::parse(Path::new("Kiln.toml"), SAMPLE).unwrap();
        let project = desc.project.as_ref().unwrap();
        assert_eq!(project.name, "demo");
        assert_eq!(project.languages(), vec!["C".to_string()]);
        assert_eq!(project.optional_languages, vec!["Fortran".to_string()]);
        assert_eq!(desc.directory.subdirs, vec!["lib", "tools"]);
        assert_eq!(desc.targets.len(), 2);
        assert_eq!(desc.targets[1].kind, TargetKind::Utility);
        assert_eq!(desc.aliases[0].target, "app");
        assert_eq!(desc.imported[0].kind, TargetKind::SharedLib);
        assert!(desc.imported[0].global);
        assert_eq!(desc.tests[0].command, vec!["app", "--version"]);
        assert_eq!(desc.install[0].destination, "bin");
    }

    #[test]
    fn test_default_languages() {
        let desc =
            ProjectDescription::parse(Path::new("Kiln.toml"), "[project]\nname = \"x\"\n").unwrap();
        assert_eq!(desc.project.unwrap().languages(), vec!["C", "CXX"]);
    }

    #[test]
    fn test_parse_error_has_span() {
        let err = ProjectDescription::parse(
            Path::new("Kiln.toml"),
            "[[target]]\nname = \"app\"\nkind = \"spaceship\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Kiln.toml"));
        assert!(err.span.is_some());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(ProjectDescription::parse(Path::new("Kiln.toml"), "[directory]\nsubdir = []\n").is_err());
    }

    #[test]
    fn test_expand_vars() {
        let mut vars = BTreeMap::new();
        vars.insert("ROOT".to_string(), "/opt".to_string());
        assert_eq!(expand_vars("${ROOT}/include", &vars), "/opt/include");
        assert_eq!(expand_vars("${MISSING}x", &vars), "x");
        assert_eq!(expand_vars("plain", &vars), "plain");
        assert_eq!(referenced_vars("${A} and ${B}"), vec!["A", "B"]);
    }

    #[test]
    fn test_notfound_variable() {
        assert_eq!(notfound_variable("ZLIB_LIBRARY-NOTFOUND"), Some("ZLIB_LIBRARY"));
        assert_eq!(notfound_variable("-NOTFOUND"), None);
        assert_eq!(notfound_variable("/usr/lib/libz.so"), None);
    }
}
