//! CLI integration tests for kiln.
//!
//! Projects here use `languages = ["NONE"]` so no compiler is needed on the
//! machine running the tests.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the kiln binary command, isolated from the user's global config.
fn kiln(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.env("HOME", home).env("KILN_COLOR", "never");
    cmd
}

/// A source tree at `<tmp>/src` with one utility target, an interface
/// target and a test that always passes.
fn utility_project(tmp: &TempDir) -> std::path::PathBuf {
    let src = tmp.path().join("src");
    fs::create_dir_all(src.join("tools")).unwrap();
    fs::write(
        src.join("Kiln.toml"),
        r#"[project]
name = "gen"
languages = ["NONE"]

[directory]
subdirs = ["tools"]

[[target]]
name = "stamp"
kind = "utility"
commands = [["touch", "stamp.txt"]]
outputs = ["stamp.txt"]

[[target]]
name = "headers"
kind = "interface"
include_dirs = ["include"]

[[test]]
name = "always-passes"
command = ["true"]
"#,
    )
    .unwrap();
    fs::write(
        src.join("tools").join("Kiln.toml"),
        r#"[directory]
exclude_from_all = true

[[target]]
name = "lint"
kind = "utility"
commands = [["true"]]
"#,
    )
    .unwrap();
    src
}

// ============================================================================
// kiln --help / completions
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let tmp = TempDir::new().unwrap();
    kiln(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("targets"))
        .stdout(predicate::str::contains("cache"));
}

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();
    kiln(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kiln"));
}

// ============================================================================
// kiln generate
// ============================================================================

#[test]
fn test_generate_without_project_fails() {
    let tmp = TempDir::new().unwrap();
    kiln(tmp.path())
        .arg("generate")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find `Kiln.toml`"));
}

#[test]
fn test_generate_manifest_backend() {
    let tmp = TempDir::new().unwrap();
    let src = utility_project(&tmp);
    let build = tmp.path().join("build");

    kiln(tmp.path())
        .args(["generate", "--backend", "manifest", "-S"])
        .arg(&src)
        .arg("-B")
        .arg(&build)
        .assert()
        .success()
        .stderr(predicate::str::contains("Generated"));

    assert!(build.join("kiln-build.json").is_file());
    assert!(build.join("tools").join("kiln-build.json").is_file());
    assert!(build.join("KilnTests.json").is_file());
    assert!(build.join(".kiln").join("generator.toml").is_file());
    assert!(build.join(".kiln").join("RuleHashes.txt").is_file());

    let manifest = fs::read_to_string(build.join("kiln-build.json")).unwrap();
    assert!(manifest.contains("\"stamp\""));
    assert!(!manifest.contains("\"lint\""));
}

#[test]
fn test_generate_unknown_backend() {
    let tmp = TempDir::new().unwrap();
    let src = utility_project(&tmp);

    kiln(tmp.path())
        .args(["generate", "--backend", "ninja"])
        .current_dir(&src)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown backend `ninja`"));
}

#[test]
fn test_generate_reports_notfound_variables() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(
        src.join("Kiln.toml"),
        r#"[project]
name = "nf"
languages = ["NONE"]

[variables]
FOO_INCLUDE = "FOO_INCLUDE-NOTFOUND"

[[target]]
name = "headers"
kind = "interface"
include_dirs = ["${FOO_INCLUDE}"]
"#,
    )
    .unwrap();

    kiln(tmp.path())
        .args(["generate", "--backend", "manifest"])
        .current_dir(&src)
        .assert()
        .failure()
        .stderr(predicate::str::contains("FOO_INCLUDE"))
        .stderr(predicate::str::contains("used as include directory"));
}

#[test]
fn test_generate_parse_error() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("Kiln.toml"), "[project\nname = 1\n").unwrap();

    kiln(tmp.path())
        .arg("generate")
        .current_dir(&src)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

// ============================================================================
// kiln targets
// ============================================================================

#[test]
fn test_targets_lists_default_build() {
    let tmp = TempDir::new().unwrap();
    let src = utility_project(&tmp);

    let assert = kiln(tmp.path()).arg("targets").current_dir(&src).assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    let stamp = stdout.lines().find(|l| l.starts_with("stamp")).unwrap();
    assert!(stamp.contains("utility"));
    assert!(stamp.ends_with("all"));
    let lint = stdout.lines().find(|l| l.starts_with("lint")).unwrap();
    assert!(lint.contains("tools"));
    assert!(!lint.ends_with("all"));
    let headers = stdout.lines().find(|l| l.starts_with("headers")).unwrap();
    assert!(!headers.ends_with("all"));
}

// ============================================================================
// kiln build / test / cache
// ============================================================================

#[test]
fn test_build_requires_generate() {
    let tmp = TempDir::new().unwrap();
    kiln(tmp.path())
        .args(["build", "-B"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("kiln generate"));
}

#[test]
fn test_manifest_tree_has_no_build_tool() {
    let tmp = TempDir::new().unwrap();
    let src = utility_project(&tmp);
    let build = tmp.path().join("build");

    kiln(tmp.path())
        .args(["generate", "--backend", "manifest", "-B"])
        .arg(&build)
        .current_dir(&src)
        .assert()
        .success();

    kiln(tmp.path())
        .args(["build", "-B"])
        .arg(&build)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no native build tool"));
}

#[test]
fn test_runs_registered_tests_then_clears_cache() {
    let tmp = TempDir::new().unwrap();
    let src = utility_project(&tmp);
    let build = tmp.path().join("build");

    kiln(tmp.path())
        .args(["generate", "--backend", "manifest", "-B"])
        .arg(&build)
        .current_dir(&src)
        .assert()
        .success();

    kiln(tmp.path())
        .args(["test", "-B"])
        .arg(&build)
        .assert()
        .success()
        .stderr(predicate::str::contains("always-passes"))
        .stderr(predicate::str::contains("1 tests passed"));

    kiln(tmp.path())
        .args(["cache", "clear", "-B"])
        .arg(&build)
        .assert()
        .success()
        .stderr(predicate::str::contains("RuleHashes.txt"));
    assert!(!build.join(".kiln").join("RuleHashes.txt").exists());
    assert!(build.join(".kiln").join("generator.toml").exists());
}

#[test]
fn test_failing_test_exits_nonzero() {
    let tmp = TempDir::new().unwrap();
    let src = utility_project(&tmp);
    let manifest = src.join("Kiln.toml");
    let text = fs::read_to_string(&manifest).unwrap();
    fs::write(&manifest, text.replace("command = [\"true\"]", "command = [\"false\"]")).unwrap();
    let build = tmp.path().join("build");

    kiln(tmp.path())
        .args(["generate", "--backend", "manifest", "-B"])
        .arg(&build)
        .current_dir(&src)
        .assert()
        .success();

    kiln(tmp.path())
        .args(["test", "-B"])
        .arg(&build)
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 1 tests failed"));
}
