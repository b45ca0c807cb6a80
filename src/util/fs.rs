//! Filesystem utilities.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a file if it exists. Returns whether something was removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => {
            Err(e).with_context(|| format!("failed to remove file: {}", path.display()))
        }
    }
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read file: {}", path.display()))
}

/// Read a file if it exists.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read file: {}", path.display())),
    }
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Write a file only when its contents differ, preserving timestamps of
/// unchanged build files.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    if read_optional(path)?.as_deref() == Some(contents) {
        return Ok(false);
    }
    write_string(path, contents)?;
    Ok(true)
}

/// Find files matching glob patterns relative to a base directory.
///
/// Patterns without glob metacharacters are kept even if the file does not
/// exist yet, since it may be produced by a custom command.
pub fn glob_files(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    for pattern in patterns {
        let full_pattern = base.join(pattern);

        if !pattern.contains(['*', '?', '[']) {
            results.push(full_pattern);
            continue;
        }

        let pattern_str = full_pattern.to_string_lossy();
        for entry in glob(&pattern_str)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
        {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        results.push(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("glob error: {}", e);
                }
            }
        }
    }

    results.sort();
    results.dedup();
    Ok(results)
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Check if a path is inside another path.
pub fn is_inside(path: &Path, parent: &Path) -> bool {
    path.starts_with(parent)
}

/// Extension of a path without the leading dot.
pub fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_glob_files() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("main.c"), "int main() {}").unwrap();
        fs::write(src.join("util.c"), "void util() {}").unwrap();
        fs::write(src.join("readme.txt"), "readme").unwrap();

        let files = glob_files(tmp.path(), &["src/**/*.c".to_string()]).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_glob_keeps_literal_paths() {
        let tmp = TempDir::new().unwrap();
        let files = glob_files(tmp.path(), &["generated.c".to_string()]).unwrap();
        assert_eq!(files, vec![tmp.path().join("generated.c")]);
    }

    #[test]
    fn test_remove_file_if_exists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.o");
        fs::write(&path, "x").unwrap();
        assert!(remove_file_if_exists(&path).unwrap());
        assert!(!remove_file_if_exists(&path).unwrap());
    }

    #[test]
    fn test_write_if_changed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a").join("Makefile");
        assert!(write_if_changed(&path, "all:\n").unwrap());
        assert!(!write_if_changed(&path, "all:\n").unwrap());
        assert!(write_if_changed(&path, "all: x\n").unwrap());
    }
}
