//! Persisted digests of generated build rules.
//!
//! Build tools only compare timestamps, so a rule whose command changed would
//! not rebuild its output. Each run records a digest of every file rule; on
//! the next run an output whose rule digest changed is deleted so the build
//! tool has to produce it again.
//!
//! File format (`<binary>/.kiln/RuleHashes.txt`):
//!
//! ```text
//! # Hashes of file build rules.
//! 0123456789abcdef0123456789abcdef lib/libcore.a
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::util::fs;
use crate::util::hash::{rule_digest, RULE_DIGEST_LEN};

const HEADER: &str = "# Hashes of file build rules.\n";

/// Output path → rule digest.
#[derive(Debug, Clone, Default)]
pub struct RuleHashStore {
    binary_dir: PathBuf,
    hashes: BTreeMap<String, String>,
}

impl RuleHashStore {
    pub fn new(binary_dir: impl Into<PathBuf>) -> Self {
        RuleHashStore {
            binary_dir: binary_dir.into(),
            hashes: BTreeMap::new(),
        }
    }

    /// Record the digest of `rule` for the first of `outputs`.
    pub fn add(&mut self, outputs: &[PathBuf], rule: &str) {
        let Some(first) = outputs.first() else {
            return;
        };
        let key = self.key(first);
        self.hashes.insert(key, rule_digest(rule));
    }

    /// Compare against the previous run's file.
    ///
    /// Outputs whose digest changed are deleted and returned. Entries for
    /// rules no longer generated are carried over while their output still
    /// exists.
    pub fn check(&mut self, persisted: &Path) -> Result<Vec<PathBuf>> {
        let Some(contents) = fs::read_optional(persisted)? else {
            return Ok(Vec::new());
        };

        let mut deleted = Vec::new();
        for line in contents.lines() {
            if line.len() < RULE_DIGEST_LEN + 2 || line.starts_with('#') {
                continue;
            }
            let (Some(digest), Some(name)) = (line.get(..RULE_DIGEST_LEN), line.get(RULE_DIGEST_LEN + 1..))
            else {
                continue;
            };

            let path = self.full_path(name);
            match self.hashes.get(name) {
                Some(current) if current != digest => {
                    if fs::remove_file_if_exists(&path)? {
                        tracing::debug!("rule changed, removed {}", path.display());
                        deleted.push(path);
                    }
                }
                Some(_) => {}
                None => {
                    if path.exists() {
                        self.hashes.insert(name.to_string(), digest.to_string());
                    }
                }
            }
        }
        Ok(deleted)
    }

    /// Persist the current map. An empty map removes the file.
    pub fn write(&self, persisted: &Path) -> Result<()> {
        if self.hashes.is_empty() {
            fs::remove_file_if_exists(persisted)?;
            return Ok(());
        }
        let mut out = String::from(HEADER);
        for (name, digest) in &self.hashes {
            out.push_str(digest);
            out.push(' ');
            out.push_str(name);
            out.push('\n');
        }
        fs::write_string(persisted, &out)
    }

    /// Digest recorded for `output`.
    pub fn get(&self, output: &Path) -> Option<&str> {
        self.hashes.get(&self.key(output)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn clear(&mut self) {
        self.hashes.clear();
    }

    fn key(&self, output: &Path) -> String {
        let path = if fs::is_inside(output, &self.binary_dir) {
            fs::relative_path(&self.binary_dir, output)
        } else {
            output.to_path_buf()
        };
        path.to_string_lossy().replace('\\', "/")
    }

    fn full_path(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.binary_dir.join(path)
        }
    }
}
