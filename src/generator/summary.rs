//! Cross-cutting artifacts written at the end of Generate.
//!
//! - `<binary>/.kiln/TargetDirectories.txt`: the support directory of every
//!   built target, one per line
//! - `<binary>/kiln-exports.json`: targets marked `export = true`
//! - `<binary>/.kiln/generator.toml`: what produced this build tree

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::target::TargetKind;
use crate::generator::backend::EmitContext;
use crate::util::context::{BuildPaths, KILN_VERSION};
use crate::util::fs;

/// Write the directory manifest. Interface, imported and pseudo-targets have
/// no support directory.
pub fn write_target_directories(ctx: &EmitContext<'_>, paths: &BuildPaths) -> Result<PathBuf> {
    let session = ctx.session;
    let mut out = String::new();
    for context in session.dirs.iter() {
        for &id in &context.targets {
            let target = &session.targets[id];
            if target.imported || matches!(target.kind, TargetKind::Interface | TargetKind::Global) {
                continue;
            }
            if let Some(gt) = ctx.generator_target(id) {
                out.push_str(&gt.support_dir.display().to_string());
                out.push('\n');
            }
        }
    }
    let path = paths.target_directories();
    fs::write_if_changed(&path, &out)?;
    Ok(path)
}

#[derive(Debug, Serialize)]
struct ExportEntry<'a> {
    name: &'a str,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a Path>,
    include_dirs: Vec<PathBuf>,
    link_items: &'a [String],
}

/// Write the export artifact listing exported targets in name order.
pub fn write_exports(ctx: &EmitContext<'_>, paths: &BuildPaths) -> Result<PathBuf> {
    let session = ctx.session;
    let mut exports: Vec<ExportEntry<'_>> = session
        .targets
        .iter()
        .filter(|(_, t)| t.export)
        .map(|(id, t)| ExportEntry {
            name: &t.name,
            kind: t.kind.as_str(),
            location: ctx.generator_target(id).and_then(|gt| gt.output.as_deref()),
            include_dirs: ctx.include_dirs(id),
            link_items: ctx.depends.link_items(id),
        })
        .collect();
    exports.sort_by(|a, b| a.name.cmp(b.name));

    let path = paths.exports_file();
    let json = serde_json::to_string_pretty(&exports).context("failed to serialize exports")?;
    fs::write_if_changed(&path, &json)?;
    Ok(path)
}

/// Record of the generator that produced a build tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorRecord {
    pub version: String,
    pub backend: String,
    pub source_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ide_metadata: Option<String>,
}

impl GeneratorRecord {
    pub fn new(backend: &str, source_dir: &Path, ide_metadata: Option<&str>) -> Self {
        GeneratorRecord {
            version: KILN_VERSION.to_string(),
            backend: backend.to_string(),
            source_dir: source_dir.to_path_buf(),
            ide_metadata: ide_metadata.map(str::to_string),
        }
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        let Some(contents) = fs::read_optional(path)? else {
            return Ok(None);
        };
        let record = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(record))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize generator record")?;
        fs::write_string(path, &contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generator_record_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".kiln").join("generator.toml");
        assert!(GeneratorRecord::load(&path).unwrap().is_none());

        let record = GeneratorRecord::new("makefiles", Path::new("/src"), Some("compile-db"));
        record.save(&path).unwrap();
        assert_eq!(GeneratorRecord::load(&path).unwrap(), Some(record));
    }
}
