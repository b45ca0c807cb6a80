//! Directory contexts.
//!
//! One [`DirectoryContext`] exists per source directory that carries a
//! `Kiln.toml`. Contexts form a tree through their parent links. The
//! project name is either declared locally or inherited from the nearest
//! ancestor that declares one.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::target::TargetId;

/// Index of a directory context in the [`DirectoryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirectoryId(u32);

impl DirectoryId {
    /// The top-level directory.
    pub const ROOT: DirectoryId = DirectoryId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A test registered by a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDecl {
    pub name: String,
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

/// An install rule registered by a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRule {
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub files: Vec<PathBuf>,
    pub destination: String,
}

/// Per-directory state.
#[derive(Debug, Clone)]
pub struct DirectoryContext {
    pub id: DirectoryId,
    pub parent: Option<DirectoryId>,
    pub children: Vec<DirectoryId>,
    pub source_dir: PathBuf,
    pub binary_dir: PathBuf,

    /// Project name declared in this directory, if any
    pub project_name: Option<String>,

    /// The whole directory is left out of its parent's default build
    pub exclude_from_all: bool,

    /// Variables visible to this directory, inherited ones included
    pub variables: BTreeMap<String, String>,

    /// Targets owned by this directory, in declaration order
    pub targets: Vec<TargetId>,

    /// Imported targets visible only from this directory
    pub local_imported: HashMap<String, TargetId>,

    pub tests: Vec<TestDecl>,
    pub install_rules: Vec<InstallRule>,
}

impl DirectoryContext {
    fn new(id: DirectoryId, parent: Option<DirectoryId>, source_dir: PathBuf, binary_dir: PathBuf) -> Self {
        DirectoryContext {
            id,
            parent,
            children: Vec::new(),
            source_dir,
            binary_dir,
            project_name: None,
            exclude_from_all: false,
            variables: BTreeMap::new(),
            targets: Vec::new(),
            local_imported: HashMap::new(),
            tests: Vec::new(),
            install_rules: Vec::new(),
        }
    }
}

/// Tree of directory contexts rooted at the top-level source directory.
#[derive(Debug)]
pub struct DirectoryTree {
    dirs: Vec<DirectoryContext>,
}

impl DirectoryTree {
    /// Create a tree holding only the root context.
    pub fn new(source_dir: impl Into<PathBuf>, binary_dir: impl Into<PathBuf>) -> Self {
        let root = DirectoryContext::new(
            DirectoryId::ROOT,
            None,
            source_dir.into(),
            binary_dir.into(),
        );
        DirectoryTree { dirs: vec![root] }
    }

    /// Add a child context. Variables are inherited from the parent.
    pub fn add_child(
        &mut self,
        parent: DirectoryId,
        source_dir: impl Into<PathBuf>,
        binary_dir: impl Into<PathBuf>,
    ) -> DirectoryId {
        let id = DirectoryId(self.dirs.len() as u32);
        let mut ctx = DirectoryContext::new(id, Some(parent), source_dir.into(), binary_dir.into());
        ctx.variables = self.get(parent).variables.clone();
        self.dirs.push(ctx);
        self.get_mut(parent).children.push(id);
        id
    }

    pub fn root(&self) -> &DirectoryContext {
        &self.dirs[0]
    }

    pub fn get(&self, id: DirectoryId) -> &DirectoryContext {
        &self.dirs[id.index()]
    }

    pub fn get_mut(&mut self, id: DirectoryId) -> &mut DirectoryContext {
        &mut self.dirs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Iterate over contexts in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &DirectoryContext> {
        self.dirs.iter()
    }

    /// `id` followed by each of its ancestors up to the root.
    pub fn ancestors(&self, id: DirectoryId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }

    /// Effective project name of a context.
    pub fn project_name(&self, id: DirectoryId) -> Option<&str> {
        self.ancestors(id)
            .find_map(|ctx| ctx.project_name.as_deref())
    }

    /// Contexts below and including `root`, parents before children.
    pub fn preorder(&self, root: DirectoryId) -> Vec<DirectoryId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.get(id).children.iter().rev().copied());
        }
        out
    }

    /// Context whose source directory is exactly `path`.
    pub fn find_by_source(&self, path: &Path) -> Option<DirectoryId> {
        self.dirs.iter().find(|d| d.source_dir == path).map(|d| d.id)
    }
}

/// Iterator returned by [`DirectoryTree::ancestors`].
pub struct Ancestors<'a> {
    tree: &'a DirectoryTree,
    next: Option<DirectoryId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a DirectoryContext;

    fn next(&mut self) -> Option<Self::Item> {
        let ctx = self.tree.get(self.next?);
        self.next = ctx.parent;
        Some(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (DirectoryTree, DirectoryId, DirectoryId, DirectoryId) {
        let mut tree = DirectoryTree::new("/src", "/build");
        tree.get_mut(DirectoryId::ROOT).project_name = Some("top".into());
        tree.get_mut(DirectoryId::ROOT)
            .variables
            .insert("ZLIB".into(), "z".into());
        let lib = tree.add_child(DirectoryId::ROOT, "/src/lib", "/build/lib");
        let tools = tree.add_child(DirectoryId::ROOT, "/src/tools", "/build/tools");
        let deep = tree.add_child(lib, "/src/lib/deep", "/build/lib/deep");
        tree.get_mut(lib).project_name = Some("libproj".into());
        (tree, lib, tools, deep)
    }

    #[test]
    fn test_project_name_inherited() {
        let (tree, lib, tools, deep) = tree();
        assert_eq!(tree.project_name(tools), Some("top"));
        assert_eq!(tree.project_name(lib), Some("libproj"));
        assert_eq!(tree.project_name(deep), Some("libproj"));
    }

    #[test]
    fn test_variables_inherited() {
        let (tree, _, tools, _) = tree();
        assert_eq!(tree.get(tools).variables.get("ZLIB").map(String::as_str), Some("z"));
    }

    #[test]
    fn test_ancestors_and_preorder() {
        let (tree, lib, tools, deep) = tree();
        let chain: Vec<_> = tree.ancestors(deep).map(|d| d.id).collect();
        assert_eq!(chain, vec![deep, lib, DirectoryId::ROOT]);
        assert_eq!(tree.preorder(DirectoryId::ROOT), vec![DirectoryId::ROOT, lib, deep, tools]);
        assert_eq!(tree.find_by_source(Path::new("/src/tools")), Some(tools));
    }
}
