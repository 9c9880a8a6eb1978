//! Absolute project anchors and project discovery.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::path::ProjectPath;

/// Name of the hidden per-project configuration directory.
pub const CONFIG_DIR: &str = ".kiln";

/// The absolute filesystem location anchoring all [`ProjectPath`]s for one
/// project instance.
#[derive(Clone, PartialEq, Eq)]
pub struct ProjectRootPath {
    root: PathBuf,
}

impl ProjectRootPath {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn as_path(&self) -> &Path {
        &self.root
    }

    /// Absolute location of `path` inside this project.
    pub fn resolve(&self, path: &ProjectPath) -> PathBuf {
        let mut abs = self.root.clone();
        for component in path.components() {
            abs.push(component);
        }
        abs
    }

    /// Express an absolute path relative to this root, if it lies inside.
    pub fn relativize(&self, abs: &Path) -> Option<ProjectPath> {
        let rel = abs.strip_prefix(&self.root).ok()?;
        let text = rel.to_str()?;
        ProjectPath::new(text).ok()
    }
}

impl fmt::Display for ProjectRootPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

impl fmt::Debug for ProjectRootPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectRootPath({:?})", self.root)
    }
}

/// Locate the enclosing project by walking `start` and its ancestors until a
/// directory containing [`CONFIG_DIR`] is found.
pub fn find_project_root(start: &Path) -> Option<ProjectRootPath> {
    let start = if start.is_dir() {
        start
    } else {
        start.parent()?
    };
    for dir in start.ancestors() {
        if dir.join(CONFIG_DIR).is_dir() {
            return Some(ProjectRootPath::new(dir));
        }
    }
    None
}
