//! The long-lived project handle and its registration state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_bridge::BridgeToken;
use kiln_config::ConfigFile;
use kiln_path::{CONFIG_DIR, ProjectPath, ProjectRootPath};
use kiln_spec::{BridgeCache, DataSpecEntry, SpecContext, SpecRegistry};
use tracing::{debug, info, warn};

use crate::error::{ProjectError, Result};
use crate::fingerprint::file_fingerprint;
use crate::interrupt;

/// Subdirectory of the hidden project directory holding cooked outputs.
const COOKED_DIR: &str = "cooked";

const SPECS_STORE: &str = "specs";
const PATHS_STORE: &str = "paths";
const GROUPS_STORE: &str = "groups";

/// Per-project activation record for one registered backend.
///
/// Rebuilt whenever the persisted backend-enable set changes.
#[derive(Debug, Clone)]
pub struct ProjectDataSpec {
    pub entry: Arc<DataSpecEntry>,
    /// Root of this backend's cooked-output subtree, mirroring the working
    /// tree's relative layout.
    pub cooked_root: PathBuf,
    pub enabled: bool,
}

/// One project instance: an intermediate working directory staging
/// resources in their editor formats, plus the operations to cook and
/// package them.
pub struct Project {
    pub(crate) root: ProjectRootPath,
    pub(crate) cooked_root: PathBuf,
    pub(crate) registry: Arc<SpecRegistry>,
    pub(crate) specs_store: ConfigFile,
    pub(crate) paths_store: ConfigFile,
    pub(crate) groups_store: ConfigFile,
    pub(crate) compiled_specs: Vec<ProjectDataSpec>,
    pub(crate) bridge_cache: BridgeCache,
    pub(crate) bridge: BridgeToken,
}

impl Project {
    /// Open the project rooted at `root`.
    ///
    /// Creates the hidden configuration directory on first open. Fails if
    /// the root is not a directory or its configuration is unreadable; no
    /// half-initialized instance is ever returned.
    pub fn open(root: ProjectRootPath, registry: Arc<SpecRegistry>) -> Result<Self> {
        if !root.as_path().is_dir() {
            return Err(ProjectError::InvalidRoot {
                path: root.as_path().to_path_buf(),
            });
        }
        let dot_dir = root.as_path().join(CONFIG_DIR);
        fs::create_dir_all(&dot_dir).map_err(|e| ProjectError::io("create", &dot_dir, e))?;

        let mut project = Self {
            cooked_root: dot_dir.join(COOKED_DIR),
            specs_store: ConfigFile::new(&dot_dir, SPECS_STORE),
            paths_store: ConfigFile::new(&dot_dir, PATHS_STORE),
            groups_store: ConfigFile::new(&dot_dir, GROUPS_STORE),
            registry,
            root,
            compiled_specs: Vec::new(),
            bridge_cache: BridgeCache::new(),
            bridge: BridgeToken::new(),
        };
        project.rescan_data_specs()?;
        info!(root = %project.root, "opened project");
        Ok(project)
    }

    pub fn root(&self) -> &ProjectRootPath {
        &self.root
    }

    /// Shared handle to the authoring-tool connection.
    pub fn bridge_token(&self) -> &BridgeToken {
        &self.bridge
    }

    /// Backends targetable by this project, in registration order.
    pub fn data_specs(&self) -> &[ProjectDataSpec] {
        &self.compiled_specs
    }

    /// Re-read the persisted backend-enable set and rebuild the activation
    /// records. Safe to call repeatedly to pick up external edits.
    pub fn rescan_data_specs(&mut self) -> Result<()> {
        let enabled = self.specs_store.read()?;
        self.compiled_specs = self
            .registry
            .entries()
            .iter()
            .map(|entry| ProjectDataSpec {
                cooked_root: self.cooked_root.join(entry.name()),
                enabled: enabled
                    .iter()
                    .any(|line| line.eq_ignore_ascii_case(entry.name())),
                entry: Arc::clone(entry),
            })
            .collect();
        Ok(())
    }

    /// Persistently enable backends by display name.
    ///
    /// Unknown names fail the whole call before any state changes.
    pub fn enable_data_specs(&mut self, names: &[&str]) -> Result<()> {
        let entries = self.resolve_spec_names(names)?;
        let mut txn = self.specs_store.lock()?;
        for entry in &entries {
            txn.add_line(entry.name());
        }
        txn.commit()?;
        self.rescan_data_specs()
    }

    /// Persistently disable backends by display name.
    ///
    /// Unknown names fail the whole call before any state changes.
    pub fn disable_data_specs(&mut self, names: &[&str]) -> Result<()> {
        let entries = self.resolve_spec_names(names)?;
        let mut txn = self.specs_store.lock()?;
        for entry in &entries {
            txn.remove_line(entry.name());
        }
        txn.commit()?;
        self.rescan_data_specs()
    }

    fn resolve_spec_names(&self, names: &[&str]) -> Result<Vec<Arc<DataSpecEntry>>> {
        names
            .iter()
            .map(|name| {
                self.registry
                    .find(name)
                    .ok_or_else(|| ProjectError::UnknownSpec {
                        name: (*name).to_string(),
                    })
            })
            .collect()
    }

    /// Register working files in the tracked-path set.
    ///
    /// Blocks while content hashing takes place. Adding an already-tracked
    /// path is a no-op.
    pub fn add_paths(&self, paths: &[ProjectPath]) -> Result<()> {
        let mut fingerprints = Vec::with_capacity(paths.len());
        for path in paths {
            let abs = self.root.resolve(path);
            if !abs.is_file() {
                return Err(ProjectError::NotAFile { path: path.clone() });
            }
            let fingerprint =
                file_fingerprint(&abs).map_err(|e| ProjectError::io("hash", &abs, e))?;
            fingerprints.push((path, fingerprint));
        }

        let mut txn = self.paths_store.lock()?;
        for (path, fingerprint) in fingerprints {
            let tracked = txn
                .lines()
                .iter()
                .any(|line| parse_path_line(line).is_some_and(|(p, _)| p == *path));
            if tracked {
                debug!(%path, "path already tracked");
                continue;
            }
            txn.add_line(&path_line(path, &fingerprint));
        }
        txn.commit()?;
        Ok(())
    }

    /// Unregister working files and delete their cooked outputs.
    ///
    /// Never touches working files. With `recursive`, a directory path
    /// removes every tracked path beneath it.
    pub fn remove_paths(&self, paths: &[ProjectPath], recursive: bool) -> Result<()> {
        let mut txn = self.paths_store.lock()?;
        for path in paths {
            txn.retain(|line| match parse_path_line(line) {
                Some((tracked, _)) => {
                    if recursive {
                        !tracked.starts_with(path)
                    } else {
                        tracked != *path
                    }
                }
                None => true,
            });
        }
        txn.commit()?;

        for path in paths {
            self.clean_outputs(path, recursive)?;
        }
        Ok(())
    }

    /// Tracked paths and their last-cooked fingerprints.
    pub fn tracked_paths(&self) -> Result<BTreeMap<ProjectPath, String>> {
        let mut tracked = BTreeMap::new();
        for line in self.paths_store.read()? {
            match parse_path_line(&line) {
                Some((path, fingerprint)) => {
                    tracked.insert(path, fingerprint.to_string());
                }
                None => warn!(line, "skipping malformed tracked-path line"),
            }
        }
        Ok(tracked)
    }

    /// Register a working subdirectory as a dependency group.
    ///
    /// Cooked objects in a group are packaged contiguously for burst loads
    /// off slow block devices. A directory already covered by a registered
    /// group (or covering one) is rejected with no side effect; re-adding
    /// the same directory is a no-op.
    pub fn add_group(&self, path: &ProjectPath) -> Result<()> {
        let abs = self.root.resolve(path);
        if !abs.is_dir() {
            return Err(ProjectError::NotADirectory { path: path.clone() });
        }

        let mut txn = self.groups_store.lock()?;
        if txn.contains(path.as_str()) {
            return Ok(());
        }
        for line in txn.lines() {
            let Ok(group) = ProjectPath::new(line) else {
                continue;
            };
            if path.starts_with(&group) {
                return Err(ProjectError::AlreadyGrouped {
                    path: path.clone(),
                    group,
                });
            }
            if group.starts_with(path) {
                return Err(ProjectError::ContainsGroup {
                    path: path.clone(),
                    group,
                });
            }
        }
        txn.add_line(path.as_str());
        txn.commit()?;
        Ok(())
    }

    /// Unregister a dependency group. Removing an unregistered directory is
    /// a no-op.
    pub fn remove_group(&self, path: &ProjectPath) -> Result<()> {
        let mut txn = self.groups_store.lock()?;
        txn.remove_line(path.as_str());
        txn.commit()?;
        Ok(())
    }

    /// Registered dependency-group directories.
    pub fn groups(&self) -> Result<Vec<ProjectPath>> {
        let mut groups = Vec::new();
        for line in self.groups_store.read()? {
            match ProjectPath::new(&line) {
                Ok(group) => groups.push(group),
                Err(_) => warn!(line, "skipping malformed group line"),
            }
        }
        Ok(groups)
    }

    /// Delete cooked outputs under `path` without touching tracked-path
    /// registration or working files.
    pub fn clean_path(&self, path: &ProjectPath, recursive: bool) -> Result<()> {
        self.clean_outputs(path, recursive)
    }

    /// Request cancellation of the in-flight cook/package run; see
    /// [`crate::request_interrupt`].
    pub fn interrupt_cook(&self) {
        interrupt::request_interrupt();
    }

    /// Record a backend-assigned object id for later reference resolution.
    pub fn add_bridge_path(&self, id: u64, path: ProjectPath) {
        self.bridge_cache.add(id, path);
    }

    /// Resolve a backend-assigned object id back to its source path.
    pub fn lookup_bridge_path(&self, id: u64) -> Option<ProjectPath> {
        self.bridge_cache.lookup(id)
    }

    /// Drop all bridge-cache entries.
    pub fn clear_bridge_cache(&self) {
        self.bridge_cache.clear();
    }

    /// Per-entry context backend instances are bound to.
    pub(crate) fn spec_context(&self, entry: &Arc<DataSpecEntry>) -> SpecContext {
        let cooked_root = self
            .compiled_specs
            .iter()
            .find(|pds| pds.entry.name() == entry.name())
            .map(|pds| pds.cooked_root.clone())
            .unwrap_or_else(|| self.cooked_root.join(entry.name()));
        SpecContext {
            work_root: self.root.as_path().to_path_buf(),
            cooked_root,
        }
    }

    pub(crate) fn cooked_mirror(cooked_root: &Path, path: &ProjectPath) -> PathBuf {
        let mut abs = cooked_root.to_path_buf();
        for component in path.components() {
            abs.push(component);
        }
        abs
    }

    /// Collect cookable working files under `path` in deterministic
    /// traversal order (sorted by name, directories descended in order).
    pub(crate) fn collect_files(
        &self,
        path: &ProjectPath,
        recursive: bool,
    ) -> Result<Vec<ProjectPath>> {
        let abs = self.root.resolve(path);
        if abs.is_file() {
            return Ok(vec![path.clone()]);
        }
        if !abs.is_dir() {
            return Err(ProjectError::MissingPath { path: path.clone() });
        }
        let mut files = Vec::new();
        self.walk_dir(path, recursive, &mut files)?;
        Ok(files)
    }

    fn walk_dir(
        &self,
        dir: &ProjectPath,
        recursive: bool,
        out: &mut Vec<ProjectPath>,
    ) -> Result<()> {
        let abs = self.root.resolve(dir);
        let entries = fs::read_dir(&abs).map_err(|e| ProjectError::io("scan", &abs, e))?;

        let mut names: Vec<(String, bool)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ProjectError::io("scan", &abs, e))?;
            let Ok(name) = entry.file_name().into_string() else {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 file name");
                continue;
            };
            if name == CONFIG_DIR {
                continue;
            }
            let is_dir = entry.path().is_dir();
            names.push((name, is_dir));
        }
        names.sort();

        for (name, is_dir) in names {
            let rel = dir.join(&name)?;
            if is_dir {
                if recursive {
                    self.walk_dir(&rel, recursive, out)?;
                }
            } else {
                out.push(rel);
            }
        }
        Ok(())
    }

    fn clean_outputs(&self, path: &ProjectPath, recursive: bool) -> Result<()> {
        for pds in &self.compiled_specs {
            let target = Self::cooked_mirror(&pds.cooked_root, path);
            if target.is_file() {
                fs::remove_file(&target).map_err(|e| ProjectError::io("remove", &target, e))?;
            } else if target.is_dir() {
                clean_dir(&target, recursive)?;
            }
        }
        Ok(())
    }

    /// Rewrite the stored fingerprints of successfully cooked paths.
    pub(crate) fn record_fingerprints(&self, updates: &[(ProjectPath, String)]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut txn = self.paths_store.lock()?;
        for (path, fingerprint) in updates {
            let was_tracked = txn
                .lines()
                .iter()
                .any(|line| parse_path_line(line).is_some_and(|(p, _)| p == *path));
            if !was_tracked {
                continue;
            }
            txn.retain(|line| {
                parse_path_line(line).is_none_or(|(tracked, _)| tracked != *path)
            });
            txn.add_line(&path_line(path, fingerprint));
        }
        txn.commit()?;
        Ok(())
    }
}

fn path_line(path: &ProjectPath, fingerprint: &str) -> String {
    format!("{path}\t{fingerprint}")
}

fn parse_path_line(line: &str) -> Option<(ProjectPath, &str)> {
    let (raw_path, fingerprint) = line.split_once('\t')?;
    let path = ProjectPath::new(raw_path).ok()?;
    Some((path, fingerprint))
}

fn clean_dir(dir: &Path, recursive: bool) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| ProjectError::io("scan", dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ProjectError::io("scan", dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                clean_dir(&path, recursive)?;
            }
        } else {
            fs::remove_file(&path).map_err(|e| ProjectError::io("remove", &path, e))?;
        }
    }
    // Drop the directory itself if the clean emptied it.
    let _ = fs::remove_dir(dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(dir: &TempDir) -> Project {
        Project::open(
            ProjectRootPath::new(dir.path()),
            Arc::new(SpecRegistry::new()),
        )
        .unwrap()
    }

    fn write_working(dir: &TempDir, rel: &str, contents: &str) -> ProjectPath {
        let abs = dir.path().join(rel);
        fs::create_dir_all(abs.parent().unwrap()).unwrap();
        fs::write(&abs, contents).unwrap();
        ProjectPath::new(rel).unwrap()
    }

    #[test]
    fn test_open_rejects_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        let result = Project::open(
            ProjectRootPath::new(&missing),
            Arc::new(SpecRegistry::new()),
        );
        assert!(matches!(result, Err(ProjectError::InvalidRoot { .. })));
    }

    #[test]
    fn test_add_paths_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        let path = write_working(&dir, "models/foo.mesh", "mesh data");

        project.add_paths(&[path.clone()]).unwrap();
        project.add_paths(&[path.clone()]).unwrap();

        let tracked = project.tracked_paths().unwrap();
        assert_eq!(tracked.len(), 1);
        assert!(tracked.contains_key(&path));
    }

    #[test]
    fn test_add_paths_rejects_directories() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        fs::create_dir(dir.path().join("models")).unwrap();

        let result = project.add_paths(&[ProjectPath::new("models").unwrap()]);
        assert!(matches!(result, Err(ProjectError::NotAFile { .. })));
    }

    #[test]
    fn test_remove_paths_recursive() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        let a = write_working(&dir, "models/a.mesh", "a");
        let b = write_working(&dir, "models/sub/b.mesh", "b");
        let c = write_working(&dir, "textures/c.tex", "c");
        project.add_paths(&[a, b, c.clone()]).unwrap();

        project
            .remove_paths(&[ProjectPath::new("models").unwrap()], true)
            .unwrap();

        let tracked = project.tracked_paths().unwrap();
        assert_eq!(tracked.len(), 1);
        assert!(tracked.contains_key(&c));
        // Working files stay put.
        assert!(dir.path().join("models/a.mesh").exists());
    }

    #[test]
    fn test_group_nesting_rejected() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        fs::create_dir_all(dir.path().join("levels/level1/sub")).unwrap();

        let level1 = ProjectPath::new("levels/level1").unwrap();
        let sub = ProjectPath::new("levels/level1/sub").unwrap();

        project.add_group(&level1).unwrap();
        // Re-adding the same group is a no-op.
        project.add_group(&level1).unwrap();

        let result = project.add_group(&sub);
        assert!(matches!(result, Err(ProjectError::AlreadyGrouped { .. })));
        assert_eq!(project.groups().unwrap(), vec![level1.clone()]);

        // An ancestor of a registered group is rejected too.
        let levels = ProjectPath::new("levels").unwrap();
        assert!(matches!(
            project.add_group(&levels),
            Err(ProjectError::ContainsGroup { .. })
        ));

        project.remove_group(&level1).unwrap();
        assert!(project.groups().unwrap().is_empty());
    }

    #[test]
    fn test_group_requires_directory() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        write_working(&dir, "models/foo.mesh", "x");

        let result = project.add_group(&ProjectPath::new("models/foo.mesh").unwrap());
        assert!(matches!(result, Err(ProjectError::NotADirectory { .. })));
    }

    #[test]
    fn test_collect_files_deterministic_order() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        write_working(&dir, "models/b.mesh", "b");
        write_working(&dir, "models/a.mesh", "a");
        write_working(&dir, "models/sub/c.mesh", "c");

        let flat = project
            .collect_files(&ProjectPath::new("models").unwrap(), false)
            .unwrap();
        let flat: Vec<&str> = flat.iter().map(ProjectPath::as_str).collect();
        assert_eq!(flat, ["models/a.mesh", "models/b.mesh"]);

        let deep = project
            .collect_files(&ProjectPath::new("models").unwrap(), true)
            .unwrap();
        let deep: Vec<&str> = deep.iter().map(ProjectPath::as_str).collect();
        assert_eq!(deep, ["models/a.mesh", "models/b.mesh", "models/sub/c.mesh"]);
    }

    #[test]
    fn test_collect_files_skips_config_dir() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        write_working(&dir, "top.mesh", "t");

        let files = project
            .collect_files(&ProjectPath::project_root(), true)
            .unwrap();
        let files: Vec<&str> = files.iter().map(ProjectPath::as_str).collect();
        assert_eq!(files, ["top.mesh"]);
    }

    #[test]
    fn test_missing_path_errors() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        let result = project.collect_files(&ProjectPath::new("absent").unwrap(), false);
        assert!(matches!(result, Err(ProjectError::MissingPath { .. })));
    }
}
