//! Package depsgraph construction.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_path::ProjectPath;
use kiln_spec::{DataSpec, Node, NodeId, NodeKind, PackageDepsgraph, SourceObject};
use tracing::trace;

use crate::error::{ProjectError, Result};

/// Builds one depsgraph for a packaging run.
///
/// Nodes are materialized at their first-discovery position, depth-first
/// over the dependency edges each object declares. Objects under a
/// registered dependency-group directory are gathered under a `Group` node
/// so the group's members pack contiguously; an object pulled into two
/// different groups is duplicated once per group, trading storage for
/// seek-locality, while references within one group deduplicate.
pub(crate) struct GraphBuilder<'a> {
    spec: &'a dyn DataSpec,
    spec_name: &'a str,
    cooked_root: &'a Path,
    groups: Vec<ProjectPath>,
    graph: PackageDepsgraph,
    /// Dedup key: (group context, working path). `None` context covers all
    /// ungrouped placement.
    visited: HashMap<(Option<ProjectPath>, ProjectPath), NodeId>,
    /// Every materialized path, regardless of context. An ungrouped
    /// discovery of an already-placed object is a reference, never a copy;
    /// only a group context forces its own copy.
    seen: HashSet<ProjectPath>,
    group_nodes: HashMap<ProjectPath, NodeId>,
    last_child: HashMap<NodeId, NodeId>,
}

impl<'a> GraphBuilder<'a> {
    pub(crate) fn new(
        spec: &'a dyn DataSpec,
        spec_name: &'a str,
        cooked_root: &'a Path,
        groups: Vec<ProjectPath>,
    ) -> Self {
        Self {
            spec,
            spec_name,
            cooked_root,
            groups,
            graph: PackageDepsgraph::new(),
            visited: HashMap::new(),
            seen: HashSet::new(),
            group_nodes: HashMap::new(),
            last_child: HashMap::new(),
        }
    }

    /// Build the graph rooted at `root_path` over `files`, which must be in
    /// working-tree traversal order.
    pub(crate) fn build(
        mut self,
        root_path: &ProjectPath,
        files: &[ProjectPath],
    ) -> Result<PackageDepsgraph> {
        let root = self.graph.push(Node {
            kind: NodeKind::Group,
            path: root_path.clone(),
            cooked_path: self.mirror(root_path),
            object: None,
            sub: None,
            next: None,
        });
        debug_assert_eq!(root, NodeId::ROOT);

        for file in files {
            self.place(file.clone(), None, None, root)?;
        }
        Ok(self.graph)
    }

    /// Place one object into the tree under the given group context.
    ///
    /// A `None` context routes objects under a registered group directory
    /// into that group's node; inside a group context every dependency is
    /// materialized within the group, keeping its subtree self-contained.
    fn place(
        &mut self,
        path: ProjectPath,
        prefetched: Option<Arc<dyn SourceObject>>,
        ctx: Option<&ProjectPath>,
        parent: NodeId,
    ) -> Result<()> {
        if let Some(group) = ctx {
            let group = group.clone();
            return self.materialize(path, prefetched, Some(group), parent);
        }
        match self.nearest_group(&path) {
            None => self.materialize(path, prefetched, None, parent),
            Some(group) => {
                let group_node = self.group_node(&group, parent);
                self.materialize(path, prefetched, Some(group), group_node)
            }
        }
    }

    fn materialize(
        &mut self,
        path: ProjectPath,
        prefetched: Option<Arc<dyn SourceObject>>,
        ctx: Option<ProjectPath>,
        parent: NodeId,
    ) -> Result<()> {
        let key = (ctx.clone(), path.clone());
        if self.visited.contains_key(&key) {
            // Later discoveries reference the existing node.
            return Ok(());
        }
        if ctx.is_none() && self.seen.contains(&path) {
            return Ok(());
        }

        let object = match prefetched {
            Some(object) => object,
            None => self
                .spec
                .load_object(&path)
                .map_err(|err| ProjectError::SpecFailed {
                    name: self.spec_name.to_string(),
                    source: err.into(),
                })?,
        };

        let id = self.graph.push(Node {
            kind: NodeKind::Data,
            path: path.clone(),
            cooked_path: self.mirror(&path),
            object: Some(Arc::clone(&object)),
            sub: None,
            next: None,
        });
        self.attach(parent, id);
        self.visited.insert(key, id);
        self.seen.insert(path.clone());
        trace!(path = %path, ctx = ?ctx, "depsgraph node");

        let mut deps: Vec<Arc<dyn SourceObject>> = Vec::new();
        object.gather_deps(&mut |dep| deps.push(dep));
        for dep in deps {
            let dep_path = dep.path().clone();
            self.place(dep_path, Some(dep), ctx.as_ref(), parent)?;
        }
        Ok(())
    }

    /// Group node for `group`, created in the current chain on first
    /// discovery.
    fn group_node(&mut self, group: &ProjectPath, parent: NodeId) -> NodeId {
        if let Some(&existing) = self.group_nodes.get(group) {
            return existing;
        }
        let id = self.graph.push(Node {
            kind: NodeKind::Group,
            path: group.clone(),
            cooked_path: self.mirror(group),
            object: None,
            sub: None,
            next: None,
        });
        self.attach(parent, id);
        self.group_nodes.insert(group.clone(), id);
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        match self.last_child.get(&parent) {
            Some(&last) => self.graph.link_next(last, child),
            None => self.graph.link_sub(parent, child),
        }
        self.last_child.insert(parent, child);
    }

    /// Nearest registered group directory containing `path`.
    fn nearest_group(&self, path: &ProjectPath) -> Option<ProjectPath> {
        self.groups
            .iter()
            .filter(|group| path.starts_with(group))
            .max_by_key(|group| group.as_str().len())
            .cloned()
    }

    fn mirror(&self, path: &ProjectPath) -> PathBuf {
        let mut abs = self.cooked_root.to_path_buf();
        for component in path.components() {
            abs.push(component);
        }
        abs
    }
}
