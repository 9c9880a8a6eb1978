//! Packaging driver: depsgraph verification and backend hand-off.

use std::path::Path;
use std::sync::Arc;

use kiln_path::ProjectPath;
use kiln_spec::{
    DataSpec, DataSpecEntry, ImageBuilder, NodeKind, PackageDepsgraph, ProgressSink, ToolMode,
    WorkerPool,
};
use tracing::info;

use crate::error::{ProjectError, Result};
use crate::graph::GraphBuilder;
use crate::interrupt::interrupt_requested;
use crate::project::Project;

/// How a packaging run ended. Cancellation is a distinct outcome, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageOutcome {
    Completed { nodes: usize },
    Interrupted,
}

impl Project {
    /// Package the already-cooked outputs under `path` into the backend's
    /// archive format.
    ///
    /// Builds a depsgraph rooted at `path` and verifies every referenced
    /// object has a cooked output present (a missing dependency fails the
    /// whole call before anything is emitted), then hands nodes to the
    /// backend's packager in depsgraph traversal order, group subtrees
    /// contiguous.
    pub fn package_path(
        &self,
        path: &ProjectPath,
        progress: &dyn ProgressSink,
        fast: bool,
        spec: Option<&str>,
        workers: Option<&dyn WorkerPool>,
    ) -> Result<PackageOutcome> {
        if interrupt_requested() {
            return Ok(PackageOutcome::Interrupted);
        }
        let (entry, instance) = self.resolve_packager(path, spec)?;
        let graph = self.build_depsgraph_with(path, instance.as_ref(), &entry)?;

        for (_, node) in graph.traverse() {
            if node.kind == NodeKind::Data && !node.cooked_path.is_file() {
                return Err(ProjectError::DependencyMissing {
                    path: node.path.clone(),
                });
            }
        }

        instance
            .do_package(
                &graph,
                &entry,
                fast,
                &self.bridge_cache,
                &self.bridge,
                progress,
                workers,
            )
            .map_err(|err| ProjectError::SpecFailed {
                name: entry.name().to_string(),
                source: err.into(),
            })?;

        if interrupt_requested() {
            return Ok(PackageOutcome::Interrupted);
        }
        info!(path = %path, backend = entry.name(), nodes = graph.len(), "packaged");
        Ok(PackageOutcome::Completed { nodes: graph.len() })
    }

    /// Construct the full depsgraph of the project subtree at `path`,
    /// using the first enabled backend.
    pub fn build_package_depsgraph(&self, path: &ProjectPath) -> Result<PackageDepsgraph> {
        let pds = self
            .compiled_specs
            .iter()
            .find(|pds| pds.enabled)
            .ok_or(ProjectError::NoActiveSpec)?;
        let entry = Arc::clone(&pds.entry);
        let instance: Arc<dyn DataSpec> =
            Arc::from(entry.instantiate(&self.spec_context(&entry), ToolMode::Package));
        self.build_depsgraph_with(path, instance.as_ref(), &entry)
    }

    pub(crate) fn build_depsgraph_with(
        &self,
        path: &ProjectPath,
        spec: &dyn DataSpec,
        entry: &Arc<DataSpecEntry>,
    ) -> Result<PackageDepsgraph> {
        let cooked_root = self
            .compiled_specs
            .iter()
            .find(|pds| pds.entry.name() == entry.name())
            .map(|pds| pds.cooked_root.clone())
            .unwrap_or_else(|| self.cooked_root.join(entry.name()));

        let files = self.collect_files(path, true)?;
        let builder = GraphBuilder::new(spec, entry.name(), &cooked_root, self.groups()?);
        builder.build(path, &files)
    }

    /// Backend responsible for packaging `path`: the manually selected one,
    /// or the first enabled backend that claims it.
    fn resolve_packager(
        &self,
        path: &ProjectPath,
        selected: Option<&str>,
    ) -> Result<(Arc<DataSpecEntry>, Arc<dyn DataSpec>)> {
        if let Some(name) = selected {
            let entry = self
                .registry
                .find(name)
                .ok_or_else(|| ProjectError::UnknownSpec {
                    name: name.to_string(),
                })?;
            let instance: Arc<dyn DataSpec> =
                Arc::from(entry.instantiate(&self.spec_context(&entry), ToolMode::Package));
            if !instance.can_package(path) {
                return Err(ProjectError::PackageUnsupported { path: path.clone() });
            }
            return Ok((entry, instance));
        }

        let mut any_enabled = false;
        for pds in &self.compiled_specs {
            if !pds.enabled {
                continue;
            }
            any_enabled = true;
            let instance: Arc<dyn DataSpec> = Arc::from(
                pds.entry
                    .instantiate(&self.spec_context(&pds.entry), ToolMode::Package),
            );
            if instance.can_package(path) {
                return Ok((Arc::clone(&pds.entry), instance));
            }
        }
        if !any_enabled {
            return Err(ProjectError::NoActiveSpec);
        }
        Err(ProjectError::PackageUnsupported { path: path.clone() })
    }

    /// Drive the leaf image writer over a packaged output directory.
    ///
    /// Estimates the required size first so unimageable layouts fail before
    /// any emission starts.
    pub fn build_image(
        &self,
        dir: &Path,
        builder: &dyn ImageBuilder,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let estimate = builder
            .estimate_size(dir)
            .map_err(|err| ProjectError::SpecFailed {
                name: "image".to_string(),
                source: err.into(),
            })?;
        info!(dir = %dir.display(), bytes = estimate, "building image");
        builder
            .build(dir, progress)
            .map_err(|err| ProjectError::SpecFailed {
                name: "image".to_string(),
                source: err.into(),
            })
    }
}
