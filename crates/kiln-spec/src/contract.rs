//! The capability interface backends implement.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use kiln_bridge::BridgeToken;
use kiln_path::ProjectPath;

use crate::cache::BridgeCache;
use crate::depsgraph::PackageDepsgraph;
use crate::entry::DataSpecEntry;
use crate::object::{DataEndianness, DataPlatform, FourCc, PlainObject, SourceObject};
use crate::progress::ProgressSink;
use crate::workers::WorkerPool;

/// Inputs for one extract pass over a packaged/image source.
#[derive(Debug, Clone)]
pub struct ExtractPassInfo {
    pub src_path: PathBuf,
    pub extract_args: Vec<String>,
    pub force: bool,
}

/// Advisory description of content about to be extracted.
///
/// Built by [`DataSpec::can_extract`] so the user can see what an extraction
/// would produce before committing to it.
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub name: String,
    pub desc: String,
    pub children: Vec<ExtractReport>,
}

/// Per-backend capability interface.
///
/// The three phases are independent: a backend may support any subset, and
/// every hook is defaulted so implementations only write the phases they
/// claim. Splitting "claims this path" (`can_*`) from "performs the
/// operation" (`do_*`) lets the pipeline pick a backend without committing
/// side effects.
pub trait DataSpec: Send + Sync {
    /// Whether this backend can reverse `info.src_path` into editable
    /// working resources, and what that would produce.
    fn can_extract(&self, _info: &ExtractPassInfo, _reports: &mut Vec<ExtractReport>) -> bool {
        false
    }

    fn do_extract(
        &self,
        _info: &ExtractPassInfo,
        _progress: &dyn ProgressSink,
    ) -> anyhow::Result<()> {
        anyhow::bail!("extract not supported by this backend")
    }

    /// Whether this backend claims `path` for cook pass `pass`.
    ///
    /// A negative pass means "always cook": pass gating does not apply.
    fn can_cook(&self, _path: &ProjectPath, _tool: &BridgeToken, _pass: i32) -> bool {
        false
    }

    /// Hand `path` to a different backend based on content inspection.
    ///
    /// Called after this backend has claimed the path; the default keeps the
    /// claim.
    fn override_data_spec(
        &self,
        _path: &ProjectPath,
        current: &Arc<DataSpecEntry>,
        _tool: &BridgeToken,
    ) -> Arc<DataSpecEntry> {
        Arc::clone(current)
    }

    /// Materialize the working resource at `path` as a [`SourceObject`].
    ///
    /// The pipeline never constructs objects itself; this is the only way a
    /// path becomes an object. The default produces a [`PlainObject`] with a
    /// `NULL` type tag.
    fn load_object(&self, path: &ProjectPath) -> anyhow::Result<Arc<dyn SourceObject>> {
        Ok(Arc::new(PlainObject::new(path.clone(), FourCc::NULL)))
    }

    /// Target byte-order for cooked output.
    fn target_endianness(&self) -> DataEndianness {
        DataEndianness::Little
    }

    /// Target data-format family for cooked output.
    fn target_platform(&self) -> DataPlatform {
        DataPlatform::Generic
    }

    /// Cook the working resource at `path`, writing the platform-specific
    /// representation to `cooked`.
    ///
    /// The pipeline supplies a staging location for `cooked` and only
    /// publishes it on success, so implementations are free to fail midway.
    /// The default loads the object and streams its cooked chunks to disk.
    fn do_cook(
        &self,
        path: &ProjectPath,
        cooked: &Path,
        _fast: bool,
        _cache: &BridgeCache,
        _tool: &BridgeToken,
        progress: &dyn Fn(&str),
    ) -> anyhow::Result<()> {
        let object = self.load_object(path)?;
        progress(path.as_str());

        let mut buffer = Vec::new();
        let ok = object.cook_object(
            &mut |chunk| buffer.extend_from_slice(chunk),
            self.target_endianness(),
            self.target_platform(),
        );
        if !ok {
            anyhow::bail!("cook failed for {path}");
        }
        std::fs::write(cooked, &buffer)
            .with_context(|| format!("failed to write cooked output {}", cooked.display()))?;
        Ok(())
    }

    /// Whether this backend can package the subtree rooted at `path`.
    fn can_package(&self, _path: &ProjectPath) -> bool {
        false
    }

    /// Emit the final archive for an already-built dependency graph.
    ///
    /// Nodes must be consumed in graph traversal order; group subtrees are
    /// contiguous runs of that order. Work may be offloaded to `workers`,
    /// but the call must not return before all of it has finished.
    fn do_package(
        &self,
        _graph: &PackageDepsgraph,
        _entry: &Arc<DataSpecEntry>,
        _fast: bool,
        _cache: &BridgeCache,
        _tool: &BridgeToken,
        _progress: &dyn ProgressSink,
        _workers: Option<&dyn WorkerPool>,
    ) -> anyhow::Result<()> {
        anyhow::bail!("packaging not supported by this backend")
    }

    /// Request that an in-flight `do_cook`/`do_package` return as soon as
    /// possible without leaving a partially-written cooked file.
    ///
    /// Safe to call concurrently with the in-flight operation.
    fn interrupt_cook(&self) {}
}
