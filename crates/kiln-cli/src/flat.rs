//! Built-in pass-through backend.
//!
//! The flat backend claims every working file, cooks by copying bytes
//! unchanged, and packages cooked outputs into a single length-prefixed
//! archive. It exists so a fresh project is usable before any engine
//! backend is installed, and doubles as a reference implementation of the
//! contract.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use kiln_bridge::BridgeToken;
use kiln_path::ProjectPath;
use kiln_spec::{
    BridgeCache, DataSpec, DataSpecEntry, NodeKind, PackageDepsgraph, ProgressSink, SpecContext,
    SpecRegistry, WorkerPool,
};

pub const FLAT_SPEC_NAME: &str = "flat";

pub struct FlatSpec {
    context: SpecContext,
}

impl DataSpec for FlatSpec {
    fn can_cook(&self, _path: &ProjectPath, _tool: &BridgeToken, _pass: i32) -> bool {
        true
    }

    fn do_cook(
        &self,
        path: &ProjectPath,
        cooked: &Path,
        _fast: bool,
        _cache: &BridgeCache,
        _tool: &BridgeToken,
        progress: &dyn Fn(&str),
    ) -> anyhow::Result<()> {
        progress(path.as_str());
        let mut source = self.context.work_root.clone();
        for component in path.components() {
            source.push(component);
        }
        fs::copy(&source, cooked)
            .with_context(|| format!("failed to copy {} to cooked output", source.display()))?;
        Ok(())
    }

    fn can_package(&self, _path: &ProjectPath) -> bool {
        true
    }

    fn do_package(
        &self,
        graph: &PackageDepsgraph,
        entry: &Arc<DataSpecEntry>,
        _fast: bool,
        _cache: &BridgeCache,
        _tool: &BridgeToken,
        progress: &dyn ProgressSink,
        _workers: Option<&dyn WorkerPool>,
    ) -> anyhow::Result<()> {
        let archive_path = archive_path(graph, entry);
        if let Some(parent) = archive_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut archive = fs::File::create(&archive_path)
            .with_context(|| format!("failed to create archive {}", archive_path.display()))?;

        let total = graph.len().max(1);
        for (index, (_, node)) in graph.traverse().enumerate() {
            match node.kind {
                NodeKind::Group => {
                    writeln!(archive, "group {}", node.path)?;
                }
                NodeKind::Data => {
                    let bytes = fs::read(&node.cooked_path).with_context(|| {
                        format!("failed to read cooked input {}", node.cooked_path.display())
                    })?;
                    writeln!(archive, "data {} {}", node.path, bytes.len())?;
                    archive.write_all(&bytes)?;
                    writeln!(archive)?;
                }
            }
            progress.report(node.path.as_str(), (index + 1) as f32 / total as f32);
        }
        archive.sync_all()?;
        Ok(())
    }
}

/// Where the archive for `graph` lands: next to the packaged subtree's
/// cooked mirror, named after it with the backend's package extension.
pub fn archive_path(graph: &PackageDepsgraph, entry: &Arc<DataSpecEntry>) -> std::path::PathBuf {
    let root = &graph.root().cooked_path;
    let mut name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| FLAT_SPEC_NAME.to_string());
    name.push('.');
    name.push_str(entry.pak_ext());
    root.with_file_name(name)
}

/// Register the flat backend.
pub fn register(registry: &mut SpecRegistry) -> Arc<DataSpecEntry> {
    registry.register(DataSpecEntry::new(
        FLAT_SPEC_NAME,
        "pass-through backend: cooked bytes match working bytes",
        "flatpak",
        1,
        Box::new(|_, context, _mode| {
            Box::new(FlatSpec {
                context: context.clone(),
            })
        }),
    ))
}
