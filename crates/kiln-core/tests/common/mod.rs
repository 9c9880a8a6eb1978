//! Shared fixtures: an in-repo test backend exercising the full contract.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_bridge::{BridgeToken, ToolProcess};
use kiln_core::Project;
use kiln_path::{ProjectPath, ProjectRootPath};
use kiln_spec::{
    BridgeCache, DataEndianness, DataPlatform, DataSink, DataSpec, DataSpecEntry, DepCollector,
    FourCc, NodeKind, PackageDepsgraph, ProgressSink, SourceObject, SpecContext, SpecRegistry,
    WorkerPool,
};
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub project: Project,
}

/// Fresh project over a fresh registry, with `enable` backends enabled.
pub fn fixture(register: impl FnOnce(&mut SpecRegistry), enable: &[&str]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let mut registry = SpecRegistry::new();
    register(&mut registry);
    let mut project =
        Project::open(ProjectRootPath::new(dir.path()), Arc::new(registry)).unwrap();
    if !enable.is_empty() {
        project.enable_data_specs(enable).unwrap();
    }
    Fixture { dir, project }
}

pub fn write_file(dir: &Path, rel: &str, contents: &str) -> ProjectPath {
    let abs = dir.join(rel);
    fs::create_dir_all(abs.parent().unwrap()).unwrap();
    fs::write(&abs, contents).unwrap();
    ProjectPath::new(rel).unwrap()
}

pub fn path(rel: &str) -> ProjectPath {
    ProjectPath::new(rel).unwrap()
}

/// Deterministic 64-bit object id, as a backend would derive from type+path.
pub fn oid(path: &ProjectPath) -> u64 {
    path.as_str()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
        })
}

/// Working-file object for [`MeshSpec`]: plain text, with `@dep <path>`
/// lines declaring direct dependencies.
pub struct MeshObject {
    work_root: PathBuf,
    path: ProjectPath,
    contents: String,
}

impl MeshObject {
    fn load(work_root: &Path, path: &ProjectPath) -> anyhow::Result<Self> {
        let abs = join_rel(work_root, path);
        let contents = fs::read_to_string(&abs)?;
        Ok(Self {
            work_root: work_root.to_path_buf(),
            path: path.clone(),
            contents,
        })
    }
}

impl SourceObject for MeshObject {
    fn path(&self) -> &ProjectPath {
        &self.path
    }

    fn type_tag(&self) -> FourCc {
        FourCc::new(b"MESH")
    }

    fn cook_object(
        &self,
        sink: &mut DataSink<'_>,
        _endianness: DataEndianness,
        _platform: DataPlatform,
    ) -> bool {
        if self.contents.starts_with("FAIL") {
            return false;
        }
        if self.contents.starts_with("INTERRUPT") {
            // Simulates an operator Ctrl-C landing mid-run.
            kiln_core::request_interrupt();
        }
        sink(b"COOKED:");
        for line in self.contents.lines() {
            if !line.starts_with("@dep ") {
                sink(line.as_bytes());
                sink(b"\n");
            }
        }
        true
    }

    fn gather_deps(&self, collect: &mut DepCollector<'_>) {
        for line in self.contents.lines() {
            if let Some(raw) = line.strip_prefix("@dep ") {
                let dep = ProjectPath::new(raw.trim()).unwrap();
                let object = MeshObject::load(&self.work_root, &dep).unwrap();
                collect(Arc::new(object));
            }
        }
    }
}

/// Single-pass backend claiming `.mesh` files, using the default cook path
/// (load object, stream chunks) and packaging via a plain manifest archive.
pub struct MeshSpec {
    context: SpecContext,
    redirect: Option<Arc<DataSpecEntry>>,
}

impl DataSpec for MeshSpec {
    fn can_cook(&self, path: &ProjectPath, _tool: &BridgeToken, _pass: i32) -> bool {
        matches!(path.extension(), Some("mesh") | Some("tex"))
    }

    fn override_data_spec(
        &self,
        path: &ProjectPath,
        current: &Arc<DataSpecEntry>,
        _tool: &BridgeToken,
    ) -> Arc<DataSpecEntry> {
        match (&self.redirect, path.extension()) {
            (Some(target), Some("tex")) => Arc::clone(target),
            _ => Arc::clone(current),
        }
    }

    fn load_object(&self, path: &ProjectPath) -> anyhow::Result<Arc<dyn SourceObject>> {
        Ok(Arc::new(MeshObject::load(&self.context.work_root, path)?))
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
        let mut manifest = String::new();
        let total = graph.len().max(1);
        for (index, (_, node)) in graph.traverse().enumerate() {
            match node.kind {
                NodeKind::Group => manifest.push_str(&format!("G {}\n", node.path)),
                NodeKind::Data => manifest.push_str(&format!("D {}\n", node.path)),
            }
            progress.report(node.path.as_str(), (index + 1) as f32 / total as f32);
        }
        fs::write(archive_path(graph, entry), manifest)?;
        Ok(())
    }
}

/// Where [`MeshSpec::do_package`] writes its manifest archive.
pub fn archive_path(graph: &PackageDepsgraph, entry: &Arc<DataSpecEntry>) -> PathBuf {
    let root = &graph.root().cooked_path;
    let mut name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    name.push('.');
    name.push_str(entry.pak_ext());
    root.with_file_name(name)
}

pub fn register_mesh(registry: &mut SpecRegistry) -> Arc<DataSpecEntry> {
    registry.register(DataSpecEntry::new(
        "mesh",
        "mesh cooking backend",
        "pak",
        1,
        Box::new(|_, context, _mode| {
            Box::new(MeshSpec {
                context: context.clone(),
                redirect: None,
            })
        }),
    ))
}

/// Register `mesh` with a content-inspection redirect of `.tex` paths to a
/// `tex` backend.
pub fn register_mesh_with_tex_redirect(registry: &mut SpecRegistry) {
    let tex = registry.register(DataSpecEntry::new(
        "tex",
        "texture backend, reached only via redirect",
        "pak",
        1,
        Box::new(|_, _context, _mode| Box::new(TexSpec)),
    ));
    registry.register(DataSpecEntry::new(
        "mesh",
        "mesh cooking backend",
        "pak",
        1,
        Box::new(move |_, context, _mode| {
            Box::new(MeshSpec {
                context: context.clone(),
                redirect: Some(Arc::clone(&tex)),
            })
        }),
    ));
}

/// Redirect target: never claims paths itself.
pub struct TexSpec;

impl DataSpec for TexSpec {
    fn do_cook(
        &self,
        _path: &ProjectPath,
        cooked: &Path,
        _fast: bool,
        _cache: &BridgeCache,
        _tool: &BridgeToken,
        _progress: &dyn Fn(&str),
    ) -> anyhow::Result<()> {
        fs::write(cooked, b"TEXTURE")?;
        Ok(())
    }
}

/// Backend claiming every path, for precedence tests.
pub struct GreedySpec;

impl DataSpec for GreedySpec {
    fn can_cook(&self, _path: &ProjectPath, _tool: &BridgeToken, _pass: i32) -> bool {
        true
    }

    fn do_cook(
        &self,
        _path: &ProjectPath,
        cooked: &Path,
        _fast: bool,
        _cache: &BridgeCache,
        _tool: &BridgeToken,
        _progress: &dyn Fn(&str),
    ) -> anyhow::Result<()> {
        fs::write(cooked, b"GREEDY")?;
        Ok(())
    }
}

pub fn register_greedy(registry: &mut SpecRegistry) {
    registry.register(DataSpecEntry::new(
        "greedy",
        "claims everything",
        "pak",
        1,
        Box::new(|_, _context, _mode| Box::new(GreedySpec)),
    ));
}

/// Two-pass backend claiming `.obj` files. `@ref <path>` lines embed a
/// reference to another object: unresolved references cook as placeholders
/// and resolve once the target has a bridge-cache id.
pub struct RefSpec {
    context: SpecContext,
}

impl DataSpec for RefSpec {
    fn can_cook(&self, path: &ProjectPath, _tool: &BridgeToken, _pass: i32) -> bool {
        path.extension() == Some("obj")
    }

    fn do_cook(
        &self,
        path: &ProjectPath,
        cooked: &Path,
        _fast: bool,
        cache: &BridgeCache,
        _tool: &BridgeToken,
        _progress: &dyn Fn(&str),
    ) -> anyhow::Result<()> {
        let contents = fs::read_to_string(join_rel(&self.context.work_root, path))?;
        let mut out = String::new();
        for line in contents.lines() {
            match line.strip_prefix("@ref ") {
                Some(raw) => {
                    let target = ProjectPath::new(raw.trim())?;
                    match cache.lookup(oid(&target)) {
                        Some(resolved) => out.push_str(&format!("ref={resolved}\n")),
                        None => out.push_str("ref=PLACEHOLDER\n"),
                    }
                }
                None => {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        cache.add(oid(path), path.clone());
        fs::write(cooked, out)?;
        Ok(())
    }
}

pub fn register_refs(registry: &mut SpecRegistry) {
    registry.register(DataSpecEntry::new(
        "refs",
        "two-pass reference-resolving backend",
        "pak",
        2,
        Box::new(|_, context, _mode| {
            Box::new(RefSpec {
                context: context.clone(),
            })
        }),
    ));
}

/// Stand-in for the content-creation tool subprocess.
pub struct SceneTool;

impl ToolProcess for SceneTool {
    fn open_scene(&mut self, path: &Path) -> bool {
        path.exists()
    }

    fn create_scene(&mut self, _path: &Path) -> bool {
        true
    }

    fn cook_to_buffer(
        &mut self,
        scene: &Path,
        expected_type: &str,
        _platform: &str,
        _big_endian: bool,
    ) -> anyhow::Result<Vec<u8>> {
        let mut buffer = format!("{expected_type}|").into_bytes();
        buffer.extend(fs::read(scene)?);
        Ok(buffer)
    }

    fn run_script(&mut self, _script: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) {}
}

/// Backend cooking `.blend` scenes through the authoring-tool bridge.
pub struct SceneSpec {
    context: SpecContext,
}

impl DataSpec for SceneSpec {
    fn can_cook(&self, path: &ProjectPath, _tool: &BridgeToken, _pass: i32) -> bool {
        path.extension() == Some("blend")
    }

    fn do_cook(
        &self,
        path: &ProjectPath,
        cooked: &Path,
        _fast: bool,
        _cache: &BridgeCache,
        tool: &BridgeToken,
        _progress: &dyn Fn(&str),
    ) -> anyhow::Result<()> {
        let scene = join_rel(&self.context.work_root, path);
        let mut session = tool.session()?;
        let bytes = session.cook_to_buffer(&scene, "SCNE", "generic", false)?;
        fs::write(cooked, bytes)?;
        Ok(())
    }
}

pub fn register_scene(registry: &mut SpecRegistry) {
    registry.register(DataSpecEntry::new(
        "scene",
        "cooks authored scenes via the tool bridge",
        "pak",
        1,
        Box::new(|_, context, _mode| {
            Box::new(SceneSpec {
                context: context.clone(),
            })
        }),
    ));
}

fn join_rel(root: &Path, path: &ProjectPath) -> PathBuf {
    let mut abs = root.to_path_buf();
    for component in path.components() {
        abs.push(component);
    }
    abs
}
