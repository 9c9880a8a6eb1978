//! Backend registration records and the process-wide registry.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::warn;

use crate::contract::DataSpec;

/// What a constructed backend instance will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    Extract,
    Cook,
    Package,
}

/// Project-side context a backend instance is bound to.
#[derive(Debug, Clone)]
pub struct SpecContext {
    /// Absolute root of the working tree.
    pub work_root: PathBuf,
    /// Absolute root of this backend's cooked-output subtree.
    pub cooked_root: PathBuf,
}

/// Constructor producing a backend instance bound to its entry, a project
/// context, and a tool mode.
pub type SpecFactory =
    Box<dyn Fn(&Arc<DataSpecEntry>, &SpecContext, ToolMode) -> Box<dyn DataSpec> + Send + Sync>;

/// Static registration record for one backend.
///
/// Registered once per backend, process-wide, before any project operation;
/// never mutated afterwards.
pub struct DataSpecEntry {
    name: String,
    desc: String,
    pak_ext: String,
    num_cook_passes: u32,
    factory: SpecFactory,
}

impl DataSpecEntry {
    pub fn new(
        name: impl Into<String>,
        desc: impl Into<String>,
        pak_ext: impl Into<String>,
        num_cook_passes: u32,
        factory: SpecFactory,
    ) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
            pak_ext: pak_ext.into(),
            num_cook_passes: num_cook_passes.max(1),
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Extension of the packaged archive files this backend emits.
    pub fn pak_ext(&self) -> &str {
        &self.pak_ext
    }

    /// How many cook passes the backend needs to resolve forward references.
    pub fn num_cook_passes(&self) -> u32 {
        self.num_cook_passes
    }

    /// Construct a backend instance for `mode`, bound to `context`.
    pub fn instantiate(self: &Arc<Self>, context: &SpecContext, mode: ToolMode) -> Box<dyn DataSpec> {
        (self.factory)(self, context, mode)
    }
}

impl fmt::Debug for DataSpecEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSpecEntry")
            .field("name", &self.name)
            .field("desc", &self.desc)
            .field("pak_ext", &self.pak_ext)
            .field("num_cook_passes", &self.num_cook_passes)
            .finish_non_exhaustive()
    }
}

/// Append-only list of registered backends.
///
/// The process-wide instance is installed once at startup via
/// [`SpecRegistry::install_global`]; tests construct fresh local registries
/// instead, so registration order is always explicit.
#[derive(Debug, Default)]
pub struct SpecRegistry {
    entries: Vec<Arc<DataSpecEntry>>,
}

static GLOBAL: OnceLock<Arc<SpecRegistry>> = OnceLock::new();

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry`, returning its shared handle.
    ///
    /// A second registration under an existing name is ignored: the registry
    /// is append-only and the first registration wins.
    pub fn register(&mut self, entry: DataSpecEntry) -> Arc<DataSpecEntry> {
        if let Some(existing) = self.find(entry.name()) {
            warn!(name = entry.name(), "backend already registered, keeping first registration");
            return existing;
        }
        let entry = Arc::new(entry);
        self.entries.push(Arc::clone(&entry));
        entry
    }

    /// Registered entries in registration order.
    pub fn entries(&self) -> &[Arc<DataSpecEntry>] {
        &self.entries
    }

    /// Look up an entry by display name, case-insensitively.
    pub fn find(&self, name: &str) -> Option<Arc<DataSpecEntry>> {
        self.entries
            .iter()
            .find(|entry| entry.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Install `registry` as the process-wide instance.
    ///
    /// Returns the installed handle; if a registry was already installed the
    /// original is kept and returned.
    pub fn install_global(registry: Arc<SpecRegistry>) -> Arc<SpecRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| registry))
    }

    /// The process-wide registry, if one has been installed.
    pub fn global() -> Option<Arc<SpecRegistry>> {
        GLOBAL.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::tests::NullSpec;

    fn entry(name: &str) -> DataSpecEntry {
        DataSpecEntry::new(
            name,
            format!("{name} backend"),
            "pak",
            1,
            Box::new(|_, _, _| Box::new(NullSpec)),
        )
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut registry = SpecRegistry::new();
        registry.register(entry("alpha"));
        registry.register(entry("beta"));

        let names: Vec<&str> = registry.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["alpha", "beta"]);
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = SpecRegistry::new();
        let first = registry.register(entry("alpha"));
        let second = registry.register(DataSpecEntry::new(
            "alpha",
            "imposter",
            "zip",
            3,
            Box::new(|_, _, _| Box::new(NullSpec)),
        ));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.entries().len(), 1);
        assert_eq!(registry.entries()[0].desc(), "alpha backend");
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let mut registry = SpecRegistry::new();
        registry.register(entry("Gcn"));
        assert!(registry.find("gcn").is_some());
        assert!(registry.find("GCN").is_some());
        assert!(registry.find("wii").is_none());
    }

    #[test]
    fn test_cook_passes_floor_at_one() {
        let entry = DataSpecEntry::new("x", "", "pak", 0, Box::new(|_, _, _| Box::new(NullSpec)));
        assert_eq!(entry.num_cook_passes(), 1);
    }
}
