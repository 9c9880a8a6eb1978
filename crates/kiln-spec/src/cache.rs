//! Run-scoped mapping from object identifiers back to source paths.

use std::collections::HashMap;
use std::sync::Mutex;

use kiln_path::ProjectPath;

/// Maps the 64-bit identifier a backend assigns to a cooked object back to
/// the working path that produced it.
///
/// Populated during cooking as objects reference each other; read during
/// packaging to translate an embedded reference back into the dependency
/// graph. Cleared and rebuilt per cook invocation; never persisted.
///
/// Writes are expected from one cook pass at a time, serialized through the
/// orchestrator; the internal lock only makes that discipline safe when
/// per-object work runs on a pool.
#[derive(Debug, Default)]
pub struct BridgeCache {
    map: Mutex<HashMap<u64, ProjectPath>>,
}

impl BridgeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, id: u64, path: ProjectPath) {
        if let Ok(mut map) = self.map.lock() {
            map.insert(id, path);
        }
    }

    pub fn lookup(&self, id: u64) -> Option<ProjectPath> {
        self.map.lock().ok().and_then(|map| map.get(&id).cloned())
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.map.lock() {
            map.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.map.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
