//! Shared connection to the content-creation tool.
//!
//! Cooking scene-based resources requires round-trips to an external
//! authoring-tool subprocess that converts scene files into raw cookable
//! buffers. The subprocess speaks a single request/response channel, so at
//! most one exchange may be in flight at a time. [`BridgeToken`] owns the
//! connection behind a mutex and hands out [`BridgeSession`] guards: holding
//! a session is holding the connection, and the lock is released on every
//! exit path when the guard drops, errors included.
//!
//! The subprocess itself is out of scope here; implementors supply a
//! [`ToolProcess`].

#![deny(unsafe_code)]

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::debug;

/// The wire-level operations the pipeline needs from the authoring tool.
///
/// One instance represents one live subprocess connection. Calls are made
/// only through a [`BridgeSession`], which guarantees exclusive access for
/// the duration of each exchange, including multi-line scripted sessions.
pub trait ToolProcess: Send {
    /// Open an existing scene file. Returns false if the tool rejects it.
    fn open_scene(&mut self, path: &Path) -> bool;

    /// Create a new scene file. Returns false if the tool rejects it.
    fn create_scene(&mut self, path: &Path) -> bool;

    /// Convert the given scene into a raw cookable buffer for the target
    /// type and platform.
    fn cook_to_buffer(
        &mut self,
        scene: &Path,
        expected_type: &str,
        platform: &str,
        big_endian: bool,
    ) -> anyhow::Result<Vec<u8>>;

    /// Run a scripted session against the currently open scene.
    fn run_script(&mut self, script: &str) -> anyhow::Result<()>;

    /// Terminate the subprocess.
    fn shutdown(&mut self);
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no authoring tool connected")]
    NotConnected,

    #[error("authoring-tool connection poisoned by a previous panic")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, BridgeError>;

type SharedProcess = Arc<Mutex<Option<Box<dyn ToolProcess>>>>;

/// Shared, cloneable handle to the (at most one) authoring-tool connection.
///
/// Tokens are threaded through the cook hooks so backends can reach the tool
/// without the pipeline caring whether a connection exists yet.
#[derive(Clone, Default)]
pub struct BridgeToken {
    inner: SharedProcess,
}

impl BridgeToken {
    /// A token with no connection; sessions fail until [`connect`] is called.
    ///
    /// [`connect`]: BridgeToken::connect
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(process: Box<dyn ToolProcess>) -> Self {
        let token = Self::new();
        token.connect(process);
        token
    }

    /// Install (or replace) the connection.
    pub fn connect(&self, process: Box<dyn ToolProcess>) {
        let mut slot = match self.inner.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut previous) = slot.replace(process) {
            debug!("replacing live authoring-tool connection");
            previous.shutdown();
        }
    }

    pub fn is_connected(&self) -> bool {
        match self.inner.lock() {
            Ok(slot) => slot.is_some(),
            Err(_) => false,
        }
    }

    /// Acquire exclusive use of the connection for one exchange.
    ///
    /// Blocks while another session is in flight.
    pub fn session(&self) -> Result<BridgeSession<'_>> {
        let guard = self.inner.lock().map_err(|_| BridgeError::Poisoned)?;
        if guard.is_none() {
            return Err(BridgeError::NotConnected);
        }
        Ok(BridgeSession { guard })
    }

    /// Shut down and drop the connection, if any.
    pub fn shutdown(&self) {
        let mut slot = match self.inner.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut process) = slot.take() {
            process.shutdown();
        }
    }
}

/// Exclusive ownership of the authoring-tool connection for one exchange.
///
/// The underlying lock is held for the session's whole lifetime and released
/// when the guard drops.
pub struct BridgeSession<'a> {
    guard: MutexGuard<'a, Option<Box<dyn ToolProcess>>>,
}

impl BridgeSession<'_> {
    // `session()` refuses to construct a guard over an empty slot, and the
    // slot cannot empty while the guard holds the lock.
    fn process(&mut self) -> anyhow::Result<&mut (dyn ToolProcess + 'static)> {
        self.guard
            .as_deref_mut()
            .ok_or_else(|| BridgeError::NotConnected.into())
    }

    pub fn open_scene(&mut self, path: &Path) -> bool {
        self.process().is_ok_and(|p| p.open_scene(path))
    }

    pub fn create_scene(&mut self, path: &Path) -> bool {
        self.process().is_ok_and(|p| p.create_scene(path))
    }

    pub fn cook_to_buffer(
        &mut self,
        scene: &Path,
        expected_type: &str,
        platform: &str,
        big_endian: bool,
    ) -> anyhow::Result<Vec<u8>> {
        self.process()?
            .cook_to_buffer(scene, expected_type, platform, big_endian)
    }

    pub fn run_script(&mut self, script: &str) -> anyhow::Result<()> {
        self.process()?.run_script(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingTool {
        scripts: Vec<String>,
        shutdowns: Arc<AtomicUsize>,
    }

    impl ToolProcess for RecordingTool {
        fn open_scene(&mut self, _path: &Path) -> bool {
            true
        }

        fn create_scene(&mut self, _path: &Path) -> bool {
            false
        }

        fn cook_to_buffer(
            &mut self,
            scene: &Path,
            expected_type: &str,
            _platform: &str,
            _big_endian: bool,
        ) -> anyhow::Result<Vec<u8>> {
            Ok(format!("{expected_type}:{}", scene.display()).into_bytes())
        }

        fn run_script(&mut self, script: &str) -> anyhow::Result<()> {
            self.scripts.push(script.to_string());
            Ok(())
        }

        fn shutdown(&mut self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_session_requires_connection() {
        let token = BridgeToken::new();
        assert!(!token.is_connected());
        assert!(matches!(token.session(), Err(BridgeError::NotConnected)));
    }

    #[test]
    fn test_session_round_trip() {
        let token = BridgeToken::with_process(Box::new(RecordingTool::default()));
        let mut session = token.session().unwrap();
        assert!(session.open_scene(Path::new("scene.blend")));
        let bytes = session
            .cook_to_buffer(Path::new("scene.blend"), "MESH", "generic", false)
            .unwrap();
        assert_eq!(bytes, b"MESH:scene.blend");
    }

    #[test]
    fn test_sessions_are_serialized() {
        let token = BridgeToken::with_process(Box::new(RecordingTool::default()));
        let token2 = token.clone();

        let first = token.session().unwrap();
        let probe = std::thread::spawn(move || {
            // Blocks until the first session drops.
            let mut session = token2.session().unwrap();
            session.run_script("second").unwrap();
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        drop(first);
        probe.join().unwrap();
    }

    #[test]
    fn test_shutdown_reaches_process() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let tool = RecordingTool {
            shutdowns: Arc::clone(&shutdowns),
            ..RecordingTool::default()
        };
        let token = BridgeToken::with_process(Box::new(tool));
        token.shutdown();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert!(!token.is_connected());
    }
}
