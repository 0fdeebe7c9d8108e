use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bpsync_remote::RemoteThread;
use parking_lot::RwLock;
use serde::Serialize;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one debugging context (one live execution target).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocates a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

/// A debugging session and the remote thread it currently talks to.
///
/// The thread slot is empty between attach and a successful connection and
/// may be swapped or cleared at any time.
pub struct DebugContext {
    id: ContextId,
    thread: RwLock<Option<Arc<dyn RemoteThread>>>,
}

impl DebugContext {
    pub fn new() -> Self {
        Self {
            id: ContextId::next(),
            thread: RwLock::new(None),
        }
    }

    pub fn with_thread(thread: Arc<dyn RemoteThread>) -> Self {
        let context = Self::new();
        context.set_thread(Some(thread));
        context
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn set_thread(&self, thread: Option<Arc<dyn RemoteThread>>) {
        tracing::debug!(
            target: "bpsync.sync",
            context = %self.id,
            connected = thread.is_some(),
            "remote thread changed"
        );
        *self.thread.write() = thread;
    }

    pub fn active_thread(&self) -> Option<Arc<dyn RemoteThread>> {
        self.thread.read().clone()
    }
}

impl Default for DebugContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DebugContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugContext")
            .field("id", &self.id)
            .field("connected", &self.thread.read().is_some())
            .finish()
    }
}
