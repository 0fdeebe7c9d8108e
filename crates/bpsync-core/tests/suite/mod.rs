// Integration suite for `bpsync-core`, compiled through `tests/harness.rs`.
//
// Every test drives a `BreakpointSynchronizer` against the in-memory store and
// the scripted `MockRemoteThread` from `bpsync-remote`'s `test-support` feature.
mod attach;
mod remove_breakpoint;
mod set_breakpoint;

use std::sync::Arc;
use std::time::Duration;

use bpsync_core::{
    BreakpointEvent, BreakpointStore, BreakpointSynchronizer, DebugContext,
    InMemoryBreakpointStore, SyncConfig,
};
use bpsync_remote::mock::MockRemoteThread;
use bpsync_remote::RemoteThread;
use tokio::sync::broadcast;

pub const URL: &str = "https://example.test/app.js";

pub struct Fixture {
    pub thread: Arc<MockRemoteThread>,
    pub store: Arc<InMemoryBreakpointStore>,
    pub sync: Arc<BreakpointSynchronizer>,
    pub events: broadcast::Receiver<BreakpointEvent>,
}

impl Fixture {
    /// Connected to a running thread.
    pub fn new() -> Self {
        Self::build(MockRemoteThread::new(), SyncConfig::default(), true)
    }

    /// Connected to a thread that is already paused.
    pub fn paused() -> Self {
        Self::build(MockRemoteThread::paused(), SyncConfig::default(), true)
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self::build(MockRemoteThread::new(), config, true)
    }

    /// The context has no active thread.
    pub fn disconnected() -> Self {
        Self::build(MockRemoteThread::new(), SyncConfig::default(), false)
    }

    fn build(thread: MockRemoteThread, config: SyncConfig, connected: bool) -> Self {
        let thread = Arc::new(thread);
        let store = Arc::new(InMemoryBreakpointStore::new());

        let context = Arc::new(DebugContext::new());
        if connected {
            let remote: Arc<dyn RemoteThread> = thread.clone();
            context.set_thread(Some(remote));
        }

        let intent: Arc<dyn BreakpointStore> = store.clone();
        let sync = Arc::new(BreakpointSynchronizer::new(context, intent, config));
        let events = sync.subscribe();

        Self {
            thread,
            store,
            sync,
            events,
        }
    }

    pub async fn next_event(&mut self) -> BreakpointEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for a breakpoint event")
            .expect("breakpoint event channel closed")
    }

    pub fn assert_no_event(&mut self) {
        let next = self.events.try_recv();
        assert!(next.is_err(), "unexpected breakpoint event: {next:?}");
    }
}
