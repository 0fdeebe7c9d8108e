use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    ActorId, BreakpointRequest, Location, RemoteError, RemoteLine, RemoteThread,
    SetBreakpointReply,
};

/// A round trip observed by [`MockRemoteThread`], in the order it was issued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
    SetBreakpoint(BreakpointRequest),
    RemoveBreakpoint(ActorId),
    Interrupt,
    Resume,
}

#[derive(Default)]
struct State {
    corrections: HashMap<(String, RemoteLine), RemoteLine>,
    set_errors: HashMap<(String, RemoteLine), RemoteError>,
    remove_errors: HashMap<ActorId, RemoteError>,
    interrupt_error: Option<RemoteError>,
    resume_error: Option<RemoteError>,
    /// Live actors keyed by the location the target placed them at.
    actors: HashMap<(String, RemoteLine), ActorId>,
    next_actor: u32,
    calls: Vec<MockCall>,
}

impl State {
    fn actor_at(&mut self, url: &str, line: RemoteLine) -> ActorId {
        let key = (url.to_string(), line);
        if let Some(actor) = self.actors.get(&key) {
            return actor.clone();
        }
        self.next_actor += 1;
        let actor = ActorId::new(format!("conn0.breakpoint{}", self.next_actor));
        self.actors.insert(key, actor.clone());
        actor
    }
}

/// Deterministic, in-memory remote thread used by tests.
///
/// Behaves like a typical remote target: a breakpoint set at a location that
/// already has an actor gets that same actor back, and line corrections
/// registered with [`MockRemoteThread::correct_line`] move the breakpoint (so
/// several requested lines can collapse onto one actor).
///
/// Replies can be held back with [`MockRemoteThread::hold_replies`] to
/// interleave concurrent round trips; the request is recorded before the reply
/// is held.
pub struct MockRemoteThread {
    state: Mutex<State>,
    paused: AtomicBool,
    gate: watch::Sender<bool>,
}

impl Default for MockRemoteThread {
    fn default() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Mutex::new(State::default()),
            paused: AtomicBool::new(false),
            gate,
        }
    }
}

impl MockRemoteThread {
    /// A running thread.
    pub fn new() -> Self {
        Self::default()
    }

    /// A thread that is already paused.
    pub fn paused() -> Self {
        let thread = Self::default();
        thread.set_paused(true);
        thread
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Makes a request for `requested` (one-based) land on `actual` instead.
    pub fn correct_line(&self, url: &str, requested: RemoteLine, actual: RemoteLine) {
        self.state
            .lock()
            .corrections
            .insert((url.to_string(), requested), actual);
    }

    pub fn reject_set(&self, url: &str, line: RemoteLine, err: RemoteError) {
        self.state
            .lock()
            .set_errors
            .insert((url.to_string(), line), err);
    }

    pub fn reject_remove(&self, actor: &ActorId, err: RemoteError) {
        self.state.lock().remove_errors.insert(actor.clone(), err);
    }

    pub fn fail_interrupt(&self, err: RemoteError) {
        self.state.lock().interrupt_error = Some(err);
    }

    pub fn fail_resume(&self, err: RemoteError) {
        self.state.lock().resume_error = Some(err);
    }

    /// Requests are still recorded, but no reply is produced until
    /// [`MockRemoteThread::release_replies`] is called.
    pub fn hold_replies(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_replies(&self) {
        self.gate.send_replace(true);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn set_requests(&self) -> Vec<BreakpointRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::SetBreakpoint(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn removed_actors(&self) -> Vec<ActorId> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::RemoveBreakpoint(actor) => Some(actor.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn interrupt_count(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Interrupt))
    }

    pub fn resume_count(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Resume))
    }

    /// Actors the target currently holds.
    pub fn live_actors(&self) -> Vec<ActorId> {
        let mut actors: Vec<_> = self.state.lock().actors.values().cloned().collect();
        actors.sort();
        actors
    }

    /// Yields to the runtime until at least `n` round trips have been issued.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.state.lock().calls.len() < n {
            tokio::task::yield_now().await;
        }
    }

    fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| pred(call)).count()
    }

    fn record(&self, call: MockCall) {
        tracing::trace!(target: "bpsync.remote", ?call, "mock round trip issued");
        self.state.lock().calls.push(call);
    }

    async fn replies_open(&self) {
        let mut gate = self.gate.subscribe();
        // The sender lives as long as `self`, so this only errors if the mock is dropped mid-call.
        let _ = gate.wait_for(|open| *open).await;
    }
}

#[async_trait]
impl RemoteThread for MockRemoteThread {
    async fn set_breakpoint(
        &self,
        request: BreakpointRequest,
    ) -> Result<SetBreakpointReply, RemoteError> {
        self.record(MockCall::SetBreakpoint(request.clone()));
        self.replies_open().await;

        let mut state = self.state.lock();
        let Location { url, line } = request.location;
        if let Some(err) = state.set_errors.get(&(url.clone(), line)) {
            return Err(err.clone());
        }
        let actual = state
            .corrections
            .get(&(url.clone(), line))
            .copied()
            .unwrap_or(line);
        let actor = state.actor_at(&url, actual);
        Ok(SetBreakpointReply {
            actor,
            actual_location: (actual != line).then(|| Location::new(url, actual)),
        })
    }

    async fn remove_breakpoint(&self, actor: &ActorId) -> Result<(), RemoteError> {
        self.record(MockCall::RemoveBreakpoint(actor.clone()));
        self.replies_open().await;

        let mut state = self.state.lock();
        if let Some(err) = state.remove_errors.get(actor) {
            return Err(err.clone());
        }
        let before = state.actors.len();
        state.actors.retain(|_, live| live != actor);
        if state.actors.len() == before {
            return Err(RemoteError::rejected(
                "noSuchActor",
                format!("no breakpoint actor {actor}"),
            ));
        }
        Ok(())
    }

    async fn interrupt(&self) -> Result<(), RemoteError> {
        self.record(MockCall::Interrupt);
        self.replies_open().await;

        if let Some(err) = self.state.lock().interrupt_error.clone() {
            return Err(err);
        }
        self.set_paused(true);
        Ok(())
    }

    async fn resume(&self) -> Result<(), RemoteError> {
        self.record(MockCall::Resume);
        self.replies_open().await;

        if let Some(err) = self.state.lock().resume_error.clone() {
            return Err(err);
        }
        self.set_paused(false);
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}
