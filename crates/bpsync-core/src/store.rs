//! Client-side breakpoint intent.
//!
//! The store is the authoritative list of what the user asked for. The
//! synchronizer only reads it, listens to its change events, and relocates an
//! entry after the remote target corrected its line.

use std::collections::BTreeMap;

use bpsync_remote::Line;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
    pub url: String,
    /// Zero-based line.
    pub line: Line,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Breakpoint {
    pub fn new(url: impl Into<String>, line: Line) -> Self {
        Self {
            url: url.into(),
            line,
            enabled: true,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_at(&self, url: &str, line: Line) -> bool {
        self.url == url && self.line == line
    }
}

/// Intent change emitted by a [`BreakpointStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    Add(Breakpoint),
    Remove(Breakpoint),
    Enable(Breakpoint),
    Disable(Breakpoint),
    /// Condition or other metadata changed; the location did not.
    Modify(Breakpoint),
}

impl StoreEvent {
    pub fn breakpoint(&self) -> &Breakpoint {
        match self {
            StoreEvent::Add(bp)
            | StoreEvent::Remove(bp)
            | StoreEvent::Enable(bp)
            | StoreEvent::Disable(bp)
            | StoreEvent::Modify(bp) => bp,
        }
    }
}

pub trait BreakpointStore: Send + Sync {
    /// Subscribe to intent changes. Events sent before the call are not replayed.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;

    fn breakpoint(&self, url: &str, line: Line) -> Option<Breakpoint>;

    fn breakpoints(&self) -> Vec<Breakpoint>;

    /// Whether an enabled breakpoint exists at `(url, line)`, not counting `excluding`.
    fn has_any_breakpoint(&self, url: &str, line: Line, excluding: Option<&Breakpoint>) -> bool;

    /// Moves the breakpoint at `(url, from)` to `(url, to)`.
    ///
    /// Returns `false` (and changes nothing) if there is no breakpoint at
    /// `from` or another breakpoint already occupies `to`.
    fn relocate(&self, url: &str, from: Line, to: Line) -> bool;
}

type Key = (String, Line);

/// [`BreakpointStore`] kept in memory, one entry per `(url, line)`.
pub struct InMemoryBreakpointStore {
    breakpoints: Mutex<BTreeMap<Key, Breakpoint>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for InMemoryBreakpointStore {
    fn default() -> Self {
        Self::with_capacity(64)
    }
}

impl InMemoryBreakpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `capacity` bounds how many events a slow subscriber may lag behind.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            breakpoints: Mutex::new(BTreeMap::new()),
            events,
        }
    }

    /// Adds an enabled breakpoint. Returns `None` if one already exists there.
    pub fn add_breakpoint(&self, url: &str, line: Line) -> Option<Breakpoint> {
        self.insert(Breakpoint::new(url, line))
    }

    /// Adds `bp` as-is (it may be disabled or carry a condition).
    pub fn insert(&self, bp: Breakpoint) -> Option<Breakpoint> {
        {
            let mut breakpoints = self.breakpoints.lock();
            let key = (bp.url.clone(), bp.line);
            if breakpoints.contains_key(&key) {
                return None;
            }
            breakpoints.insert(key, bp.clone());
        }
        self.emit(StoreEvent::Add(bp.clone()));
        Some(bp)
    }

    pub fn remove_breakpoint(&self, url: &str, line: Line) -> Option<Breakpoint> {
        let bp = self.breakpoints.lock().remove(&(url.to_string(), line))?;
        self.emit(StoreEvent::Remove(bp.clone()));
        Some(bp)
    }

    pub fn enable_breakpoint(&self, url: &str, line: Line) -> bool {
        self.set_enabled(url, line, true)
    }

    pub fn disable_breakpoint(&self, url: &str, line: Line) -> bool {
        self.set_enabled(url, line, false)
    }

    pub fn set_condition(&self, url: &str, line: Line, condition: Option<String>) -> bool {
        let updated = {
            let mut breakpoints = self.breakpoints.lock();
            let Some(bp) = breakpoints.get_mut(&(url.to_string(), line)) else {
                return false;
            };
            if bp.condition == condition {
                return false;
            }
            bp.condition = condition;
            bp.clone()
        };
        self.emit(StoreEvent::Modify(updated));
        true
    }

    fn set_enabled(&self, url: &str, line: Line, enabled: bool) -> bool {
        let updated = {
            let mut breakpoints = self.breakpoints.lock();
            let Some(bp) = breakpoints.get_mut(&(url.to_string(), line)) else {
                return false;
            };
            if bp.enabled == enabled {
                return false;
            }
            bp.enabled = enabled;
            bp.clone()
        };
        self.emit(if enabled {
            StoreEvent::Enable(updated)
        } else {
            StoreEvent::Disable(updated)
        });
        true
    }

    fn emit(&self, event: StoreEvent) {
        tracing::trace!(target: "bpsync.store", ?event, "store event");
        // No subscribers is fine: nothing is attached yet.
        let _ = self.events.send(event);
    }
}

impl BreakpointStore for InMemoryBreakpointStore {
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn breakpoint(&self, url: &str, line: Line) -> Option<Breakpoint> {
        self.breakpoints
            .lock()
            .get(&(url.to_string(), line))
            .cloned()
    }

    fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.lock().values().cloned().collect()
    }

    fn has_any_breakpoint(&self, url: &str, line: Line, excluding: Option<&Breakpoint>) -> bool {
        self.breakpoints
            .lock()
            .get(&(url.to_string(), line))
            .is_some_and(|bp| {
                bp.enabled && !excluding.is_some_and(|excluded| excluded.is_at(&bp.url, bp.line))
            })
    }

    fn relocate(&self, url: &str, from: Line, to: Line) -> bool {
        if from == to {
            return self.breakpoint(url, from).is_some();
        }
        let mut breakpoints = self.breakpoints.lock();
        let to_key = (url.to_string(), to);
        if breakpoints.contains_key(&to_key) {
            return false;
        }
        let Some(mut bp) = breakpoints.remove(&(url.to_string(), from)) else {
            return false;
        };
        bp.line = to;
        breakpoints.insert(to_key, bp);
        true
    }
}
