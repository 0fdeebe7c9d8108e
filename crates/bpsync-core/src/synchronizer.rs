use std::future::Future;
use std::sync::Arc;

use bpsync_config::{SyncConfig, UnknownRemovalPolicy};
use bpsync_remote::{
    to_remote_line, BreakpointRequest, Line, RemoteError, RemoteThread, SetBreakpointReply,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchCoordinator, BatchOutcome};
use crate::context::DebugContext;
use crate::error::{SyncError, SyncResult};
use crate::events::{BreakpointEvent, BreakpointOutcome, LineCorrection};
use crate::registry::{ActorRecord, ActorRegistry};
use crate::store::{Breakpoint, BreakpointStore, StoreEvent};

/// Result of [`BreakpointSynchronizer::set_breakpoint`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetOutcome {
    /// `None` when an existing actor was reused and no round trip was issued.
    pub reply: Option<SetBreakpointReply>,
    pub record: ActorRecord,
}

impl SetOutcome {
    pub fn reused(&self) -> bool {
        self.reply.is_none()
    }
}

/// Result of [`BreakpointSynchronizer::remove_breakpoint`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The remote actor was removed.
    Removed(ActorRecord),
    /// Another client breakpoint still needs the remote actor; nothing was sent.
    StillReferenced,
    /// No actor was tracked for the location and the policy says to ignore that.
    NotTracked,
}

struct Listener {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Keeps the remote target's breakpoints in line with a [`BreakpointStore`]
/// for one [`DebugContext`].
///
/// Every public operation completes with an explicit result, including the
/// failure branches; failures are also reported through `tracing`. Outcome
/// events are published on a broadcast channel, one per successful operation
/// (see [`BreakpointSynchronizer::subscribe`]).
///
/// Registry state is only touched between round trips and the lock is never
/// held across an `.await`, so concurrent operations interleave safely. Store
/// events delivered through [`BreakpointSynchronizer::attach`] are handled
/// strictly one after another, in the order the store sent them.
pub struct BreakpointSynchronizer {
    context: Arc<DebugContext>,
    store: Arc<dyn BreakpointStore>,
    registry: Mutex<ActorRegistry>,
    events: broadcast::Sender<BreakpointEvent>,
    config: SyncConfig,
    listener: Mutex<Option<Listener>>,
}

impl BreakpointSynchronizer {
    pub fn new(
        context: Arc<DebugContext>,
        store: Arc<dyn BreakpointStore>,
        config: SyncConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_size.max(1));
        Self {
            context,
            store,
            registry: Mutex::new(ActorRegistry::new()),
            events,
            config,
            listener: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<DebugContext> {
        &self.context
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Subscribe to outcome events.
    pub fn subscribe(&self) -> broadcast::Receiver<BreakpointEvent> {
        self.events.subscribe()
    }

    /// The actor record that `(url, line)` resolves to, if any.
    pub fn actor_record(&self, url: &str, line: Line) -> Option<ActorRecord> {
        self.registry.lock().find(url, line).cloned()
    }

    pub fn actor_records(&self) -> Vec<ActorRecord> {
        let mut records: Vec<_> = self.registry.lock().iter().cloned().collect();
        records.sort_by(|a, b| (a.url(), a.line()).cmp(&(b.url(), b.line())));
        records
    }

    // Store listener

    /// Start listening to store events. Must be called from within a tokio runtime.
    ///
    /// Returns `false` if already attached.
    pub fn attach(self: &Arc<Self>) -> bool {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            tracing::debug!(
                target: "bpsync.sync",
                context = %self.context.id(),
                "already attached to breakpoint store"
            );
            return false;
        }

        // Subscribe before spawning so no event sent after `attach` returns is missed.
        let events = self.store.subscribe();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).listen(events, cancel.clone()));
        *listener = Some(Listener { cancel, task });

        tracing::info!(
            target: "bpsync.sync",
            context = %self.context.id(),
            "attached to breakpoint store"
        );
        true
    }

    /// Stop listening and wait for the event being handled, if any, to finish.
    ///
    /// Returns `false` if not attached.
    pub async fn detach(&self) -> bool {
        let listener = self.listener.lock().take();
        let Some(Listener { cancel, task }) = listener else {
            return false;
        };

        cancel.cancel();
        if let Err(err) = task.await {
            self.log_join_error(err);
        }

        tracing::info!(
            target: "bpsync.sync",
            context = %self.context.id(),
            "detached from breakpoint store"
        );
        true
    }

    pub fn is_attached(&self) -> bool {
        self.listener.lock().is_some()
    }

    async fn listen(
        self: Arc<Self>,
        mut events: broadcast::Receiver<StoreEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(event) => {
                    tracing::trace!(
                        target: "bpsync.sync",
                        context = %self.context.id(),
                        url = %event.breakpoint().url,
                        line = event.breakpoint().line,
                        "store event received"
                    );
                    // Events are handled one at a time, in arrival order. The handler runs
                    // on its own task so a panic does not take the listener down.
                    let this = Arc::clone(&self);
                    let handler = tokio::spawn(async move {
                        let _ = this.handle_store_event(event).await;
                    });
                    if let Err(err) = handler.await {
                        self.log_join_error(err);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        target: "bpsync.sync",
                        context = %self.context.id(),
                        skipped,
                        "store listener lagged; events were dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    fn log_join_error(&self, err: JoinError) {
        if err.is_panic() {
            tracing::error!(
                target: "bpsync.sync",
                context = %self.context.id(),
                error = %err,
                "breakpoint event handler panicked"
            );
        }
    }

    /// Route one store event to its handler.
    pub async fn handle_store_event(&self, event: StoreEvent) -> SyncResult<BreakpointOutcome> {
        match event {
            StoreEvent::Add(bp) => self.on_add_breakpoint(bp).await,
            StoreEvent::Remove(bp) => self.on_remove_breakpoint(bp).await,
            StoreEvent::Enable(bp) => self.on_enable_breakpoint(bp).await,
            StoreEvent::Disable(bp) => self.on_disable_breakpoint(bp).await,
            StoreEvent::Modify(bp) => Ok(self.on_modify_breakpoint(bp)),
        }
    }

    // Store event handlers

    pub async fn on_add_breakpoint(&self, bp: Breakpoint) -> SyncResult<BreakpointOutcome> {
        let set = self.set_breakpoint(&bp.url, bp.line).await?;
        let outcome = self.confirmed_outcome(bp, &set.record);
        self.publish(BreakpointEvent::Added(outcome.clone()));
        Ok(outcome)
    }

    pub async fn on_remove_breakpoint(&self, bp: Breakpoint) -> SyncResult<BreakpointOutcome> {
        self.remove_excluding(&bp.url, bp.line, Some(&bp)).await?;
        let outcome = BreakpointOutcome::new(self.context.id(), bp);
        self.publish(BreakpointEvent::Removed(outcome.clone()));
        Ok(outcome)
    }

    pub async fn on_enable_breakpoint(&self, bp: Breakpoint) -> SyncResult<BreakpointOutcome> {
        let set = self.enable_breakpoint(&bp.url, bp.line).await?;
        let outcome = self.confirmed_outcome(bp, &set.record);
        self.publish(BreakpointEvent::Enabled(outcome.clone()));
        Ok(outcome)
    }

    pub async fn on_disable_breakpoint(&self, bp: Breakpoint) -> SyncResult<BreakpointOutcome> {
        self.remove_excluding(&bp.url, bp.line, Some(&bp)).await?;
        let outcome = BreakpointOutcome::new(self.context.id(), bp);
        self.publish(BreakpointEvent::Disabled(outcome.clone()));
        Ok(outcome)
    }

    /// Condition and metadata edits need no round trip; they are only republished.
    pub fn on_modify_breakpoint(&self, bp: Breakpoint) -> BreakpointOutcome {
        let outcome = BreakpointOutcome::new(self.context.id(), bp);
        self.publish(BreakpointEvent::Modified(outcome.clone()));
        outcome
    }

    // Remote operations

    /// Make sure the remote target has a breakpoint for client line `line`.
    pub async fn set_breakpoint(&self, url: &str, line: Line) -> SyncResult<SetOutcome> {
        let thread = self.active_thread("set breakpoint")?;

        let existing = self.registry.lock().find(url, line).cloned();
        if let Some(record) = existing {
            tracing::debug!(
                target: "bpsync.sync",
                context = %self.context.id(),
                url,
                line,
                actor = %record.actor,
                "remote breakpoint already exists"
            );
            return Ok(SetOutcome {
                reply: None,
                record,
            });
        }

        let request = BreakpointRequest::new(url, to_remote_line(line));
        tracing::debug!(
            target: "bpsync.sync",
            context = %self.context.id(),
            url,
            line,
            "setting remote breakpoint"
        );
        let reply = self
            .round_trip(thread.set_breakpoint(request.clone()))
            .await
            .inspect_err(|err| {
                tracing::warn!(
                    target: "bpsync.sync",
                    context = %self.context.id(),
                    url,
                    line,
                    error = %err,
                    "failed to set remote breakpoint"
                );
            })?;

        let mut location = request.location;
        if let Some(actual) = &reply.actual_location {
            if actual.line != location.line {
                tracing::debug!(
                    target: "bpsync.sync",
                    context = %self.context.id(),
                    url,
                    requested = %location.line,
                    actual = %actual.line,
                    "remote target corrected breakpoint line"
                );
                // Keyed by the corrected line so later removals find it.
                location.line = actual.line;
            }
        }

        // Checked at reply time: a concurrent request may already have produced this actor.
        let record = ActorRecord::new(reply.actor.clone(), location, line);
        let record = {
            let mut registry = self.registry.lock();
            if registry.insert_if_absent(record.clone()) {
                record
            } else {
                registry.add_requested_line(&record.actor, line);
                registry.get(&record.actor).cloned().unwrap_or(record)
            }
        };

        Ok(SetOutcome {
            reply: Some(reply),
            record,
        })
    }

    /// Remove the remote breakpoint for client line `line`, unless some enabled
    /// client breakpoint still needs it.
    pub async fn remove_breakpoint(&self, url: &str, line: Line) -> SyncResult<RemoveOutcome> {
        self.remove_excluding(url, line, None).await
    }

    /// Enabling a breakpoint means adding it to the remote target.
    pub async fn enable_breakpoint(&self, url: &str, line: Line) -> SyncResult<SetOutcome> {
        self.set_breakpoint(url, line).await
    }

    /// Disabling a breakpoint means removing it from the remote target.
    pub async fn disable_breakpoint(&self, url: &str, line: Line) -> SyncResult<RemoveOutcome> {
        self.remove_breakpoint(url, line).await
    }

    async fn remove_excluding(
        &self,
        url: &str,
        line: Line,
        excluding: Option<&Breakpoint>,
    ) -> SyncResult<RemoveOutcome> {
        let thread = self.active_thread("remove breakpoint")?;

        if self.store.has_any_breakpoint(url, line, excluding) {
            tracing::debug!(
                target: "bpsync.sync",
                context = %self.context.id(),
                url,
                line,
                "client breakpoint still present; keeping remote breakpoint"
            );
            return Ok(RemoveOutcome::StillReferenced);
        }

        let detached = {
            let mut registry = self.registry.lock();
            match registry.find(url, line) {
                None => None,
                Some(record) => {
                    let actor = record.actor.clone();
                    let shared = record.lines().into_iter().any(|other| {
                        other != line && self.store.has_any_breakpoint(url, other, excluding)
                    });
                    if shared {
                        registry.forget_requested_line(&actor, line);
                        tracing::debug!(
                            target: "bpsync.sync",
                            context = %self.context.id(),
                            url,
                            line,
                            actor = %actor,
                            "remote breakpoint shared with another client breakpoint; keeping it"
                        );
                        return Ok(RemoveOutcome::StillReferenced);
                    }
                    registry.remove_actor(&actor)
                }
            }
        };

        let Some(record) = detached else {
            return match self.config.unknown_removal {
                UnknownRemovalPolicy::Error => {
                    tracing::error!(
                        target: "bpsync.sync",
                        context = %self.context.id(),
                        url,
                        line,
                        "removing a breakpoint that has no remote actor"
                    );
                    Err(SyncError::UnknownBreakpoint {
                        url: url.to_string(),
                        line,
                    })
                }
                UnknownRemovalPolicy::Ignore => {
                    tracing::debug!(
                        target: "bpsync.sync",
                        context = %self.context.id(),
                        url,
                        line,
                        "no remote actor to remove"
                    );
                    Ok(RemoveOutcome::NotTracked)
                }
            };
        };

        tracing::debug!(
            target: "bpsync.sync",
            context = %self.context.id(),
            url,
            line,
            actor = %record.actor,
            "removing remote breakpoint"
        );
        let result = self.round_trip(thread.remove_breakpoint(&record.actor)).await;
        match result {
            Ok(()) => Ok(RemoveOutcome::Removed(record)),
            Err(err) => {
                tracing::warn!(
                    target: "bpsync.sync",
                    context = %self.context.id(),
                    url,
                    line,
                    actor = %record.actor,
                    error = %err,
                    "failed to remove remote breakpoint; keeping actor record"
                );
                // The actor is presumably still alive on the target.
                self.registry.lock().insert_if_absent(record);
                Err(err)
            }
        }
    }

    // Batches

    /// Add `breakpoints` in order within one pause/resume cycle of the remote thread.
    ///
    /// See [`BatchCoordinator::set_breakpoints`] for how an interrupt failure or
    /// timeout is reported.
    pub async fn set_breakpoints(&self, breakpoints: Vec<Breakpoint>) -> SyncResult<BatchOutcome> {
        BatchCoordinator::new(self).set_breakpoints(breakpoints).await
    }

    /// Push every enabled breakpoint of the store to the remote target, e.g.
    /// right after the context connected.
    pub async fn restore_breakpoints(&self) -> SyncResult<BatchOutcome> {
        let breakpoints = self
            .store
            .breakpoints()
            .into_iter()
            .filter(|bp| bp.enabled)
            .collect();
        self.set_breakpoints(breakpoints).await
    }

    // Queries

    pub fn is_breakpoint_disabled(&self, url: &str, line: Line) -> bool {
        self.store
            .breakpoint(url, line)
            .is_some_and(|bp| !bp.enabled)
    }

    pub fn breakpoint_condition(&self, url: &str, line: Line) -> Option<String> {
        self.store.breakpoint(url, line)?.condition
    }

    // Helpers

    pub(crate) fn active_thread(&self, operation: &'static str) -> SyncResult<Arc<dyn RemoteThread>> {
        self.context.active_thread().ok_or_else(|| {
            tracing::error!(
                target: "bpsync.sync",
                context = %self.context.id(),
                operation,
                "no active remote thread"
            );
            SyncError::NoActiveThread
        })
    }

    /// Await one remote round trip, bounded by the configured reply timeout.
    pub(crate) async fn round_trip<T>(
        &self,
        reply: impl Future<Output = Result<T, RemoteError>>,
    ) -> SyncResult<T> {
        let Some(limit) = self.config.reply_timeout() else {
            return Ok(reply.await?);
        };
        match tokio::time::timeout(limit, reply).await {
            Ok(result) => Ok(result?),
            Err(_elapsed) => Err(SyncError::Timeout(limit)),
        }
    }

    /// Build the outcome for a breakpoint the target confirmed at `record`'s line.
    fn confirmed_outcome(&self, mut bp: Breakpoint, record: &ActorRecord) -> BreakpointOutcome {
        let confirmed = record.line();
        let mut correction = None;
        if confirmed != bp.line {
            if !self.store.relocate(&bp.url, bp.line, confirmed) {
                tracing::debug!(
                    target: "bpsync.sync",
                    context = %self.context.id(),
                    url = %bp.url,
                    from = bp.line,
                    to = confirmed,
                    "store kept breakpoint at its requested line"
                );
            }
            correction = Some(LineCorrection {
                original: bp.line,
                corrected: confirmed,
            });
            bp.line = confirmed;
        }
        BreakpointOutcome {
            context: self.context.id(),
            breakpoint: bp,
            correction,
        }
    }

    fn publish(&self, event: BreakpointEvent) {
        let outcome = event.outcome();
        tracing::debug!(
            target: "bpsync.sync",
            context = %outcome.context,
            kind = event.kind(),
            url = %outcome.breakpoint.url,
            line = outcome.breakpoint.line,
            "publishing breakpoint event"
        );
        // Nobody listening is not an error.
        let _ = self.events.send(event);
    }
}
