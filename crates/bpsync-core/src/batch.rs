//! Batched breakpoint additions.
//!
//! Most targets only accept breakpoint changes while the thread is paused, so a
//! batch interrupts a running thread once, applies every addition in order and
//! resumes it again afterwards.

use crate::error::{SyncError, SyncResult};
use crate::events::BreakpointOutcome;
use crate::store::Breakpoint;
use crate::synchronizer::BreakpointSynchronizer;

/// Whether the thread was resumed after the batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResumeStatus {
    /// The thread was already paused; it was left that way.
    NotNeeded,
    Resumed,
    /// The batch was applied but the thread may still be paused.
    Failed(SyncError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    /// One result per input breakpoint, in input order.
    pub results: Vec<SyncResult<BreakpointOutcome>>,
    /// Whether the batch had to interrupt the thread.
    pub paused_for_batch: bool,
    pub resume: ResumeStatus,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|result| result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

pub struct BatchCoordinator<'a> {
    sync: &'a BreakpointSynchronizer,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(sync: &'a BreakpointSynchronizer) -> Self {
        Self { sync }
    }

    /// Adds `breakpoints` one at a time, in order.
    ///
    /// Fails without touching any breakpoint when there is no active thread or
    /// when a running thread cannot be interrupted. A rejected or failed
    /// interrupt is reported as [`SyncError::Interrupt`]; an interrupt that gets
    /// no reply within the configured timeout is reported as
    /// [`SyncError::Timeout`]. Individual additions that fail are reported in
    /// [`BatchOutcome::results`] and do not stop the batch.
    pub async fn set_breakpoints(&self, breakpoints: Vec<Breakpoint>) -> SyncResult<BatchOutcome> {
        let thread = self.sync.active_thread("set breakpoints")?;
        let context = self.sync.context().id();

        let paused_for_batch = !thread.is_paused();
        if paused_for_batch {
            tracing::debug!(
                target: "bpsync.batch",
                context = %context,
                count = breakpoints.len(),
                "interrupting thread for breakpoint batch"
            );
            let interrupted = self.sync.round_trip(thread.interrupt()).await;
            if let Err(err) = interrupted {
                let err = match err {
                    SyncError::Remote(err) => SyncError::Interrupt(err),
                    other => other,
                };
                tracing::error!(
                    target: "bpsync.batch",
                    context = %context,
                    error = %err,
                    "failed to interrupt thread; no breakpoints were added"
                );
                return Err(err);
            }
        }

        let mut results = Vec::with_capacity(breakpoints.len());
        for bp in breakpoints {
            results.push(self.sync.on_add_breakpoint(bp).await);
        }

        let resume = if paused_for_batch {
            let resumed = self.sync.round_trip(thread.resume()).await;
            match resumed {
                Ok(()) => ResumeStatus::Resumed,
                Err(err) => {
                    tracing::error!(
                        target: "bpsync.batch",
                        context = %context,
                        error = %err,
                        "failed to resume thread after breakpoint batch"
                    );
                    ResumeStatus::Failed(err)
                }
            }
        } else {
            ResumeStatus::NotNeeded
        };

        let outcome = BatchOutcome {
            results,
            paused_for_batch,
            resume,
        };
        tracing::debug!(
            target: "bpsync.batch",
            context = %context,
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            "breakpoint batch finished"
        );
        Ok(outcome)
    }
}
