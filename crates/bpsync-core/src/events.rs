//! Outcome events republished to listeners (UI panels and the like).

use bpsync_remote::Line;
use serde::Serialize;

use crate::context::ContextId;
use crate::store::Breakpoint;

/// The remote target placed a breakpoint on a different line than requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCorrection {
    pub original: Line,
    pub corrected: Line,
}

/// Self-contained result of one synchronized operation.
///
/// `breakpoint` already carries the confirmed line; when it differs from the
/// requested one, `correction` records both. The store-owned breakpoint is
/// never annotated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BreakpointOutcome {
    pub context: ContextId,
    pub breakpoint: Breakpoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<LineCorrection>,
}

impl BreakpointOutcome {
    pub fn new(context: ContextId, breakpoint: Breakpoint) -> Self {
        Self {
            context,
            breakpoint,
            correction: None,
        }
    }

    pub fn original_line(&self) -> Line {
        self.correction
            .map(|correction| correction.original)
            .unwrap_or(self.breakpoint.line)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "body", rename_all = "camelCase")]
pub enum BreakpointEvent {
    Added(BreakpointOutcome),
    Removed(BreakpointOutcome),
    Enabled(BreakpointOutcome),
    Disabled(BreakpointOutcome),
    Modified(BreakpointOutcome),
}

impl BreakpointEvent {
    pub fn outcome(&self) -> &BreakpointOutcome {
        match self {
            BreakpointEvent::Added(outcome)
            | BreakpointEvent::Removed(outcome)
            | BreakpointEvent::Enabled(outcome)
            | BreakpointEvent::Disabled(outcome)
            | BreakpointEvent::Modified(outcome) => outcome,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BreakpointEvent::Added(_) => "added",
            BreakpointEvent::Removed(_) => "removed",
            BreakpointEvent::Enabled(_) => "enabled",
            BreakpointEvent::Disabled(_) => "disabled",
            BreakpointEvent::Modified(_) => "modified",
        }
    }
}
