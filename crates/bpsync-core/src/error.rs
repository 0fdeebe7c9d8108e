use std::time::Duration;

use bpsync_remote::{Line, RemoteError};
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("no active remote thread")]
    NoActiveThread,
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("no remote breakpoint at {url}:{line}")]
    UnknownBreakpoint { url: String, line: Line },
    #[error("failed to interrupt the remote thread: {0}")]
    Interrupt(RemoteError),
    #[error("remote round trip timed out after {0:?}")]
    Timeout(Duration),
}
