//! Remote debug target contract for bpsync.
//!
//! The breakpoint synchronizer (`bpsync-core`) never talks to a wire protocol
//! directly. It drives a [`RemoteThread`]: the proxy of one remote execution
//! thread that can set and remove breakpoints and be interrupted or resumed.
//! Each of those operations is a single asynchronous round trip. How the round
//! trip is encoded on the wire is entirely up to the implementation.
//!
//! The crate also owns the line-number boundary ([`line`]): the remote side is
//! one-based, the client is zero-based.

pub mod line;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

pub use line::{from_remote_line, to_remote_line, Line, RemoteLine, MAX_LINE};
pub use types::{ActorId, BreakpointRequest, Location, SetBreakpointReply};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The round trip completed but the target reported an error.
    #[error("remote target rejected the request ({error}): {message}")]
    Rejected { error: String, message: String },
    #[error("remote thread is not connected")]
    NotConnected,
    #[error("remote connection closed before a reply was received")]
    ConnectionClosed,
    #[error("remote protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    pub fn rejected(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Proxy of a paused or running remote execution thread.
///
/// Implementations must be cheap to share (`Arc<dyn RemoteThread>`); every
/// method takes `&self` so several round trips can be in flight at once.
#[async_trait]
pub trait RemoteThread: Send + Sync {
    /// Asks the target to create a breakpoint at `request.location`.
    async fn set_breakpoint(
        &self,
        request: BreakpointRequest,
    ) -> Result<SetBreakpointReply, RemoteError>;

    /// Removes the breakpoint actor `actor` from the target.
    async fn remove_breakpoint(&self, actor: &ActorId) -> Result<(), RemoteError>;

    /// Pauses the thread.
    async fn interrupt(&self) -> Result<(), RemoteError>;

    /// Resumes the thread.
    async fn resume(&self) -> Result<(), RemoteError>;

    /// Whether the thread is currently paused.
    fn is_paused(&self) -> bool;
}
