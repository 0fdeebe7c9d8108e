//! Breakpoint synchronization between a client and a remote debug target.
//!
//! The client keeps its breakpoints in a [`BreakpointStore`]. For every
//! [`DebugContext`] a [`BreakpointSynchronizer`] listens to the store and
//! mirrors each change onto the context's [`bpsync_remote::RemoteThread`]:
//!
//! - Remote breakpoint actors are tracked per context in an [`ActorRegistry`],
//!   so requests that resolve to the same actor never create duplicates.
//! - Line corrections reported by the target are applied to the store and
//!   reported on the outgoing [`BreakpointEvent`]s.
//! - Batches of additions are applied within a single pause of the remote
//!   thread ([`BatchCoordinator`]).

mod batch;
mod context;
mod error;
mod events;
mod registry;
mod store;
mod synchronizer;

pub use crate::batch::{BatchCoordinator, BatchOutcome, ResumeStatus};
pub use crate::context::{ContextId, DebugContext};
pub use crate::error::{SyncError, SyncResult};
pub use crate::events::{BreakpointEvent, BreakpointOutcome, LineCorrection};
pub use crate::registry::{ActorRecord, ActorRegistry};
pub use crate::store::{Breakpoint, BreakpointStore, InMemoryBreakpointStore, StoreEvent};
pub use crate::synchronizer::{BreakpointSynchronizer, RemoveOutcome, SetOutcome};

pub use bpsync_config::{SyncConfig, UnknownRemovalPolicy};
pub use bpsync_remote::{Line, RemoteError, RemoteThread};
