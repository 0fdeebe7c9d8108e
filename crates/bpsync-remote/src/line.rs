//! Line-number conventions at the client/remote boundary.
//!
//! Everything on the client side (breakpoint store, actor registry lookups,
//! outcome events) uses zero-based [`Line`] indexes. The remote target speaks
//! one-based [`RemoteLine`] numbers. Every value crossing the boundary goes
//! through [`to_remote_line`] or [`from_remote_line`]; there is no other place
//! where the offset is applied.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based line index used by the client.
pub type Line = u32;

/// Largest client line that has a one-based counterpart.
///
/// [`to_remote_line`] saturates above it, so only lines up to `MAX_LINE`
/// survive a round trip through [`from_remote_line`].
pub const MAX_LINE: Line = u32::MAX - 1;

/// One-based line number as understood by the remote target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteLine(u32);

impl RemoteLine {
    /// Wraps a raw one-based line reported by the remote target.
    ///
    /// `0` is not a valid one-based line; it is clamped to `1` so that the
    /// conversion back to a client [`Line`] never underflows.
    pub fn new(raw: u32) -> Self {
        Self(raw.max(1))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RemoteLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Converts a client line index to the remote one-based convention.
///
/// Lines above [`MAX_LINE`] are out of range and map to the last remote line.
pub fn to_remote_line(line: Line) -> RemoteLine {
    RemoteLine(line.saturating_add(1))
}

/// Converts a remote one-based line back to the client line index.
pub fn from_remote_line(line: RemoteLine) -> Line {
    line.0.saturating_sub(1)
}
