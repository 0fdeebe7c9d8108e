use std::fmt;

use serde::{Deserialize, Serialize};

use crate::line::RemoteLine;

/// Opaque identity token of a server-side breakpoint actor.
///
/// Several requested locations may resolve onto the same actor (for example
/// every non-executable line above an executable one), so the id is the only
/// reliable way to tell two remote breakpoints apart.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A source location in the remote convention (one-based line).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub url: String,
    pub line: RemoteLine,
}

impl Location {
    pub fn new(url: impl Into<String>, line: RemoteLine) -> Self {
        Self {
            url: url.into(),
            line,
        }
    }
}

/// Payload of a "set breakpoint" round trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointRequest {
    pub location: Location,
}

impl BreakpointRequest {
    pub fn new(url: impl Into<String>, line: RemoteLine) -> Self {
        Self {
            location: Location::new(url, line),
        }
    }
}

/// Reply to a successful "set breakpoint" round trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBreakpointReply {
    pub actor: ActorId,
    /// Present when the target placed the breakpoint somewhere other than the
    /// requested location (line correction).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_location: Option<Location>,
}
