//! Per-context index of server-confirmed breakpoint actors.

use std::collections::{BTreeSet, HashMap};

use bpsync_remote::{from_remote_line, ActorId, Line, Location};
use serde::Serialize;

/// A breakpoint actor the remote target confirmed, as tracked by the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActorRecord {
    pub actor: ActorId,
    /// Where the target placed the breakpoint (one-based line).
    pub location: Location,
    /// Client lines that were requested and resolved onto this actor.
    requested_lines: BTreeSet<Line>,
}

impl ActorRecord {
    pub fn new(actor: ActorId, location: Location, requested_line: Line) -> Self {
        Self {
            actor,
            location,
            requested_lines: BTreeSet::from([requested_line]),
        }
    }

    pub fn url(&self) -> &str {
        &self.location.url
    }

    /// The confirmed line, as a client line index.
    pub fn line(&self) -> Line {
        from_remote_line(self.location.line)
    }

    pub fn requested_lines(&self) -> impl Iterator<Item = Line> + '_ {
        self.requested_lines.iter().copied()
    }

    /// Every client line that resolves to this record: the confirmed line plus
    /// all requested lines.
    pub fn lines(&self) -> BTreeSet<Line> {
        let mut lines = self.requested_lines.clone();
        lines.insert(self.line());
        lines
    }
}

/// Dual-indexed registry of [`ActorRecord`]s.
///
/// Records are keyed by actor id, which makes "one record per actor" a
/// property of the data structure. A second index maps `(url, client line)` to
/// the owning actor for every line in [`ActorRecord::lines`], so location
/// lookups accept both the confirmed line and the originally requested ones.
///
/// The registry does no locking of its own.
#[derive(Debug, Default)]
pub struct ActorRegistry {
    by_actor: HashMap<ActorId, ActorRecord>,
    by_location: HashMap<(String, Line), ActorId>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_actor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_actor.is_empty()
    }

    pub fn find(&self, url: &str, line: Line) -> Option<&ActorRecord> {
        let actor = self.by_location.get(&(url.to_string(), line))?;
        self.by_actor.get(actor)
    }

    pub fn remove(&mut self, url: &str, line: Line) -> Option<ActorRecord> {
        let actor = self.by_location.get(&(url.to_string(), line))?.clone();
        self.remove_actor(&actor)
    }

    pub fn remove_actor(&mut self, actor: &ActorId) -> Option<ActorRecord> {
        let record = self.by_actor.remove(actor)?;
        self.unindex(&record);
        tracing::trace!(
            target: "bpsync.registry",
            actor = %record.actor,
            url = record.url(),
            line = record.line(),
            "actor record removed"
        );
        Some(record)
    }

    pub fn exists_by_actor(&self, actor: &ActorId) -> bool {
        self.by_actor.contains_key(actor)
    }

    pub fn get(&self, actor: &ActorId) -> Option<&ActorRecord> {
        self.by_actor.get(actor)
    }

    /// Inserts `record`, replacing (and returning) any record with the same actor id.
    pub fn insert(&mut self, record: ActorRecord) -> Option<ActorRecord> {
        let previous = self.by_actor.remove(&record.actor);
        if let Some(previous) = &previous {
            self.unindex(previous);
        }
        self.index(&record);
        tracing::trace!(
            target: "bpsync.registry",
            actor = %record.actor,
            url = record.url(),
            line = record.line(),
            "actor record inserted"
        );
        self.by_actor.insert(record.actor.clone(), record);
        previous
    }

    /// Inserts `record` unless a record for the same actor already exists.
    pub fn insert_if_absent(&mut self, record: ActorRecord) -> bool {
        if self.exists_by_actor(&record.actor) {
            return false;
        }
        self.insert(record);
        true
    }

    /// Records that `line` resolved onto `actor`.
    pub fn add_requested_line(&mut self, actor: &ActorId, line: Line) -> bool {
        let Some(record) = self.by_actor.get_mut(actor) else {
            return false;
        };
        record.requested_lines.insert(line);
        self.by_location
            .insert((record.location.url.clone(), line), actor.clone());
        true
    }

    /// Drops `line` from the lines that resolve onto `actor`.
    ///
    /// The confirmed line itself is never forgotten; it stays reachable for as
    /// long as the record exists.
    pub fn forget_requested_line(&mut self, actor: &ActorId, line: Line) -> bool {
        let Some(record) = self.by_actor.get_mut(actor) else {
            return false;
        };
        if line == record.line() || !record.requested_lines.remove(&line) {
            return false;
        }
        let key = (record.location.url.clone(), line);
        if self.by_location.get(&key) == Some(actor) {
            self.by_location.remove(&key);
        }
        true
    }

    /// Records for `url`, ordered by confirmed line.
    pub fn records_for_url(&self, url: &str) -> Vec<&ActorRecord> {
        let mut records: Vec<_> = self
            .by_actor
            .values()
            .filter(|record| record.url() == url)
            .collect();
        records.sort_by_key(|record| record.line());
        records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActorRecord> {
        self.by_actor.values()
    }

    pub fn clear(&mut self) {
        self.by_actor.clear();
        self.by_location.clear();
    }

    fn index(&mut self, record: &ActorRecord) {
        for line in record.lines() {
            self.by_location
                .insert((record.location.url.clone(), line), record.actor.clone());
        }
    }

    fn unindex(&mut self, record: &ActorRecord) {
        for line in record.lines() {
            let key = (record.location.url.clone(), line);
            // Another record may have claimed the key since.
            if self.by_location.get(&key) == Some(&record.actor) {
                self.by_location.remove(&key);
            }
        }
    }
}
