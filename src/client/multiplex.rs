use std::collections::{HashMap, HashSet};

use super::{Error, Response};


/// The stored result of a finished request: either the assembled response or
/// the error its wait must resolve to (for example Stderr output).
pub(crate) type Outcome = Result<Response, Error>;


/// Tracks request IDs over the client's single connection.
///
/// FastCGI multiplexes concurrent requests over one socket by tagging every
/// record with a 16-bit request ID. The multiplexer allocates those IDs,
/// remembers which ones are outstanding, and holds finished outcomes until
/// their owner consumes them exactly once.
#[derive(Debug, Default)]
pub(crate) struct Multiplexer {
    /// Next allocation candidate, always in `1..=u16::MAX`.
    counter: u16,
    outstanding: HashSet<u16>,
    completed: HashMap<u16, Outcome>,
}

impl Multiplexer {
    pub(crate) fn new() -> Self {
        Self { counter: 1, ..Self::default() }
    }

    /// Allocates the next free request ID.
    ///
    /// IDs increase monotonically through `1..=65535` and wrap back to 1;
    /// ID 0 is reserved for management records and never issued. Values
    /// still outstanding are skipped so no two in-flight requests share
    /// an ID.
    pub(crate) fn allocate(&mut self) -> Result<u16, Error> {
        for _ in 0..u16::MAX {
            let id = self.counter;
            self.counter = if id == u16::MAX { 1 } else { id + 1 };
            if !self.outstanding.contains(&id) {
                return Ok(id);
            }
        }
        Err(Error::TooManyRequests)
    }

    /// Marks `id` as outstanding once its records have been written.
    pub(crate) fn track(&mut self, id: u16) {
        self.outstanding.insert(id);
    }

    pub(crate) fn is_outstanding(&self, id: u16) -> bool {
        self.outstanding.contains(&id)
    }

    /// Moves `id` from the outstanding set to the completed map.
    pub(crate) fn complete(&mut self, id: u16, outcome: Outcome) {
        self.outstanding.remove(&id);
        self.completed.insert(id, outcome);
    }

    /// Removes and returns the stored outcome for `id`, if it finished.
    pub(crate) fn take_completed(&mut self, id: u16) -> Option<Outcome> {
        self.completed.remove(&id)
    }
}
