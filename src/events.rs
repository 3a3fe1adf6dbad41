//! Request events and the bounded event log.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Outcome of one synthetic request. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    /// Unique request id (`req-<n>`)
    pub id: String,
    /// Arrival time in epoch milliseconds
    pub timestamp: Timestamp,
    /// Whether the request was admitted
    pub allowed: bool,
    /// Synthetic client that issued the request
    pub client_id: String,
}

impl RequestEvent {
    pub fn new(
        id: impl Into<String>,
        timestamp: Timestamp,
        allowed: bool,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            allowed,
            client_id: client_id.into(),
        }
    }
}

/// Arrival-ordered log of recent events, dropping the oldest beyond
/// `capacity`.
///
/// Events are appended in non-decreasing timestamp order, so time-bounded
/// counts scan from the newest end and stop at the first older entry.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<RequestEvent>,
    capacity: usize,
}

impl EventLog {
    /// Create an empty log holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append an event, evicting the oldest when full.
    pub fn push(&mut self, event: RequestEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &RequestEvent> {
        self.events.iter()
    }

    /// Oldest retained event.
    pub fn earliest(&self) -> Option<&RequestEvent> {
        self.events.front()
    }

    /// Number of events with `timestamp > after`.
    pub fn count_after(&self, after: Timestamp) -> usize {
        self.events
            .iter()
            .rev()
            .take_while(|e| e.timestamp > after)
            .count()
    }

    /// Number of events with `timestamp >= since`.
    pub fn count_since(&self, since: Timestamp) -> usize {
        self.events
            .iter()
            .rev()
            .take_while(|e| e.timestamp >= since)
            .count()
    }

    /// Number of admitted events.
    pub fn allowed_count(&self) -> usize {
        self.events.iter().filter(|e| e.allowed).count()
    }

    /// The newest `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<RequestEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// Copy of every retained event, oldest first.
    pub fn to_vec(&self) -> Vec<RequestEvent> {
        self.events.iter().cloned().collect()
    }
}
