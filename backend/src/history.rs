//! Per-run durable history

use std::sync::{Mutex, MutexGuard, PoisonError};
use tle_core::{EventType, HistorySink};

/// Append-only event log of one run
#[derive(Debug, Default)]
pub struct RunHistory {
    events: Mutex<Vec<EventType>>,
}

impl RunHistory {
    /// Copy of the events recorded so far
    pub fn snapshot(&self) -> Vec<EventType> {
        self.events().clone()
    }

    /// Number of events recorded so far
    pub fn len(&self) -> usize {
        self.events().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }

    // A panic while pushing cannot leave the Vec half-written
    fn events(&self) -> MutexGuard<'_, Vec<EventType>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HistorySink for RunHistory {
    fn record(&self, event: EventType) {
        self.events().push(event);
    }
}
