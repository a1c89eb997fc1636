use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::domain::QueryHistoryItem;

pub const HISTORY_CAPACITY: usize = 100;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    Recorded(QueryHistoryItem),
    Cleared,
}

/// Process-wide ring buffer of executed statements, newest first.
///
/// Appended to by both the execution orchestrator and the row-change
/// reconciler; each append and its eviction happen under one lock.
#[derive(Debug)]
pub struct QueryHistory {
    entries: Mutex<VecDeque<QueryHistoryItem>>,
    capacity: usize,
    events: broadcast::Sender<HistoryEvent>,
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl QueryHistory {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueryHistoryItem>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an item; the oldest entry is evicted once at capacity.
    pub fn record(&self, item: QueryHistoryItem) {
        {
            let mut entries = self.lock();
            entries.push_front(item.clone());
            entries.truncate(self.capacity);
        }
        // No subscribers is fine
        let _ = self.events.send(HistoryEvent::Recorded(item));
    }

    /// Snapshot of the history, newest first.
    pub fn entries(&self) -> Vec<QueryHistoryItem> {
        self.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<QueryHistoryItem> {
        self.lock().front().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
        let _ = self.events.send(HistoryEvent::Cleared);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }
}
