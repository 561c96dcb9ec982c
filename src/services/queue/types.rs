use std::time::Instant;

/// Execution priority. Declaration order doubles as numeric rank (HIGH=0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High = 0,
    Normal = 1,
    Low = 2,
}

#[derive(Debug, Clone)]
pub struct QueueItem<P> {
    pub id: String,
    pub payload: P,
    pub priority: Priority,
    pub created_at: Instant,
    pub attempts: u32,
    pub last_attempt_at: Option<Instant>,
}

impl<P> QueueItem<P> {
    pub fn new(id: impl Into<String>, payload: P, priority: Priority, created_at: Instant) -> Self {
        Self {
            id: id.into(),
            payload,
            priority,
            created_at,
            attempts: 0,
            last_attempt_at: None,
        }
    }
}

/// Outcome of a call to `PriorityQueue::enqueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Added,
    Promoted,
    Dropped,
}
