pub mod priority_queue;
pub mod types;

pub use priority_queue::{PriorityQueue, QueueConfig};
pub use types::{EnqueueOutcome, Priority, QueueItem};
