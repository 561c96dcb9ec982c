mod registration;
mod scheduler;

pub use registration::{TickHandle, DEFAULT_FLUSH_DEADLINE};
pub use scheduler::Scheduler;
