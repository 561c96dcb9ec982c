use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One named periodic tick, owned by the scheduler for the lifetime of the
/// service (§4.9, §5 "one goroutine/thread/task has a clear owner that
/// joins it on shutdown").
pub struct TickHandle {
    pub name: &'static str,
    pub cancel: CancellationToken,
    pub join: JoinHandle<()>,
}

impl TickHandle {
    pub fn spawn<F, Fut>(name: &'static str, parent: &CancellationToken, run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let cancel = parent.child_token();
        let join = tokio::spawn(run(cancel.clone()));
        Self { name, cancel, join }
    }
}

pub const DEFAULT_FLUSH_DEADLINE: Duration = Duration::from_secs(10);
