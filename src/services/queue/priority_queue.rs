use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use super::types::{EnqueueOutcome, Priority, QueueItem};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_concurrent: usize,
    pub item_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            item_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Bounded, prioritized, retrying, timeout-guarded task executor (§4.3).
pub struct PriorityQueue<P: Clone + Send + Sync + 'static> {
    items: Mutex<HashMap<String, QueueItem<P>>>,
    config: QueueConfig,
}

impl<P: Clone + Send + Sync + 'static> PriorityQueue<P> {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Enqueue an item. An id already present is promoted if the new
    /// priority is higher (numerically smaller) and otherwise dropped.
    pub async fn enqueue(&self, id: impl Into<String>, payload: P, priority: Priority) -> EnqueueOutcome {
        let id = id.into();
        let mut items = self.items.lock().await;
        match items.get_mut(&id) {
            Some(existing) => {
                if priority < existing.priority {
                    existing.priority = priority;
                    existing.created_at = Instant::now();
                    EnqueueOutcome::Promoted
                } else {
                    EnqueueOutcome::Dropped
                }
            }
            None => {
                items.insert(id.clone(), QueueItem::new(id, payload, priority, Instant::now()));
                EnqueueOutcome::Added
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Remove and return the highest-priority, earliest-created item.
    async fn pop_best(&self) -> Option<QueueItem<P>> {
        let mut items = self.items.lock().await;
        let best_id = items
            .values()
            .min_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)))
            .map(|item| item.id.clone())?;
        items.remove(&best_id)
    }

    async fn reinsert(&self, item: QueueItem<P>) {
        let mut items = self.items.lock().await;
        items.entry(item.id.clone()).or_insert(item);
    }

    /// Pop and execute a single item if one is available, applying the
    /// timeout/retry/max-retries policy. Returns `false` if the queue was
    /// empty. Exposed directly so tests can drive execution deterministically
    /// without a background loop.
    pub async fn execute_one<H, Fut, E, M>(self: &Arc<Self>, handler: &H, on_max_retries: &M) -> bool
    where
        H: Fn(P) -> Fut,
        Fut: std::future::Future<Output = Result<(), E>>,
        E: fmt::Display,
        M: Fn(QueueItem<P>),
    {
        let Some(mut item) = self.pop_best().await else {
            return false;
        };

        let outcome = tokio::time::timeout(self.config.item_timeout, handler(item.payload.clone())).await;
        item.attempts += 1;
        item.last_attempt_at = Some(Instant::now());

        let failed = match outcome {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                tracing::warn!(id = %item.id, error = %e, "queue item failed");
                true
            }
            Err(_) => {
                tracing::warn!(id = %item.id, "queue item timed out");
                true
            }
        };

        if failed {
            if item.attempts < self.config.max_retries {
                let queue = Arc::clone(self);
                let retry_delay = self.config.retry_delay;
                let retry_item = item.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(retry_delay).await;
                    queue.reinsert(retry_item).await;
                });
            } else {
                on_max_retries(item);
            }
        }

        true
    }

    /// Run workers up to `max_concurrent` in parallel until cancelled.
    pub async fn run<H, Fut, E, M>(self: Arc<Self>, handler: H, on_max_retries: M, cancel: CancellationToken)
    where
        H: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), E>> + Send,
        E: fmt::Display + Send,
        M: Fn(QueueItem<P>) + Send + Sync + 'static,
        P: Send,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let handler = Arc::new(handler);
        let on_max_retries = Arc::new(on_max_retries);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let queue = Arc::clone(&self);
            let handler = Arc::clone(&handler);
            let on_max_retries = Arc::clone(&on_max_retries);

            tokio::select! {
                _ = cancel.cancelled() => {
                    drop(permit);
                    break;
                }
                processed = queue.execute_one(handler.as_ref(), on_max_retries.as_ref()) => {
                    drop(permit);
                    if !processed {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn enqueue_same_id_twice_is_idempotent_in_size() {
        let queue = PriorityQueue::<u32>::new(QueueConfig::default());
        assert_eq!(queue.enqueue("a", 1, Priority::Normal).await, EnqueueOutcome::Added);
        assert_eq!(queue.enqueue("a", 1, Priority::Normal).await, EnqueueOutcome::Dropped);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn higher_priority_promotes_existing_item() {
        let queue = PriorityQueue::<u32>::new(QueueConfig::default());
        queue.enqueue("a", 1, Priority::Low).await;
        let outcome = queue.enqueue("a", 1, Priority::High).await;
        assert_eq!(outcome, EnqueueOutcome::Promoted);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn pop_best_orders_by_priority_then_age() {
        let queue = PriorityQueue::<&str>::new(QueueConfig::default());
        queue.enqueue("low", "low", Priority::Low).await;
        queue.enqueue("high", "high", Priority::High).await;
        queue.enqueue("normal", "normal", Priority::Normal).await;

        let first = queue.pop_best().await.unwrap();
        assert_eq!(first.id, "high");
        let second = queue.pop_best().await.unwrap();
        assert_eq!(second.id, "normal");
        let third = queue.pop_best().await.unwrap();
        assert_eq!(third.id, "low");
    }

    #[tokio::test]
    async fn max_retries_exhaustion_calls_callback_and_drops_item() {
        let config = QueueConfig {
            max_concurrent: 1,
            item_timeout: Duration::from_millis(200),
            max_retries: 2,
            retry_delay: Duration::from_millis(10),
        };
        let queue = Arc::new(PriorityQueue::<u32>::new(config));
        queue.enqueue("a", 1, Priority::Normal).await;

        let calls = Arc::new(AtomicU32::new(0));
        let max_retries_hits = Arc::new(AtomicU32::new(0));

        let handler_calls = Arc::clone(&calls);
        let handler = move |_payload: u32| {
            handler_calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), String>("boom".to_string()) }
        };

        let on_max_retries_hits = Arc::clone(&max_retries_hits);
        let on_max_retries = move |_item: QueueItem<u32>| {
            on_max_retries_hits.fetch_add(1, Ordering::SeqCst);
        };

        // First attempt fails and is scheduled for retry.
        assert!(queue.execute_one(&handler, &on_max_retries).await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Second attempt (the retry) also fails; attempts now equals max_retries.
        assert!(queue.execute_one(&handler, &on_max_retries).await);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(max_retries_hits.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len().await, 0);
    }

    #[tokio::test]
    async fn timeout_is_treated_as_failure() {
        let config = QueueConfig {
            max_concurrent: 1,
            item_timeout: Duration::from_millis(20),
            max_retries: 1,
            retry_delay: Duration::from_millis(10),
        };
        let queue = Arc::new(PriorityQueue::<u32>::new(config));
        queue.enqueue("a", 1, Priority::Normal).await;

        let max_retries_hits = Arc::new(AtomicU32::new(0));
        let handler = |_payload: u32| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<(), String>(())
        };
        let hits = Arc::clone(&max_retries_hits);
        let on_max_retries = move |_item: QueueItem<u32>| {
            hits.fetch_add(1, Ordering::SeqCst);
        };

        assert!(queue.execute_one(&handler, &on_max_retries).await);
        assert_eq!(max_retries_hits.load(Ordering::SeqCst), 1);
    }
}
