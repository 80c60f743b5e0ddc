use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Fixed-size concurrent executor. Results come back in input order no matter
/// which task finishes first.
pub struct ConcurrentProbe {
    semaphore: Arc<Semaphore>,
    task_timeout: Option<Duration>,
    completed: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
}

impl ConcurrentProbe {
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            task_timeout: None,
            completed: Arc::new(AtomicUsize::new(0)),
            errors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Abandon any single task that runs longer than `timeout`.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Run `task_fn` over every item with at most `concurrency` in flight.
    /// A task that panics or times out yields `Err` in its own slot only.
    /// Dropping the returned future aborts every task still running.
    pub async fn execute<T, F, Fut>(&self, tasks: Vec<T>, task_fn: F) -> Vec<Result<Fut::Output, String>>
    where
        F: Fn(T) -> Fut + Clone + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
        T: Send + 'static,
    {
        let total = tasks.len();
        let mut set = JoinSet::new();

        for (idx, task) in tasks.into_iter().enumerate() {
            // the semaphore is never closed
            let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                break;
            };
            let task_fn = task_fn.clone();
            let completed = self.completed.clone();
            let task_timeout = self.task_timeout;

            set.spawn(async move {
                let run = AssertUnwindSafe(task_fn(task)).catch_unwind();
                let result = match task_timeout {
                    Some(limit) => match tokio::time::timeout(limit, run).await {
                        Ok(r) => r.map_err(panic_message),
                        Err(_) => Err(format!("timed out after {}ms", limit.as_millis())),
                    },
                    None => run.await.map_err(panic_message),
                };
                completed.fetch_add(1, Ordering::Relaxed);
                drop(permit);
                (idx, result)
            });
        }

        let mut slots: Vec<Option<Result<Fut::Output, String>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            if let Ok((idx, result)) = joined {
                if result.is_err() {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                }
                slots[idx] = Some(result);
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    Err("task did not complete".to_string())
                })
            })
            .collect()
    }

    pub fn get_stats(&self) -> (usize, usize) {
        (
            self.completed.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {}", s)
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn results_follow_input_order() {
        let pool = ConcurrentProbe::new(4);
        // later items finish first
        let out = pool
            .execute(vec![50u64, 40, 30, 20, 10, 0], |ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                ms
            })
            .await;
        let values: Vec<u64> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![50, 40, 30, 20, 10, 0]);
        assert_eq!(pool.get_stats(), (6, 0));
    }

    #[tokio::test]
    async fn never_exceeds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = ConcurrentProbe::new(3);

        let (f, p) = (in_flight.clone(), peak.clone());
        pool.execute((0..12).collect::<Vec<_>>(), move |_| {
            let (f, p) = (f.clone(), p.clone());
            async move {
                let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                f.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_task_times_out_alone() {
        let pool = ConcurrentProbe::new(2).with_task_timeout(Duration::from_millis(100));
        let start = std::time::Instant::now();
        let out = pool
            .execute(vec![10_000u64, 5, 5], |ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                ms
            })
            .await;
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(out[0].as_ref().unwrap_err().contains("timed out"));
        assert_eq!(out[1], Ok(5));
        assert_eq!(out[2], Ok(5));
        assert_eq!(pool.get_stats().1, 1);
    }

    #[tokio::test]
    async fn panic_stays_in_its_slot() {
        let pool = ConcurrentProbe::new(2);
        let out = pool
            .execute(vec![1, 2, 3], |n| async move {
                if n == 2 {
                    panic!("probe exploded");
                }
                n
            })
            .await;
        assert_eq!(out[0], Ok(1));
        assert!(out[1].as_ref().unwrap_err().contains("probe exploded"));
        assert_eq!(out[2], Ok(3));
    }
}
