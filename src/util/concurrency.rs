//! Task execution strategies: throttled parallel execution and observed fan-out.
//!
//! `run_throttled` drains a work set with a bounded number of workers.
//! `fan_out_observed` starts one task per item at once and hands the
//! in-flight tasks back, so that starting everything and waiting for
//! everything are separate steps. `drain_until` is the waiting half: it
//! harvests whatever finishes before a deadline and leaves the rest running.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Default cap on in-flight work for `run_throttled`.
pub const MAX_DEGREE_OF_PARALLELISM: usize = 16;

/// Marker error for cooperative cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation was cancelled")]
pub struct Cancelled;

/// Errors raised by the execution strategies themselves.
#[derive(Debug, Error)]
pub enum ConcurrencyError {
    #[error("{} of {total} work items failed", .failures.len())]
    Aggregate {
        total: usize,
        failures: Vec<anyhow::Error>,
    },

    #[error("duplicate fan-out key `{key}`")]
    DuplicateKey { key: String },

    #[error("parallelism must be at least 1")]
    InvalidParallelism,

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Run `worker` over every item with at most `max_parallelism` in flight.
///
/// Each worker claims one item at a time from a shared pool. Values are
/// returned in completion order, not input order. A failing item does not
/// stop the others; once the pool is drained, any failures are reported
/// together as `ConcurrencyError::Aggregate`.
pub async fn run_throttled<I, T, F, Fut>(
    items: impl IntoIterator<Item = I>,
    worker: F,
    max_parallelism: usize,
    cancel: &CancellationToken,
) -> Result<Vec<T>, ConcurrencyError>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    if max_parallelism == 0 {
        return Err(ConcurrencyError::InvalidParallelism);
    }

    let mut pool: Vec<I> = items.into_iter().collect();
    let total = pool.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    // Claims pop from the back; reverse so items are claimed in input order.
    pool.reverse();
    let pool = Arc::new(Mutex::new(pool));
    let worker = Arc::new(worker);
    let (tx, mut rx) = mpsc::unbounded_channel::<anyhow::Result<T>>();

    let workers = max_parallelism.min(total);
    tracing::debug!("running {} items on {} workers", total, workers);

    let handles: Vec<JoinHandle<()>> = (0..workers)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let worker = Arc::clone(&worker);
            let tx = tx.clone();
            let token = cancel.clone();

            tokio::spawn(async move {
                while !token.is_cancelled() {
                    let next = match pool.lock() {
                        Ok(mut pool) => pool.pop(),
                        Err(poisoned) => poisoned.into_inner().pop(),
                    };
                    let Some(item) = next else { break };

                    let value = worker(item, token.clone()).await;
                    if tx.send(value).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    drop(tx);

    let mut values = Vec::with_capacity(total);
    let mut failures = Vec::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                for handle in &handles {
                    handle.abort();
                }
                return Err(Cancelled.into());
            }
            next = rx.recv() => match next {
                Some(Ok(value)) => values.push(value),
                Some(Err(err)) => failures.push(err),
                None => break,
            },
        }
    }

    // A panicking worker drops its sender early; surface the panic as a failure.
    for result in futures::future::join_all(handles).await {
        if let Err(err) = result {
            failures.push(anyhow::anyhow!("worker task failed: {err}"));
        }
    }

    if failures.is_empty() {
        Ok(values)
    } else {
        Err(ConcurrencyError::Aggregate { total, failures })
    }
}

/// How a fanned-out task ended.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),
    Cancelled,
    Faulted(Arc<anyhow::Error>),
    /// The runtime reported an ending that is neither of the above.
    Unknown,
}

impl<T> TaskOutcome<T> {
    fn from_join(result: Result<anyhow::Result<T>, JoinError>) -> Self {
        match result {
            Ok(Ok(value)) => TaskOutcome::Completed(value),
            Ok(Err(err)) if err.is::<Cancelled>() => TaskOutcome::Cancelled,
            Ok(Err(err)) => TaskOutcome::Faulted(Arc::new(err)),
            Err(err) if err.is_cancelled() => TaskOutcome::Cancelled,
            Err(err) if err.is_panic() => {
                TaskOutcome::Faulted(Arc::new(anyhow::anyhow!("task panicked: {err}")))
            }
            Err(_) => TaskOutcome::Unknown,
        }
    }

    /// The completed value, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            TaskOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// A spawned task whose faults are already observed.
///
/// Awaiting it yields a `TaskOutcome`, never a panic or error.
#[derive(Debug)]
pub struct ObservedTask<T> {
    handle: JoinHandle<anyhow::Result<T>>,
}

impl<T> ObservedTask<T> {
    /// Check whether the task has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task at its next suspension point.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl<T> Future for ObservedTask<T> {
    type Output = TaskOutcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().handle)
            .poll(cx)
            .map(TaskOutcome::from_join)
    }
}

/// Start one task per item, keyed by `key_selector`, without waiting.
///
/// Keys must be unique; a collision is rejected before anything starts.
/// Every task races its operation against `cancel`. When an operation
/// fails or panics (cancellation excluded), `on_fault` is told about it from
/// inside the task; nothing propagates to siblings or to the caller.
pub fn fan_out_observed<I, K, T, KF, TF, Fut, OF>(
    items: impl IntoIterator<Item = I>,
    key_selector: KF,
    task_factory: TF,
    on_fault: OF,
    cancel: &CancellationToken,
) -> Result<BTreeMap<K, ObservedTask<T>>, ConcurrencyError>
where
    K: Ord + Clone + fmt::Display + Send + Sync + 'static,
    T: Send + 'static,
    KF: Fn(&I) -> K,
    TF: Fn(I, CancellationToken) -> Fut,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    OF: Fn(&K, &anyhow::Error) + Send + Sync + 'static,
{
    let keyed: Vec<(K, I)> = items
        .into_iter()
        .map(|item| (key_selector(&item), item))
        .collect();

    let mut seen = BTreeSet::new();
    for (key, _) in &keyed {
        if !seen.insert(key.clone()) {
            return Err(ConcurrencyError::DuplicateKey {
                key: key.to_string(),
            });
        }
    }

    let on_fault = Arc::new(on_fault);
    let tasks = keyed
        .into_iter()
        .map(|(key, item)| {
            let operation = task_factory(item, cancel.clone());
            let token = cancel.clone();
            let observer = Arc::clone(&on_fault);
            let task_key = key.clone();

            let guarded = AssertUnwindSafe(operation).catch_unwind().map(|outcome| {
                outcome.unwrap_or_else(|payload| {
                    Err(anyhow::anyhow!("task panicked: {}", panic_message(&*payload)))
                })
            });

            let handle = tokio::spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(anyhow::Error::new(Cancelled)),
                    result = guarded => result,
                };
                if let Err(err) = &result {
                    if !err.is::<Cancelled>() {
                        observer(&task_key, err);
                    }
                }
                result
            });

            (key, ObservedTask { handle })
        })
        .collect();

    Ok(tasks)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Harvest tasks from `pending` until all have ended or `timeout` elapses.
///
/// Finished tasks are moved out of `pending` into the returned map; tasks
/// still running stay in `pending` and keep running. The timeout only stops
/// the waiting. Cancelling `cancel` aborts everything left in `pending`.
pub async fn drain_until<K, T>(
    pending: &mut BTreeMap<K, ObservedTask<T>>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<BTreeMap<K, TaskOutcome<T>>, Cancelled>
where
    K: Ord + Clone,
{
    let mut finished = BTreeMap::new();
    let deadline = tokio::time::Instant::now() + timeout;

    let cancelled = {
        let drain = async {
            while !pending.is_empty() {
                let (outcome, index) = {
                    let (outcome, index, _rest) =
                        futures::future::select_all(pending.values_mut()).await;
                    (outcome, index)
                };
                if let Some(key) = pending.keys().nth(index).cloned() {
                    pending.remove(&key);
                    finished.insert(key, outcome);
                }
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => true,
            _ = drain => false,
            _ = tokio::time::sleep_until(deadline) => false,
        }
    };

    if cancelled {
        for task in pending.values() {
            task.abort();
        }
        return Err(Cancelled);
    }

    Ok(finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_throttled_returns_every_value() {
        let cancel = CancellationToken::new();
        let mut values = run_throttled(
            0..40u32,
            |n, _| async move { Ok(n * 2) },
            MAX_DEGREE_OF_PARALLELISM,
            &cancel,
        )
        .await
        .unwrap();

        values.sort();
        assert_eq!(values, (0..40u32).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_throttled_respects_parallelism() {
        let cancel = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (in_flight_w, peak_w) = (Arc::clone(&in_flight), Arc::clone(&peak));
        run_throttled(
            0..20,
            move |_, _| {
                let in_flight = Arc::clone(&in_flight_w);
                let peak = Arc::clone(&peak_w);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            3,
            &cancel,
        )
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_throttled_isolates_failures() {
        let cancel = CancellationToken::new();
        let done = Arc::new(AtomicUsize::new(0));
        let done_w = Arc::clone(&done);

        let result = run_throttled(
            0..10,
            move |n, _| {
                let done = Arc::clone(&done_w);
                async move {
                    if n == 3 {
                        anyhow::bail!("item {n} broke");
                    }
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(n)
                }
            },
            2,
            &cancel,
        )
        .await;

        match result {
            Err(ConcurrencyError::Aggregate { total, failures }) => {
                assert_eq!(total, 10);
                assert_eq!(failures.len(), 1);
                assert!(failures[0].to_string().contains("item 3"));
            }
            other => panic!("expected aggregate failure, got {other:?}"),
        }
        assert_eq!(done.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_throttled_rejects_zero_parallelism() {
        let cancel = CancellationToken::new();
        let result = run_throttled(0..1, |n, _| async move { Ok(n) }, 0, &cancel).await;
        assert!(matches!(result, Err(ConcurrencyError::InvalidParallelism)));
    }

    #[tokio::test]
    async fn test_throttled_empty_input() {
        let cancel = CancellationToken::new();
        let values: Vec<u8> = run_throttled(Vec::<u8>::new(), |n, _| async move { Ok(n) }, 4, &cancel)
            .await
            .unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_throttled_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = run_throttled(
            0..4,
            |_, token: CancellationToken| async move {
                token.cancelled().await;
                Ok(())
            },
            4,
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(ConcurrencyError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_fan_out_rejects_duplicate_keys() {
        let cancel = CancellationToken::new();
        let result = fan_out_observed(
            vec!["a", "b", "a"],
            |s| s.to_string(),
            |_, _| async { Ok(()) },
            |_, _| {},
            &cancel,
        );

        match result {
            Err(ConcurrencyError::DuplicateKey { key }) => assert_eq!(key, "a"),
            other => panic!("expected duplicate key, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fan_out_observes_faults_without_propagating() {
        let cancel = CancellationToken::new();
        let faults = Arc::new(Mutex::new(Vec::new()));
        let faults_w = Arc::clone(&faults);

        let mut tasks = fan_out_observed(
            vec![1u32, 2, 3],
            |n| *n,
            |n, _| async move {
                if n == 2 {
                    anyhow::bail!("source {n} is down");
                }
                Ok(n * 10)
            },
            move |key, err| faults_w.lock().unwrap().push((*key, err.to_string())),
            &cancel,
        )
        .unwrap();

        assert_eq!(tasks.len(), 3);
        let finished = drain_until(&mut tasks, Duration::from_secs(5), &cancel)
            .await
            .unwrap();

        assert!(tasks.is_empty());
        assert!(matches!(finished[&1], TaskOutcome::Completed(10)));
        assert!(matches!(finished[&3], TaskOutcome::Completed(30)));
        match &finished[&2] {
            TaskOutcome::Faulted(err) => assert!(err.to_string().contains("down")),
            other => panic!("expected fault, got {other:?}"),
        }

        let faults = faults.lock().unwrap();
        assert_eq!(faults.as_slice(), &[(2, "source 2 is down".to_string())]);
    }

    #[tokio::test]
    async fn test_fan_out_observes_panics() {
        let cancel = CancellationToken::new();
        let faults = Arc::new(Mutex::new(Vec::new()));
        let faults_w = Arc::clone(&faults);

        let mut tasks = fan_out_observed(
            vec![1u32, 2],
            |n| *n,
            |n, _| async move {
                if n == 2 {
                    panic!("index for {n} is corrupt");
                }
                Ok::<_, anyhow::Error>(n)
            },
            move |key, err| faults_w.lock().unwrap().push((*key, err.to_string())),
            &cancel,
        )
        .unwrap();

        let finished = drain_until(&mut tasks, Duration::from_secs(5), &cancel)
            .await
            .unwrap();

        assert!(matches!(finished[&1], TaskOutcome::Completed(1)));
        match &finished[&2] {
            TaskOutcome::Faulted(err) => assert!(err.to_string().contains("index for 2 is corrupt")),
            other => panic!("expected fault, got {other:?}"),
        }

        let faults = faults.lock().unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].0, 2);
        assert!(faults[0].1.starts_with("task panicked: index for 2 is corrupt"));
    }

    #[tokio::test]
    async fn test_drain_until_leaves_slow_tasks_running() {
        let cancel = CancellationToken::new();
        let mut tasks = fan_out_observed(
            vec![("fast", 0u64), ("slow", 300)],
            |(name, _)| name.to_string(),
            |(name, delay), _| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(name)
            },
            |_, _| {},
            &cancel,
        )
        .unwrap();

        let first = drain_until(&mut tasks, Duration::from_millis(50), &cancel)
            .await
            .unwrap();
        assert!(first.contains_key("fast"));
        assert!(tasks.contains_key("slow"));

        let second = drain_until(&mut tasks, Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        assert!(matches!(second["slow"], TaskOutcome::Completed("slow")));
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_fan_out_reports_cancelled() {
        let cancel = CancellationToken::new();
        let mut tasks = fan_out_observed(
            vec!["never"],
            |s| s.to_string(),
            |_, _| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            |_, _| panic!("cancellation is not a fault"),
            &cancel,
        )
        .unwrap();

        cancel.cancel();
        let outcome = tasks.remove("never").unwrap().await;
        assert!(matches!(outcome, TaskOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_drain_until_cancellation_aborts_pending() {
        let cancel = CancellationToken::new();
        let wait_token = CancellationToken::new();
        let mut tasks = fan_out_observed(
            vec!["slow"],
            |s| s.to_string(),
            |_, _| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            |_, _| {},
            &cancel,
        )
        .unwrap();

        wait_token.cancel();
        let result = drain_until(&mut tasks, Duration::from_secs(5), &wait_token).await;
        assert_eq!(result.unwrap_err(), Cancelled);

        let outcome = tasks.remove("slow").unwrap().await;
        assert!(matches!(outcome, TaskOutcome::Cancelled));
    }
}
