use super::{AsyncResult, Outcome};
use crate::error::{AsyncError, RunnerError};
use log::*;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Something that can run work off the calling thread and report back through an [`AsyncResult`].
pub trait AsyncRunner: Send + Sync {
    /// Run blocking, synchronous `work` on a pool that tolerates blocking.
    fn run_blocking<T, F>(&self, work: F) -> AsyncResult<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Outcome<T> + Send + 'static;

    /// Drive `future` on the runner. Cancelling the returned result aborts the task.
    fn spawn<T, Fut>(&self, future: Fut) -> AsyncResult<T>
    where
        T: Clone + Send + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static;
}

#[derive(Clone, Debug)]
pub struct TokioAsyncRunner {
    handle: Handle,
}

impl TokioAsyncRunner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// A runner bound to the tokio runtime of the calling thread.
    pub fn current() -> Result<Self, RunnerError> {
        Handle::try_current().map(Self::new).map_err(|e| RunnerError::NoRuntime(e.to_string()))
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Call `task` every `period`, starting one period from now, until the returned [`RepeatingTask`] is cancelled or
    /// dropped.
    pub fn run_with_fixed_delay<F>(&self, period: Duration, mut task: F) -> RepeatingTask
    where
        F: FnMut() + Send + 'static,
    {
        let handle = self.handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                task();
            }
        });
        RepeatingTask { handle }
    }
}

impl AsyncRunner for TokioAsyncRunner {
    fn run_blocking<T, F>(&self, work: F) -> AsyncResult<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Outcome<T> + Send + 'static,
    {
        let result = AsyncResult::new();
        let target = result.clone();
        let task = self.handle.spawn_blocking(work);
        self.handle.spawn(async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Blocking task did not complete: {e}");
                    Err(AsyncError::TaskFailed(e.to_string()))
                }
            };
            target.propagate(outcome);
        });
        result
    }

    fn spawn<T, Fut>(&self, future: Fut) -> AsyncResult<T>
    where
        T: Clone + Send + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        let result = AsyncResult::new();
        let target = result.clone();
        let task = self.handle.spawn(async move {
            let outcome = future.await;
            target.propagate(outcome);
        });
        let abort = task.abort_handle();
        result.when_complete(move |outcome| {
            if matches!(outcome, Err(AsyncError::Cancelled)) {
                trace!("Aborting spawned task after cancellation");
                abort.abort();
            }
        });
        result
    }
}

/// Handle to a periodic task. The task stops when this handle is cancelled or dropped.
#[derive(Debug)]
pub struct RepeatingTask {
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_work_is_offloaded() {
        let runner = TokioAsyncRunner::current().unwrap();
        let result = AsyncResult::run_on_executor(&runner, || {
            std::thread::sleep(Duration::from_millis(20));
            Ok(42u32)
        });
        assert!(!result.is_done());
        assert_eq!(result.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn blocking_failures_are_reported() {
        let runner = TokioAsyncRunner::current().unwrap();
        let result: AsyncResult<u32> = runner.run_blocking(|| Err(AsyncError::msg("disk on fire")));
        assert_eq!(result.await.unwrap_err().to_string(), "disk on fire");
    }

    #[tokio::test]
    async fn panicking_work_fails_the_result() {
        let runner = TokioAsyncRunner::current().unwrap();
        let result: AsyncResult<u32> = runner.run_blocking(|| panic!("validator bug"));
        assert!(matches!(result.await, Err(AsyncError::TaskFailed(_))));
    }

    #[tokio::test]
    async fn cancelling_a_spawned_result_aborts_the_task() {
        let runner = TokioAsyncRunner::current().unwrap();
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&finished);
        let result = runner.spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(result.cancel());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_task_runs_until_cancelled() {
        let runner = TokioAsyncRunner::current().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let task = runner.run_with_fixed_delay(Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        task.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn no_runtime_is_an_error() {
        assert!(matches!(TokioAsyncRunner::current(), Err(RunnerError::NoRuntime(_))));
    }
}
