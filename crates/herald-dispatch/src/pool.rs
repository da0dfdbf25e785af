//! Fixed-size worker pool and the handle for results computed on it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use herald_types::{ExecutionFailure, HeraldError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Worker threads pulling boxed jobs off a shared queue.
///
/// Jobs run to completion; there is no cancellation. A panicking job is
/// logged and the worker keeps going.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let (tx, rx) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("herald-worker-{i}"))
                .spawn(move || worker_loop(rx))?;
            workers.push(handle);
        }
        log::debug!("started {size} worker threads");
        Ok(Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Queue a job. Fails with `Shutdown` once the pool is closed.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = lock(&self.sender);
        let tx = guard.as_ref().ok_or(HeraldError::Shutdown)?;
        tx.send(Box::new(job)).map_err(|_| HeraldError::Shutdown)
    }

    /// Queue a job and get a handle to its result.
    ///
    /// If the pool is closed the handle resolves to `Shutdown`. A panic in
    /// `job` resolves to `CommandExecution`.
    pub fn spawn<T, F>(&self, job: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        let submitted = self.submit(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                Err(HeraldError::CommandExecution(Box::new(ExecutionFailure {
                    input: String::new(),
                    suggestions: false,
                    context: Vec::new(),
                    cause: anyhow::anyhow!("worker job panicked: {}", panic_message(&*payload)),
                })))
            });
            let _ = tx.send(result);
        });
        match submitted {
            Ok(()) => Pending { rx },
            Err(e) => Pending::ready(Err(e)),
        }
    }

    /// Stop accepting jobs, let queued jobs finish, and join the workers.
    ///
    /// Safe to call more than once and from a worker thread; the calling
    /// worker is not joined.
    pub fn shutdown(&self) {
        if lock(&self.sender).take().is_none() {
            return;
        }
        let current = thread::current().id();
        let handles: Vec<JoinHandle<()>> = lock(&self.workers).drain(..).collect();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                log::warn!("worker thread exited abnormally");
            }
        }
        log::debug!("worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            log::error!(
                "job panicked on {}: {}",
                thread::current().name().unwrap_or("worker"),
                panic_message(&*payload)
            );
        }
    }
}

/// The eventual result of work submitted to a [`WorkerPool`].
///
/// A result is delivered once. After it has been taken by
/// [`wait_timeout`](Self::wait_timeout) or [`try_get`](Self::try_get),
/// further polls report `Shutdown`.
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// An already-resolved handle.
    pub fn ready(result: Result<T>) -> Self {
        let (tx, rx) = channel::bounded(1);
        let _ = tx.send(result);
        Self { rx }
    }

    /// Block until the result arrives.
    pub fn wait(self) -> Result<T> {
        self.rx.recv().unwrap_or(Err(HeraldError::Shutdown))
    }

    /// Block for at most `timeout`. `None` means still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(HeraldError::Shutdown)),
        }
    }

    /// Non-blocking poll.
    pub fn try_get(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(HeraldError::Shutdown)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_off_the_calling_thread() {
        let pool = WorkerPool::new(2).unwrap();
        let name = pool
            .spawn(|| Ok(thread::current().name().map(str::to_string)))
            .wait()
            .unwrap()
            .unwrap();
        assert!(name.starts_with("herald-worker-"));
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn zero_size_is_clamped() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.spawn(|| Ok(7)).wait().unwrap(), 7);
    }

    #[test]
    fn worker_survives_a_panic() {
        let pool = WorkerPool::new(1).unwrap();
        pool.submit(|| panic!("boom")).unwrap();
        assert_eq!(pool.spawn(|| Ok(1 + 1)).wait().unwrap(), 2);
    }

    #[test]
    fn panicking_spawn_resolves_to_execution_failure() {
        let pool = WorkerPool::new(1).unwrap();
        let err = pool.spawn::<(), _>(|| panic!("kaboom")).wait().unwrap_err();
        let failure = err.execution_failure().expect("execution failure");
        assert!(failure.cause.to_string().contains("kaboom"));
    }

    #[test]
    fn shutdown_drains_queued_jobs() {
        let pool = WorkerPool::new(1).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let count = Arc::clone(&count);
            pool.submit(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(count.load(Ordering::SeqCst), 20);
        assert!(pool.is_shut_down());
    }

    #[test]
    fn closed_pool_rejects_work() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(matches!(pool.submit(|| {}), Err(HeraldError::Shutdown)));
        assert!(matches!(pool.spawn(|| Ok(())).wait(), Err(HeraldError::Shutdown)));
    }

    #[test]
    fn wait_timeout_and_try_get() {
        let pool = WorkerPool::new(1).unwrap();
        let (gate_tx, gate_rx) = channel::bounded::<()>(0);
        let pending = pool.spawn(move || {
            let _ = gate_rx.recv();
            Ok("done")
        });
        assert!(pending.try_get().is_none());
        assert!(pending.wait_timeout(Duration::from_millis(20)).is_none());
        gate_tx.send(()).unwrap();
        let result = pending.wait_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.unwrap(), "done");
    }
}
