//! Bounded worker pools
//!
//! A pool runs at most `size` jobs at once. Jobs wait in a FIFO crossbeam
//! channel and worker threads are started on demand, up to the limit, so
//! a pool that never receives work never spawns a thread.
//!
//! ```text
//!  submit ──► [ job queue (FIFO) ] ──► worker 1 ─┐
//!                                  ──► worker 2 ─┼──► Ticket
//!                                  ──► worker N ─┘
//! ```
//!
//! A panicking job only loses its own result: the worker survives and the
//! job's [`Ticket`] reports the pool as closed.

use crate::error::{AuthorsError, AuthorsResult};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct PoolState {
    active: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
    /// Set on drop: queued jobs are discarded instead of run
    closing: AtomicBool,
}

/// Concurrency-limited job runner
pub struct WorkerPool {
    name: &'static str,
    size: usize,
    sender: Option<Sender<Job>>,
    receiver: Receiver<Job>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    state: Arc<PoolState>,
}

/// Handle to the result of one submitted job
pub struct Ticket<T> {
    pool: &'static str,
    rx: Receiver<T>,
}

impl<T> Ticket<T> {
    /// Block until the job finishes.
    pub fn wait(self) -> AuthorsResult<T> {
        self.recv()
    }

    /// Like [`Ticket::wait`] without consuming the ticket. Only the first
    /// successful call returns the value.
    pub fn recv(&self) -> AuthorsResult<T> {
        self.rx.recv().map_err(|_| AuthorsError::PoolClosed(self.pool))
    }
}

impl WorkerPool {
    /// Create a pool running at most `size` jobs at once (minimum 1).
    pub fn new(name: &'static str, size: usize) -> Self {
        let (sender, receiver) = unbounded::<Job>();
        Self {
            name,
            size: size.max(1),
            sender: Some(sender),
            receiver,
            workers: Mutex::new(Vec::new()),
            state: Arc::new(PoolState::default()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Highest number of jobs observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.state.peak.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> usize {
        self.state.completed.load(Ordering::Relaxed)
    }

    /// Number of worker threads started so far.
    pub fn spawned_workers(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Queue `task` and return a ticket for its result.
    pub fn submit<T, F>(&self, task: F) -> Ticket<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = bounded(1);
        self.execute(move || {
            // Receiver may have been dropped; nobody wants the result then
            let _ = tx.send(task());
        });
        Ticket {
            pool: self.name,
            rx,
        }
    }

    /// Queue a job whose result is delivered some other way.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(Box::new(job)).is_err() {
            warn!("{} pool rejected a job", self.name);
            return;
        }
        self.ensure_worker();
    }

    fn ensure_worker(&self) {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        // One worker per submitted job until the limit is reached
        if workers.len() >= self.size {
            return;
        }
        let rx = self.receiver.clone();
        let state = Arc::clone(&self.state);
        let name = self.name;
        workers.push(thread::spawn(move || worker_loop(name, rx, state)));
        debug!("{} pool: started worker {}/{}", name, workers.len(), self.size);
    }
}

fn worker_loop(name: &'static str, rx: Receiver<Job>, state: Arc<PoolState>) {
    for job in rx {
        if state.closing.load(Ordering::SeqCst) {
            continue;
        }
        let running = state.active.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak.fetch_max(running, Ordering::SeqCst);

        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!("{} pool: job panicked", name);
        }

        state.active.fetch_sub(1, Ordering::SeqCst);
        state.completed.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for WorkerPool {
    /// Discard queued jobs, then wait for running ones.
    fn drop(&mut self) {
        self.state.closing.store(true, Ordering::SeqCst);
        drop(self.sender.take());
        let workers = std::mem::take(
            self.workers
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for w in workers {
            let _ = w.join();
        }
        debug!(
            "{} pool stopped: {} jobs, peak concurrency {}",
            self.name,
            self.completed(),
            self.peak_concurrency()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn test_submit_returns_results() {
        let pool = WorkerPool::new("test", 4);
        let tickets: Vec<_> = (0..10).map(|i| pool.submit(move || i * 2)).collect();
        let results: Vec<i32> = tickets.into_iter().map(|t| t.wait().unwrap()).collect();
        assert_eq!(results, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new("bounded", 3);
        let tickets: Vec<_> = (0..24)
            .map(|_| pool.submit(|| thread::sleep(Duration::from_millis(5))))
            .collect();
        for t in tickets {
            t.wait().unwrap();
        }
        assert!(pool.peak_concurrency() <= 3);
        assert!(pool.spawned_workers() <= 3);
        assert_eq!(pool.completed(), 24);
    }

    #[test]
    fn test_reaches_limit_when_saturated() {
        let pool = WorkerPool::new("saturate", 4);
        let barrier = Arc::new(Barrier::new(4));
        let tickets: Vec<_> = (0..4)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                pool.submit(move || {
                    barrier.wait();
                })
            })
            .collect();
        for t in tickets {
            t.wait().unwrap();
        }
        assert_eq!(pool.peak_concurrency(), 4);
    }

    #[test]
    fn test_single_worker_runs_fifo() {
        let pool = WorkerPool::new("fifo", 1);
        let order = Arc::new(Mutex::new(Vec::new()));
        let tickets: Vec<_> = (0..20)
            .map(|i| {
                let order = Arc::clone(&order);
                pool.submit(move || order.lock().unwrap().push(i))
            })
            .collect();
        for t in tickets {
            t.wait().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_failure_does_not_affect_siblings() {
        let pool = WorkerPool::new("panicky", 2);
        let bad = pool.submit(|| -> u32 { panic!("boom") });
        let good: Vec<_> = (0..5).map(|i| pool.submit(move || i)).collect();

        assert!(matches!(bad.wait(), Err(AuthorsError::PoolClosed("panicky"))));
        let sum: u32 = good.into_iter().map(|t| t.wait().unwrap()).sum();
        assert_eq!(sum, 10);
    }

    #[test]
    fn test_zero_size_means_one() {
        let pool = WorkerPool::new("tiny", 0);
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.submit(|| "ok").wait().unwrap(), "ok");
    }

    #[test]
    fn test_idle_pool_spawns_nothing() {
        let pool = WorkerPool::new("idle", 64);
        assert_eq!(pool.spawned_workers(), 0);
    }
}
