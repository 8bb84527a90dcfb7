//! Generic worker pool over a shared multi-consumer queue.
//!
//! Workers block on a `crossbeam` channel select so that three events can
//! wake them: a work item arriving, a targeted shutdown (shrink), or the
//! pool-wide stop signal. The stop signal is modelled as a channel whose
//! sender is dropped on `stop()`, which disconnects every cloned receiver
//! and wakes every blocked select at once.

use crate::error::PoolError;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Work-item handler shared by all workers of a pool.
///
/// Returning `Err` marks the item as failed; the pool logs the error and the
/// worker continues popping. A handler must never panic for ordinary
/// request-level failures.
pub type WorkerFn<T> = Arc<dyn Fn(T) -> anyhow::Result<()> + Send + Sync>;

/// One live worker thread plus its targeted shutdown handle.
struct Worker {
    id: usize,
    shutdown_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// A named, resizable pool of worker threads over a single FIFO queue.
///
/// All methods take `&self`; the pool uses interior mutability so it can be
/// shared behind an `Arc` between producers and lifecycle owners.
///
/// # Lifecycle
///
/// * [`WorkerPool::new`] creates the pool without starting any threads.
/// * [`WorkerPool::start`] spawns workers up to the configured size; calling
///   it again is a no-op that tops the pool back up.
/// * [`WorkerPool::resize`] grows or shrinks the live pool; queued items and
///   surviving workers are untouched.
/// * [`WorkerPool::stop`] rejects further pushes, wakes every blocked pop,
///   and joins all workers. It is idempotent. A stopped pool stays stopped.
pub struct WorkerPool<T: Send + 'static> {
    name: String,
    target_size: AtomicUsize,
    work_tx: Sender<T>,
    work_rx: Receiver<T>,
    stopping: Arc<AtomicBool>,
    /// Dropped on `stop()`; disconnection wakes every select blocked on it.
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
    workers: Mutex<Vec<Worker>>,
    worker_fn: Mutex<Option<WorkerFn<T>>>,
    next_worker_id: AtomicUsize,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Creates a pool with the given name and target thread count.
    ///
    /// No threads are started; the queue accepts pushes immediately so that
    /// producers can enqueue work before the workers come up.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        let (work_tx, work_rx) = channel::unbounded();
        let (stop_tx, stop_rx) = channel::bounded(0);
        Self {
            name: name.into(),
            target_size: AtomicUsize::new(size),
            work_tx,
            work_rx,
            stopping: Arc::new(AtomicBool::new(false)),
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx,
            workers: Mutex::new(Vec::new()),
            worker_fn: Mutex::new(None),
            next_worker_id: AtomicUsize::new(0),
        }
    }

    /// Returns the pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts the pool, spawning workers up to the configured size.
    ///
    /// The first call installs `worker_fn` as the shared handler; subsequent
    /// calls keep the installed handler and merely top the pool back up to
    /// the target size, so a repeated `start` on a full pool is a no-op.
    ///
    /// # Errors
    ///
    /// [`PoolError::Stopped`] if the pool was stopped, or
    /// [`PoolError::Spawn`] if the OS refuses a thread. A spawn failure is
    /// fatal to this call only: already-running workers keep running and the
    /// caller decides whether to `stop()` and abort.
    pub fn start(&self, worker_fn: impl Fn(T) -> anyhow::Result<()> + Send + Sync + 'static) -> Result<(), PoolError> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(PoolError::Stopped(self.name.clone()));
        }

        let handler = {
            let mut slot = self.worker_fn.lock().expect("worker_fn lock poisoned");
            slot.get_or_insert_with(|| Arc::new(worker_fn)).clone()
        };

        let mut workers = self.workers.lock().expect("workers lock poisoned");
        let target = self.target_size.load(Ordering::SeqCst);
        while workers.len() < target {
            let worker = self.spawn_worker(handler.clone())?;
            workers.push(worker);
        }
        info!("🧵 Pool `{}` running with {} workers", self.name, workers.len());
        Ok(())
    }

    /// Enqueues an item, waking one waiting worker.
    ///
    /// Never blocks; the queue is bounded only by available memory.
    ///
    /// # Errors
    ///
    /// [`PoolError::Stopped`] once `stop()` has begun. Rejecting late pushes
    /// is part of the shutdown contract: no item may race a stopping pool.
    pub fn push(&self, item: T) -> Result<(), PoolError> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(PoolError::Stopped(self.name.clone()));
        }
        self.work_tx
            .send(item)
            .map_err(|_| PoolError::Stopped(self.name.clone()))
    }

    /// Blocks until an item is available or the pool is stopping.
    ///
    /// Returns `None` once `stop()` has been called, guaranteeing the caller
    /// can exit cleanly instead of receiving a stale item. Worker threads use
    /// the same wake-up machinery internally.
    pub fn pop(&self) -> Option<T> {
        if self.stopping.load(Ordering::SeqCst) {
            return None;
        }
        crossbeam::select! {
            recv(self.work_rx) -> item => item.ok(),
            recv(self.stop_rx) -> _ => None,
        }
    }

    /// Grows or shrinks the live pool to `n` workers.
    ///
    /// Growing spawns additional workers with the installed handler;
    /// shrinking signals the excess workers to finish their current item and
    /// exit, then joins them. Queued items survive a resize and are processed
    /// exactly once.
    pub fn resize(&self, n: usize) -> Result<(), PoolError> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(PoolError::Stopped(self.name.clone()));
        }
        self.target_size.store(n, Ordering::SeqCst);

        let mut workers = self.workers.lock().expect("workers lock poisoned");
        if workers.len() > n {
            let excess: Vec<Worker> = workers.drain(n..).collect();
            drop(workers);
            debug!("🧵 Pool `{}` shrinking by {} workers", self.name, excess.len());
            for worker in excess {
                let _ = worker.shutdown_tx.send(());
                if worker.handle.join().is_err() {
                    error!("Worker {}-{} panicked during shutdown", self.name, worker.id);
                }
            }
            return Ok(());
        }

        // Growing is only meaningful once a handler is installed; before
        // `start` the new target takes effect at start time.
        let handler = match self.worker_fn.lock().expect("worker_fn lock poisoned").clone() {
            Some(handler) => handler,
            None => return Ok(()),
        };
        while workers.len() < n {
            let worker = self.spawn_worker(handler.clone())?;
            workers.push(worker);
        }
        Ok(())
    }

    /// Stops the pool: rejects further pushes, wakes every blocked pop, and
    /// joins all worker threads.
    ///
    /// Safe to call repeatedly and never deadlocks on an empty queue. Items
    /// still in the queue when stop begins are dropped with the pool.
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        // Disconnect the stop channel; every select blocked on it wakes.
        self.stop_tx.lock().expect("stop_tx lock poisoned").take();

        let workers: Vec<Worker> = {
            let mut guard = self.workers.lock().expect("workers lock poisoned");
            guard.drain(..).collect()
        };
        let count = workers.len();
        for worker in &workers {
            let _ = worker.shutdown_tx.send(());
        }
        for worker in workers {
            if worker.handle.join().is_err() {
                error!("Worker {}-{} panicked during stop", self.name, worker.id);
            }
        }
        let abandoned = self.work_rx.len();
        if abandoned > 0 {
            warn!("🛑 Pool `{}` stopped with {} unprocessed items", self.name, abandoned);
        } else {
            info!("🛑 Pool `{}` stopped ({} workers joined)", self.name, count);
        }
    }

    /// Number of live worker threads. O(1).
    pub fn pool_size(&self) -> usize {
        self.workers.lock().expect("workers lock poisoned").len()
    }

    /// Number of items currently queued. O(1).
    pub fn queue_size(&self) -> usize {
        self.work_rx.len()
    }

    fn spawn_worker(&self, handler: WorkerFn<T>) -> Result<Worker, PoolError> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let (shutdown_tx, shutdown_rx) = channel::bounded(1);
        let work_rx = self.work_rx.clone();
        let stop_rx = self.stop_rx.clone();
        let stopping = self.stopping.clone();
        let pool_name = self.name.clone();
        let thread_name = format!("{}-{}", self.name, id);

        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                debug!("Worker {}-{} up", pool_name, id);
                loop {
                    if stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    crossbeam::select! {
                        recv(work_rx) -> item => match item {
                            Ok(item) => {
                                // Re-check so an item racing `stop()` is not
                                // processed after shutdown began.
                                if stopping.load(Ordering::SeqCst) {
                                    break;
                                }
                                if let Err(e) = handler(item) {
                                    error!("Worker {}-{} failed to process item: {e:#}", pool_name, id);
                                }
                            }
                            Err(_) => break,
                        },
                        recv(shutdown_rx) -> _ => break,
                        recv(stop_rx) -> _ => break,
                    }
                }
                debug!("Worker {}-{} down", pool_name, id);
            })
            .map_err(|source| PoolError::Spawn {
                pool: self.name.clone(),
                source,
            })?;

        Ok(Worker {
            id,
            shutdown_tx,
            handle,
        })
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T: Send + 'static> std::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("pool_size", &self.pool_size())
            .field("queue_size", &self.queue_size())
            .field("stopping", &self.stopping.load(Ordering::SeqCst))
            .finish()
    }
}
