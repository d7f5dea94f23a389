//! Fixed-size pool of OS worker threads fed from one unbounded FIFO queue.
//!
//! Every scheduled job runs exactly once on exactly one worker. With a single
//! worker, jobs run in submission order. A job that panics is contained on its
//! worker; the worker moves on to the next queued job.
//!
//! ```text
//! schedule() ──> [ unbounded queue ] ──> worker 0..N ──> work(job)
//! shutdown() closes the queue, then joins every worker once it drains.
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, error, warn};

use crate::error::HarnessError;

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub executed: usize,
    pub panicked: usize,
}

#[derive(Debug, Default)]
struct Counters {
    executed: AtomicUsize,
    panicked: AtomicUsize,
}

pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, HarnessError> {
        if size == 0 {
            return Err(HarnessError::InvalidWorkerCount(size));
        }

        let (sender, receiver) = unbounded::<Task>();
        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(size),
            counters: Arc::new(Counters::default()),
            size,
        };

        for worker in 0..size {
            let receiver = receiver.clone();
            let counters = Arc::clone(&pool.counters);
            // On error the partially built pool is dropped, which drains and joins.
            let handle = thread::Builder::new()
                .name(format!("kira-ah-worker-{worker}"))
                .spawn(move || worker_loop(worker, &receiver, &counters))
                .map_err(|err| HarnessError::WorkerSpawn(err.to_string()))?;
            pool.workers.push(handle);
        }
        debug!(workers = size, "worker pool started");
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn schedule<J, F>(&self, job: J, work: F) -> Result<(), HarnessError>
    where
        J: Send + 'static,
        F: FnOnce(J) + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(HarnessError::PoolClosed)?;
        sender
            .send(Box::new(move || work(job)))
            .map_err(|_| HarnessError::PoolClosed)
    }

    pub fn shutdown(mut self) -> PoolStats {
        self.drain();
        self.stats()
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            executed: self.counters.executed.load(Ordering::SeqCst),
            panicked: self.counters.panicked.load(Ordering::SeqCst),
        }
    }

    fn drain(&mut self) {
        // Workers exit once the queue is closed and empty.
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "worker thread terminated abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.drain();
    }
}

fn worker_loop(worker: usize, receiver: &Receiver<Task>, counters: &Counters) {
    while let Ok(task) = receiver.recv() {
        let result = panic::catch_unwind(AssertUnwindSafe(task));
        counters.executed.fetch_add(1, Ordering::SeqCst);
        if let Err(payload) = result {
            counters.panicked.fetch_add(1, Ordering::SeqCst);
            warn!(worker, "job panicked: {}", panic_message(payload.as_ref()));
        }
    }
    debug!(worker, "worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
