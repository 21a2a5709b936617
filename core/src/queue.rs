//! Execution contexts for parsing and callback delivery.
//!
//! # Design
//! Two explicitly constructed contexts, passed into the dispatcher rather
//! than reached through process-wide statics:
//!
//! - the delivery queue is a single dedicated thread, so every callback of a
//!   session runs on one fixed thread in submission order;
//! - the worker queue is a small pool used only for body parsing, so a slow
//!   parser never blocks delivery or the caller.
//!
//! Threads exit when the owning `Queues` is dropped and the job channels
//! disconnect.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

const DEFAULT_WORKERS: usize = 2;

/// The pair of execution contexts a dispatcher needs.
pub struct Queues {
    worker: WorkerQueue,
    delivery: DeliveryQueue,
}

impl Queues {
    pub fn new() -> Self {
        Self::with_workers(DEFAULT_WORKERS)
    }

    /// Build contexts with a parsing pool of `workers` threads (minimum 1).
    pub fn with_workers(workers: usize) -> Self {
        Self {
            worker: WorkerQueue::new(workers.max(1)),
            delivery: DeliveryQueue::new(),
        }
    }

    pub(crate) fn worker(&self) -> &WorkerQueue {
        &self.worker
    }

    pub(crate) fn delivery(&self) -> &DeliveryQueue {
        &self.delivery
    }
}

impl Default for Queues {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-size pool draining a shared channel; parsing only.
pub(crate) struct WorkerQueue {
    sender: mpsc::Sender<Job>,
}

impl WorkerQueue {
    fn new(count: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        for _ in 0..count {
            let receiver = Arc::clone(&receiver);
            thread::spawn(move || loop {
                let job = match receiver.lock() {
                    Ok(guard) => guard.recv(),
                    Err(_) => break,
                };
                match job {
                    Ok(job) => job(),
                    Err(_) => break,
                }
            });
        }
        Self { sender }
    }

    pub(crate) fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if self.sender.send(Box::new(job)).is_err() {
            log::debug!("worker queue shut down, dropping job");
        }
    }
}

/// One dedicated thread; all callbacks run here, in submission order.
pub(crate) struct DeliveryQueue {
    sender: mpsc::Sender<Job>,
}

impl DeliveryQueue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        thread::spawn(move || {
            while let Ok(job) = receiver.recv() {
                job();
            }
        });
        Self { sender }
    }

    pub(crate) fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if self.sender.send(Box::new(job)).is_err() {
            log::debug!("delivery queue shut down, dropping job");
        }
    }
}
