//! Bounded worker pool for observation sinks.
//!
//! Jobs are routed to one of `workers` lanes by a caller-chosen key. Every
//! lane is a bounded FIFO drained by exactly one thread, so jobs sharing a
//! key run in submission order.
//!
//! ```text
//!   stepping thread ──submit(key)──► lane[key % n] ──► worker n
//!                                    [bounded(cap)]
//! ```

use crate::error::SimError;
use crossbeam::channel::{self, Sender, TrySendError};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A unit of fire-and-forget sink work.
pub type DispatchJob = Box<dyn FnOnce() + Send + 'static>;

/// What `submit` does when the target lane is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait for room (back-pressure on the stepping thread)
    #[default]
    Block,
    
    /// Discard the new job and count it
    DropNewest,
}

/// Pool sizing and overflow behavior.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 256,
            overflow: OverflowPolicy::Block,
        }
    }
}

/// Counters exposed by [`DispatchPool::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub workers: usize,
    pub submitted: u64,
    pub completed: u64,
    pub dropped: u64,
    pub panicked: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    dropped: AtomicU64,
    panicked: AtomicU64,
}

enum LaneMsg {
    Run(DispatchJob),
    Flush(Sender<()>),
}

/// Fixed set of single-threaded FIFO lanes.
pub struct DispatchPool {
    lanes: Vec<Sender<LaneMsg>>,
    workers: Vec<JoinHandle<()>>,
    overflow: OverflowPolicy,
    counters: Arc<Counters>,
}

impl DispatchPool {
    /// Spawns the worker threads.
    pub fn new(config: DispatchConfig) -> Result<Self, SimError> {
        let n = config.workers.max(1);
        let capacity = config.queue_capacity.max(1);
        let counters = Arc::new(Counters::default());
        
        let mut lanes = Vec::with_capacity(n);
        let mut workers = Vec::with_capacity(n);
        for i in 0..n {
            let (tx, rx) = channel::bounded::<LaneMsg>(capacity);
            let counters = Arc::clone(&counters);
            let handle = thread::Builder::new()
                .name(format!("fleetsim-dispatch-{i}"))
                .spawn(move || {
                    for msg in rx.iter() {
                        match msg {
                            LaneMsg::Run(job) => {
                                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                                    counters.panicked.fetch_add(1, Ordering::Relaxed);
                                    tracing::error!(lane = i, "dispatch job panicked");
                                }
                                counters.completed.fetch_add(1, Ordering::Release);
                            }
                            LaneMsg::Flush(ack) => {
                                let _ = ack.send(());
                            }
                        }
                    }
                })?;
            lanes.push(tx);
            workers.push(handle);
        }
        
        tracing::debug!(workers = n, capacity, ?config.overflow, "dispatch pool started");
        
        Ok(Self {
            lanes,
            workers,
            overflow: config.overflow,
            counters,
        })
    }
    
    /// Queues `job` on lane `lane_key % workers`.
    ///
    /// Returns `false` when the job was dropped (full lane under
    /// [`OverflowPolicy::DropNewest`], or pool already shut down).
    pub fn submit(&self, lane_key: u64, job: DispatchJob) -> bool {
        if self.lanes.is_empty() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let lane = (lane_key % self.lanes.len() as u64) as usize;
        let msg = LaneMsg::Run(job);
        
        let accepted = match self.overflow {
            OverflowPolicy::Block => self.lanes[lane].send(msg).is_ok(),
            OverflowPolicy::DropNewest => match self.lanes[lane].try_send(msg) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    if dropped == 1 || dropped % 100 == 0 {
                        tracing::warn!(lane, dropped, "dispatch lane full, dropping job");
                    }
                    return false;
                }
                Err(TrySendError::Disconnected(_)) => false,
            },
        };
        
        if accepted {
            self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }
    
    /// Blocks until every job submitted before this call has run.
    ///
    /// Must not be called from inside a dispatch job.
    pub fn flush(&self) {
        let mut acks = Vec::with_capacity(self.lanes.len());
        for lane in &self.lanes {
            let (tx, rx) = channel::bounded(1);
            if lane.send(LaneMsg::Flush(tx)).is_ok() {
                acks.push(rx);
            }
        }
        for rx in acks {
            let _ = rx.recv();
        }
    }
    
    /// Snapshot of the pool counters.
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            workers: self.lanes.len().max(self.workers.len()),
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Acquire),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }
    
    /// Closes the lanes and joins the workers after they drain.
    pub fn shutdown(&mut self) {
        self.lanes.clear();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("dispatch worker exited abnormally");
            }
        }
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
