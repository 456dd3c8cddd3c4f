use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use super::{
    PoolStats, PoolStrategy, Task, TileExecutor, TileHandle, TileKernel, run_guarded,
};
use crate::foundation::error::{MandelError, MandelResult};
use crate::plan::TileJob;

/// Book-keeping shared between the pool and its workers.
///
/// `idle` counts workers blocked in `recv` that no submitter has claimed yet. A submitter that
/// finds an unclaimed idle worker decrements it and relies on that worker to pick the job up;
/// otherwise it spawns a new thread. A worker whose idle wait times out may only retire by
/// claiming a slot itself, so a job is never left in the queue without a worker to run it.
#[derive(Debug, Default)]
struct Shared {
    idle: AtomicUsize,
    live: AtomicUsize,
    retired: AtomicU64,
}

impl Shared {
    fn try_claim_idle(&self) -> bool {
        self.idle
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Unbounded pool that grows on demand and retires idle threads after a timeout.
pub(crate) struct ElasticPool {
    queue: Option<Sender<Task>>,
    rx: Receiver<Task>,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    kernel: TileKernel,
    idle_timeout: Duration,
    stats: PoolStats,
}

impl ElasticPool {
    pub(crate) fn new(idle_timeout: Duration, kernel: TileKernel) -> Self {
        let (tx, rx) = unbounded::<Task>();
        Self {
            queue: Some(tx),
            rx,
            shared: Arc::new(Shared::default()),
            workers: Vec::new(),
            kernel,
            idle_timeout,
            stats: PoolStats::default(),
        }
    }

    /// Workers currently alive (busy or idle).
    #[cfg(test)]
    pub(crate) fn live_workers(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Workers that retired after their idle timeout.
    fn retired_workers(&self) -> u64 {
        self.shared.retired.load(Ordering::Acquire)
    }

    fn spawn_worker(&mut self) -> MandelResult<()> {
        let id = self.stats.threads_started;
        let rx = self.rx.clone();
        let shared = self.shared.clone();
        let kernel = self.kernel.clone();
        let idle_timeout = self.idle_timeout;

        shared.live.fetch_add(1, Ordering::AcqRel);
        let spawned = std::thread::Builder::new()
            .name(format!("mandelpool-elastic-{id}"))
            .spawn(move || worker_loop(rx, shared, kernel, idle_timeout));
        let handle = match spawned {
            Ok(h) => h,
            Err(e) => {
                self.shared.live.fetch_sub(1, Ordering::AcqRel);
                return Err(MandelError::Other(anyhow::anyhow!(
                    "failed to spawn elastic pool worker: {e}"
                )));
            }
        };

        // Handles of retired threads are dropped here; those threads have already exited.
        self.workers.retain(|w| !w.is_finished());
        self.workers.push(handle);
        self.stats.threads_started += 1;
        Ok(())
    }
}

fn worker_loop(rx: Receiver<Task>, shared: Arc<Shared>, kernel: TileKernel, timeout: Duration) {
    loop {
        match rx.recv_timeout(timeout) {
            Ok(Task { job, reply }) => {
                let result = run_guarded(&kernel, &job);
                // Idle before replying, so a submitter reacting to the reply can claim this worker.
                shared.idle.fetch_add(1, Ordering::AcqRel);
                let _ = reply.send(result);
            }
            Err(RecvTimeoutError::Timeout) => {
                if shared.try_claim_idle() {
                    shared.retired.fetch_add(1, Ordering::AcqRel);
                    tracing::debug!("elastic worker retired after idle timeout");
                    break;
                }
                // Every idle slot is claimed: a job is on its way to some waiting worker.
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    shared.live.fetch_sub(1, Ordering::AcqRel);
}

impl TileExecutor for ElasticPool {
    fn strategy(&self) -> PoolStrategy {
        PoolStrategy::Elastic
    }

    fn submit(&mut self, job: TileJob) -> MandelResult<TileHandle> {
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| MandelError::pool_shutdown("elastic pool no longer accepts jobs"))?;

        let (handle, reply) = TileHandle::pending(job);
        let claimed = self.shared.try_claim_idle();
        queue
            .send(Task { job, reply })
            .map_err(|_| MandelError::pool_shutdown("elastic pool queue disconnected"))?;
        if !claimed {
            self.spawn_worker()?;
        }
        self.stats.jobs_submitted += 1;
        Ok(handle)
    }

    fn shutdown(&mut self) -> MandelResult<()> {
        if self.queue.take().is_none() && self.workers.is_empty() {
            return Ok(());
        }
        let mut panicked = 0usize;
        for w in self.workers.drain(..) {
            if w.join().is_err() {
                panicked += 1;
            }
        }
        tracing::debug!(
            started = self.stats.threads_started,
            retired = self.retired_workers(),
            "elastic pool shut down"
        );
        if panicked > 0 {
            return Err(MandelError::Other(anyhow::anyhow!(
                "{panicked} elastic pool worker(s) panicked outside a tile"
            )));
        }
        Ok(())
    }

    fn is_shut_down(&self) -> bool {
        self.queue.is_none()
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            threads_retired: self.retired_workers(),
            ..self.stats
        }
    }
}

impl Drop for ElasticPool {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
