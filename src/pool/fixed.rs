use std::thread::JoinHandle;

use crossbeam::channel::{Receiver, Sender, unbounded};

use super::{PoolStats, PoolStrategy, Task, TileExecutor, TileHandle, TileKernel};
use crate::foundation::error::{MandelError, MandelResult};
use crate::plan::TileJob;

/// `threads` long-lived workers pulling from one shared FIFO queue.
///
/// Workers live until the queue's sender is dropped in `shutdown`; they drain whatever is still
/// queued before exiting.
pub(crate) struct FixedPool {
    queue: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    stats: PoolStats,
}

impl FixedPool {
    pub(crate) fn new(threads: usize, kernel: TileKernel) -> MandelResult<Self> {
        if threads == 0 {
            return Err(MandelError::validation("fixed pool threads must be >= 1"));
        }

        let (tx, rx) = unbounded::<Task>();
        let mut pool = Self {
            queue: Some(tx),
            workers: Vec::with_capacity(threads),
            stats: PoolStats::default(),
        };
        for i in 0..threads {
            let rx = rx.clone();
            let kernel = kernel.clone();
            // On error `pool` drops here, which joins the workers already started.
            let handle = std::thread::Builder::new()
                .name(format!("mandelpool-fixed-{i}"))
                .spawn(move || worker_loop(rx, kernel))
                .map_err(|e| {
                    MandelError::Other(anyhow::anyhow!("failed to spawn fixed pool worker: {e}"))
                })?;
            pool.workers.push(handle);
            pool.stats.threads_started += 1;
        }
        tracing::debug!(threads, "fixed pool started");
        Ok(pool)
    }
}

fn worker_loop(rx: Receiver<Task>, kernel: TileKernel) {
    while let Ok(task) = rx.recv() {
        task.run(&kernel);
    }
}

impl TileExecutor for FixedPool {
    fn strategy(&self) -> PoolStrategy {
        PoolStrategy::Fixed
    }

    fn submit(&mut self, job: TileJob) -> MandelResult<TileHandle> {
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| MandelError::pool_shutdown("fixed pool no longer accepts jobs"))?;
        let (handle, reply) = TileHandle::pending(job);
        queue
            .send(Task { job, reply })
            .map_err(|_| MandelError::pool_shutdown("fixed pool workers have exited"))?;
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
        tracing::debug!("fixed pool shut down");
        if panicked > 0 {
            return Err(MandelError::Other(anyhow::anyhow!(
                "{panicked} fixed pool worker(s) panicked outside a tile"
            )));
        }
        Ok(())
    }

    fn is_shut_down(&self) -> bool {
        self.queue.is_none()
    }

    fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl Drop for FixedPool {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
