use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam::sync::WaitGroup;

use super::{PoolStats, PoolStrategy, Task, TileExecutor, TileHandle, TileKernel};
use crate::foundation::error::{MandelError, MandelResult};
use crate::plan::TileJob;

/// Dedicated rayon pool; idle workers steal queued tiles from busy ones.
///
/// The worker threads are spawned through rayon's spawn handler so that `shutdown` can join them
/// after the pool is dropped.
pub(crate) struct WorkStealingPool {
    pool: Option<rayon::ThreadPool>,
    workers: Vec<JoinHandle<()>>,
    live: Arc<AtomicUsize>,
    in_flight: Option<WaitGroup>,
    kernel: TileKernel,
    stats: PoolStats,
}

impl WorkStealingPool {
    pub(crate) fn new(parallelism: usize, kernel: TileKernel) -> MandelResult<Self> {
        let live = Arc::new(AtomicUsize::new(0));
        let (pool, workers) = build_thread_pool(parallelism, &live)?;
        tracing::debug!(threads = workers.len(), "work-stealing pool started");
        Ok(Self {
            pool: Some(pool),
            stats: PoolStats {
                threads_started: workers.len() as u64,
                ..PoolStats::default()
            },
            workers,
            live,
            in_flight: Some(WaitGroup::new()),
            kernel,
        })
    }

    /// Worker threads that have not exited yet.
    #[cfg(test)]
    pub(crate) fn live_workers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

fn build_thread_pool(
    parallelism: usize,
    live: &Arc<AtomicUsize>,
) -> MandelResult<(rayon::ThreadPool, Vec<JoinHandle<()>>)> {
    if parallelism == 0 {
        return Err(MandelError::validation(
            "work-stealing parallelism must be >= 1",
        ));
    }

    let mut workers = Vec::with_capacity(parallelism);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism)
        .thread_name(|i| format!("mandelpool-steal-{i}"))
        .spawn_handler(|thread| {
            let mut b = std::thread::Builder::new();
            if let Some(name) = thread.name() {
                b = b.name(name.to_owned());
            }
            if let Some(size) = thread.stack_size() {
                b = b.stack_size(size);
            }
            live.fetch_add(1, Ordering::AcqRel);
            let exiting = live.clone();
            let spawned = b.spawn(move || {
                thread.run();
                exiting.fetch_sub(1, Ordering::AcqRel);
            });
            match spawned {
                Ok(h) => {
                    workers.push(h);
                    Ok(())
                }
                Err(e) => {
                    live.fetch_sub(1, Ordering::AcqRel);
                    Err(e)
                }
            }
        })
        .build()
        .map_err(|e| {
            MandelError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}"))
        })?;
    Ok((pool, workers))
}

impl TileExecutor for WorkStealingPool {
    fn strategy(&self) -> PoolStrategy {
        PoolStrategy::WorkStealing
    }

    fn submit(&mut self, job: TileJob) -> MandelResult<TileHandle> {
        let (Some(pool), Some(in_flight)) = (self.pool.as_ref(), self.in_flight.as_ref()) else {
            return Err(MandelError::pool_shutdown(
                "work-stealing pool no longer accepts jobs",
            ));
        };

        let (handle, reply) = TileHandle::pending(job);
        let kernel = self.kernel.clone();
        let guard = in_flight.clone();
        pool.spawn(move || {
            // Released on unwind too, so `shutdown` never waits on a task that died.
            let _in_flight = guard;
            Task { job, reply }.run(&kernel);
        });
        self.stats.jobs_submitted += 1;
        Ok(handle)
    }

    fn shutdown(&mut self) -> MandelResult<()> {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.wait();
        }
        // Dropping the pool only tells its threads to exit; join them before returning.
        drop(self.pool.take());
        if self.workers.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            live = self.live.load(Ordering::Acquire),
            "joining work-stealing workers"
        );
        let mut panicked = 0usize;
        for w in self.workers.drain(..) {
            if w.join().is_err() {
                panicked += 1;
            }
        }
        tracing::debug!("work-stealing pool shut down");
        if panicked > 0 {
            return Err(MandelError::Other(anyhow::anyhow!(
                "{panicked} work-stealing worker(s) panicked outside a tile"
            )));
        }
        Ok(())
    }

    fn is_shut_down(&self) -> bool {
        self.pool.is_none()
    }

    fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl Drop for WorkStealingPool {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
