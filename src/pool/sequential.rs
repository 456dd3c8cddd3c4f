use super::{PoolStats, PoolStrategy, TileExecutor, TileHandle, TileKernel, run_guarded};
use crate::foundation::error::{MandelError, MandelResult};
use crate::plan::TileJob;

/// Baseline executor: computes each job on the calling thread inside `submit`.
pub(crate) struct SequentialExecutor {
    kernel: TileKernel,
    shut_down: bool,
    stats: PoolStats,
}

impl SequentialExecutor {
    pub(crate) fn new(kernel: TileKernel) -> Self {
        Self {
            kernel,
            shut_down: false,
            stats: PoolStats::default(),
        }
    }
}

impl TileExecutor for SequentialExecutor {
    fn strategy(&self) -> PoolStrategy {
        PoolStrategy::Sequential
    }

    fn submit(&mut self, job: TileJob) -> MandelResult<TileHandle> {
        if self.shut_down {
            return Err(MandelError::pool_shutdown(
                "sequential executor no longer accepts jobs",
            ));
        }
        self.stats.jobs_submitted += 1;
        Ok(TileHandle::ready(job, run_guarded(&self.kernel, &job)))
    }

    fn shutdown(&mut self) -> MandelResult<()> {
        self.shut_down = true;
        Ok(())
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn stats(&self) -> PoolStats {
        self.stats
    }
}
