//! Worker pools that execute [`TileJob`]s.
//!
//! Every pool implements [`TileExecutor`]: jobs go in through [`TileExecutor::submit`], each
//! submission yields a [`TileHandle`], and [`await_all`] collects the results in completion
//! order. Pools release their workers in [`TileExecutor::shutdown`] and again on drop, so a run
//! that bails out early still joins its threads.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{Receiver, Select, Sender, bounded};

use crate::foundation::core::Viewport;
use crate::foundation::error::{MandelError, MandelResult};
use crate::plan::TileJob;
use crate::tile::{TileResult, execute_tile};

pub(crate) mod elastic;
pub(crate) mod fixed;
pub(crate) mod sequential;
pub(crate) mod work_stealing;

/// Policy governing how many workers exist and how jobs reach them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStrategy {
    /// Every job runs on the calling thread at submission.
    Sequential,
    /// Exactly `concurrency` long-lived threads pulling from one shared queue.
    Fixed,
    /// Threads spawned on demand and retired after an idle timeout.
    Elastic,
    /// `concurrency` rayon workers with per-worker deques and stealing.
    WorkStealing,
}

impl PoolStrategy {
    /// All strategies, in baseline-first order.
    pub const ALL: [PoolStrategy; 4] = [
        PoolStrategy::Sequential,
        PoolStrategy::Fixed,
        PoolStrategy::Elastic,
        PoolStrategy::WorkStealing,
    ];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            PoolStrategy::Sequential => "sequential",
            PoolStrategy::Fixed => "fixed",
            PoolStrategy::Elastic => "elastic",
            PoolStrategy::WorkStealing => "work_stealing",
        }
    }

    /// Return `true` when the strategy reads [`PoolConfiguration::concurrency`].
    pub fn uses_concurrency(self) -> bool {
        matches!(self, PoolStrategy::Fixed | PoolStrategy::WorkStealing)
    }
}

impl std::fmt::Display for PoolStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pool shape and partition settings for one run.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PoolConfiguration {
    /// Which executor services the jobs.
    pub strategy: PoolStrategy,
    /// Thread count (fixed) or parallelism (work-stealing). Ignored otherwise.
    pub concurrency: usize,
    /// Number of row bands to cut the image into.
    pub cut_count: u32,
    /// Idle time after which an elastic worker retires.
    pub elastic_idle_timeout_ms: u64,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            strategy: PoolStrategy::Sequential,
            concurrency: 1,
            cut_count: 1,
            elastic_idle_timeout_ms: 60_000,
        }
    }
}

impl PoolConfiguration {
    /// Single-threaded baseline.
    pub fn sequential(cut_count: u32) -> Self {
        Self {
            strategy: PoolStrategy::Sequential,
            cut_count,
            ..Self::default()
        }
    }

    /// Fixed pool of `threads` workers.
    pub fn fixed(threads: usize, cut_count: u32) -> Self {
        Self {
            strategy: PoolStrategy::Fixed,
            concurrency: threads,
            cut_count,
            ..Self::default()
        }
    }

    /// Elastic pool with the default idle timeout.
    pub fn elastic(cut_count: u32) -> Self {
        Self {
            strategy: PoolStrategy::Elastic,
            cut_count,
            ..Self::default()
        }
    }

    /// Work-stealing pool with `parallelism` workers.
    pub fn work_stealing(parallelism: usize, cut_count: u32) -> Self {
        Self {
            strategy: PoolStrategy::WorkStealing,
            concurrency: parallelism,
            cut_count,
            ..Self::default()
        }
    }

    /// Check the settings the chosen strategy depends on.
    pub fn validate(&self) -> MandelResult<()> {
        if self.strategy.uses_concurrency() && self.concurrency == 0 {
            return Err(MandelError::validation(format!(
                "{} pool concurrency must be >= 1",
                self.strategy
            )));
        }
        if self.strategy == PoolStrategy::Elastic && self.elastic_idle_timeout_ms == 0 {
            return Err(MandelError::validation(
                "elastic pool idle timeout must be >= 1ms",
            ));
        }
        Ok(())
    }

    pub(crate) fn elastic_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.elastic_idle_timeout_ms)
    }
}

/// Counters describing what an executor did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    /// Jobs accepted by `submit`.
    pub jobs_submitted: u64,
    /// Worker threads started over the executor's lifetime.
    pub threads_started: u64,
    /// Worker threads that exited early because they sat idle (elastic pool only).
    pub threads_retired: u64,
}

/// Pending result of one submitted [`TileJob`].
#[derive(Debug)]
pub struct TileHandle {
    job: TileJob,
    rx: Receiver<MandelResult<TileResult>>,
}

impl TileHandle {
    /// Handle whose reply is sent later through the returned sender.
    pub(crate) fn pending(job: TileJob) -> (Self, Sender<MandelResult<TileResult>>) {
        let (tx, rx) = bounded(1);
        (Self { job, rx }, tx)
    }

    /// Handle that is already resolved.
    pub(crate) fn ready(job: TileJob, result: MandelResult<TileResult>) -> Self {
        let (handle, tx) = Self::pending(job);
        // Capacity 1 and the receiver is alive, so this cannot fail.
        let _ = tx.send(result);
        handle
    }

    /// The job this handle tracks.
    pub fn job(&self) -> &TileJob {
        &self.job
    }

    /// Block until the tile finishes.
    pub fn wait(self) -> MandelResult<TileResult> {
        self.rx.recv().unwrap_or_else(|_| Err(lost_reply(&self.job)))
    }
}

/// A pool of workers that executes tile jobs.
pub trait TileExecutor: Send {
    /// The strategy this executor implements.
    fn strategy(&self) -> PoolStrategy;

    /// Queue `job` for execution. Does not wait for it to finish.
    fn submit(&mut self, job: TileJob) -> MandelResult<TileHandle>;

    /// Stop accepting jobs, let in-flight jobs finish, and release every worker.
    ///
    /// Calling it again is a no-op.
    fn shutdown(&mut self) -> MandelResult<()>;

    /// Return `true` once [`TileExecutor::shutdown`] has run.
    fn is_shut_down(&self) -> bool;

    /// Lifetime counters.
    fn stats(&self) -> PoolStats;
}

/// Function that turns a job into its result on a worker.
pub(crate) type TileKernel = Arc<dyn Fn(&TileJob) -> TileResult + Send + Sync>;

pub(crate) fn escape_kernel(view: Viewport) -> TileKernel {
    Arc::new(move |job: &TileJob| execute_tile(job, &view))
}

/// Build the executor selected by `config`, computing tiles under `view`.
pub fn create_executor(
    config: &PoolConfiguration,
    view: Viewport,
) -> MandelResult<Box<dyn TileExecutor>> {
    create_executor_with_kernel(config, escape_kernel(view))
}

pub(crate) fn create_executor_with_kernel(
    config: &PoolConfiguration,
    kernel: TileKernel,
) -> MandelResult<Box<dyn TileExecutor>> {
    config.validate()?;
    Ok(match config.strategy {
        PoolStrategy::Sequential => Box::new(sequential::SequentialExecutor::new(kernel)),
        PoolStrategy::Fixed => Box::new(fixed::FixedPool::new(config.concurrency, kernel)?),
        PoolStrategy::Elastic => Box::new(elastic::ElasticPool::new(
            config.elastic_idle_timeout(),
            kernel,
        )),
        PoolStrategy::WorkStealing => Box::new(work_stealing::WorkStealingPool::new(
            config.concurrency,
            kernel,
        )?),
    })
}

/// Wait for every handle, returning results in completion order.
///
/// Returns the first fault as soon as it arrives, without waiting for the remaining tiles.
pub fn await_all(handles: Vec<TileHandle>) -> MandelResult<Vec<TileResult>> {
    if handles.is_empty() {
        return Ok(Vec::new());
    }

    let mut sel = Select::new();
    for h in &handles {
        sel.recv(&h.rx);
    }

    let mut out = Vec::with_capacity(handles.len());
    while out.len() < handles.len() {
        let oper = sel.select();
        let i = oper.index();
        let msg = oper.recv(&handles[i].rx);
        sel.remove(i);
        match msg {
            Ok(Ok(result)) => out.push(result),
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err(lost_reply(&handles[i].job)),
        }
    }
    Ok(out)
}

/// Run the kernel, converting a panic into [`MandelError::WorkerFault`].
pub(crate) fn run_guarded(kernel: &TileKernel, job: &TileJob) -> MandelResult<TileResult> {
    catch_unwind(AssertUnwindSafe(|| kernel(job)))
        .map_err(|payload| MandelError::worker_fault(job.rows(), panic_message(&*payload)))
}

/// A queued job together with the channel its result goes back on.
pub(crate) struct Task {
    pub(crate) job: TileJob,
    pub(crate) reply: Sender<MandelResult<TileResult>>,
}

impl Task {
    pub(crate) fn run(self, kernel: &TileKernel) {
        // The handle may already be gone when the caller aborted the run.
        let _ = self.reply.send(run_guarded(kernel, &self.job));
    }
}

fn lost_reply(job: &TileJob) -> MandelError {
    MandelError::worker_fault(job.rows(), "worker exited without reporting a result")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pool.rs"]
mod tests;
