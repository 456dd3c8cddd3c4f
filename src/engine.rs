use std::time::{Duration, Instant};

use crate::foundation::core::{GridSize, IterationCount, Viewport};
use crate::foundation::error::MandelResult;
use crate::merge::{OutputGrid, ResultMerger};
use crate::plan::{TileJob, plan_tiles};
use crate::pool::{
    PoolConfiguration, PoolStats, PoolStrategy, TileExecutor, TileKernel, await_all,
    create_executor_with_kernel, escape_kernel,
};

/// Everything a run needs besides the image dimensions.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Iteration cap per pixel.
    pub max_iter: IterationCount,
    /// Pixel to complex-plane mapping.
    pub viewport: Viewport,
    /// Pool shape and band count.
    pub pool: PoolConfiguration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iter: 570,
            viewport: Viewport::default(),
            pool: PoolConfiguration::default(),
        }
    }
}

/// Instrumentation for one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunStats {
    /// Strategy that serviced the run.
    pub strategy: PoolStrategy,
    /// Number of tiles planned and merged.
    pub tiles: usize,
    /// `true` when the cut count was degenerate and one whole-image tile was used.
    pub fell_back: bool,
    /// Executor counters.
    pub pool: PoolStats,
    /// Wall time from planning to pool shutdown.
    pub elapsed: Duration,
}

/// Compute the escape-time grid for a `width` x `height` image.
///
/// Plans row bands, dispatches them to the pool described by `config.pool`, waits for all
/// tiles, merges them, and shuts the pool down. Any worker fault aborts the run; a partial grid
/// is never returned.
pub fn run_once(width: u32, height: u32, config: &RunConfig) -> MandelResult<OutputGrid> {
    run_once_with_stats(width, height, config).map(|(grid, _)| grid)
}

/// Like [`run_once`], also returning [`RunStats`].
#[tracing::instrument(
    level = "debug",
    skip(config),
    fields(
        strategy = %config.pool.strategy,
        cuts = config.pool.cut_count,
        max_iter = config.max_iter
    )
)]
pub fn run_once_with_stats(
    width: u32,
    height: u32,
    config: &RunConfig,
) -> MandelResult<(OutputGrid, RunStats)> {
    config.viewport.validate()?;
    run_with_kernel(width, height, config, escape_kernel(config.viewport))
}

pub(crate) fn run_with_kernel(
    width: u32,
    height: u32,
    config: &RunConfig,
    kernel: TileKernel,
) -> MandelResult<(OutputGrid, RunStats)> {
    let started = Instant::now();
    let size = GridSize::new(width, height)?;
    let plan = plan_tiles(size, config.pool.cut_count, config.max_iter);

    let mut executor = create_executor_with_kernel(&config.pool, kernel)?;
    let computed = dispatch(executor.as_mut(), &plan.jobs, size, config.max_iter);
    // Shut down on both paths; a dispatch error takes precedence over a shutdown error.
    let shut = executor.shutdown();
    let grid = computed?;
    shut?;

    let stats = RunStats {
        strategy: executor.strategy(),
        tiles: plan.jobs.len(),
        fell_back: plan.fell_back,
        pool: executor.stats(),
        elapsed: started.elapsed(),
    };
    tracing::debug!(
        tiles = stats.tiles,
        elapsed_ms = stats.elapsed.as_secs_f64() * 1e3,
        "run finished"
    );
    Ok((grid, stats))
}

fn dispatch(
    executor: &mut dyn TileExecutor,
    jobs: &[TileJob],
    size: GridSize,
    max_iter: IterationCount,
) -> MandelResult<OutputGrid> {
    let mut handles = Vec::with_capacity(jobs.len());
    for job in jobs {
        handles.push(executor.submit(*job)?);
    }
    let results = await_all(handles)?;

    let mut merger = ResultMerger::new(size, max_iter);
    for r in results {
        merger.merge(r)?;
    }
    merger.finish()
}

#[cfg(test)]
#[path = "../tests/unit/engine.rs"]
mod tests;
