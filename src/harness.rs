//! Timing sweeps over iteration caps, thread counts and pool variants.
//!
//! The harness sits outside the engine: it only calls [`run_once`] and measures wall time around
//! it. Timings go into a caller-owned [`TimingAccumulator`], so repeated sweeps can share or
//! separate their samples as the caller sees fit.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::engine::{RunConfig, run_once, run_once_with_stats};
use crate::foundation::core::{IterationCount, Viewport};
use crate::foundation::error::{MandelError, MandelResult};
use crate::pool::{PoolConfiguration, PoolStats, PoolStrategy};

/// How many row bands a sweep variant cuts the image into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutPolicy {
    /// One tile covering the whole image.
    Whole,
    /// A fixed number of bands regardless of thread count.
    Fixed(u32),
    /// `threads * k` bands.
    PerThread(u32),
}

impl CutPolicy {
    /// Band count for a sweep cell with `threads` threads.
    pub fn cut_count(self, threads: usize) -> u32 {
        match self {
            CutPolicy::Whole => 1,
            CutPolicy::Fixed(n) => n,
            CutPolicy::PerThread(k) => u32::try_from(threads)
                .unwrap_or(u32::MAX)
                .saturating_mul(k),
        }
    }
}

/// One named pool configuration measured in every sweep cell.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SweepVariant {
    /// Report label; unique within a plan.
    pub name: String,
    /// Executor to use.
    pub strategy: PoolStrategy,
    /// Band count policy.
    pub cut: CutPolicy,
    /// Pin the pool size instead of using the cell's thread count.
    #[serde(default)]
    pub pool_threads: Option<usize>,
}

impl SweepVariant {
    /// Create a variant that follows the cell's thread count.
    pub fn new(name: impl Into<String>, strategy: PoolStrategy, cut: CutPolicy) -> Self {
        Self {
            name: name.into(),
            strategy,
            cut,
            pool_threads: None,
        }
    }

    /// Pin the pool to `threads` workers.
    pub fn with_pool_threads(mut self, threads: usize) -> Self {
        self.pool_threads = Some(threads);
        self
    }

    /// The six variants of the classic benchmark.
    ///
    /// Band counts use ten bands per thread, as the classic benchmark did.
    pub fn classic() -> Vec<Self> {
        vec![
            Self::new("single_no_cut", PoolStrategy::Fixed, CutPolicy::Whole).with_pool_threads(1),
            Self::new("single_cut", PoolStrategy::Fixed, CutPolicy::PerThread(10))
                .with_pool_threads(1),
            Self::new("fixed", PoolStrategy::Fixed, CutPolicy::PerThread(10)),
            Self::new(
                "work_stealing",
                PoolStrategy::WorkStealing,
                CutPolicy::PerThread(10),
            ),
            Self::new("cached", PoolStrategy::Elastic, CutPolicy::PerThread(10)),
            Self::new("no_executor", PoolStrategy::Sequential, CutPolicy::Whole),
        ]
    }

    fn pool_config(&self, threads: usize, idle_timeout_ms: u64) -> PoolConfiguration {
        PoolConfiguration {
            strategy: self.strategy,
            concurrency: self.pool_threads.unwrap_or(threads),
            cut_count: self.cut.cut_count(threads),
            elastic_idle_timeout_ms: idle_timeout_ms,
        }
    }
}

/// Full description of a sweep.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SweepPlan {
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
    /// Pixel to complex-plane mapping.
    pub viewport: Viewport,
    /// Iteration caps to sweep.
    pub max_iters: Vec<IterationCount>,
    /// Thread counts to sweep.
    pub thread_counts: Vec<usize>,
    /// Pool variants measured in every cell.
    pub variants: Vec<SweepVariant>,
    /// Untimed runs per variant before measuring.
    pub warmup: u32,
    /// Timed runs per variant.
    pub repeats: u32,
    /// Idle timeout handed to elastic pools.
    pub elastic_idle_timeout_ms: u64,
}

impl Default for SweepPlan {
    fn default() -> Self {
        Self::classic()
    }
}

impl SweepPlan {
    /// 800x600 at zoom 150, caps 555 and 5550, 10 and 60 threads, five timed runs.
    pub fn classic() -> Self {
        Self {
            width: 800,
            height: 600,
            viewport: Viewport::default(),
            max_iters: vec![555, 5550],
            thread_counts: vec![10, 60],
            variants: SweepVariant::classic(),
            warmup: 0,
            repeats: 5,
            elastic_idle_timeout_ms: PoolConfiguration::default().elastic_idle_timeout_ms,
        }
    }

    /// Parse a plan from JSON; missing fields take their classic values.
    pub fn from_json_str(s: &str) -> MandelResult<Self> {
        let plan: Self = serde_json::from_str(s).map_err(|e| MandelError::serde(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Read and parse a JSON plan file.
    pub fn from_path(path: impl AsRef<Path>) -> MandelResult<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|e| {
            MandelError::Other(anyhow::anyhow!(
                "read sweep plan '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&s)
    }

    /// Check dimensions, list contents and variant names.
    pub fn validate(&self) -> MandelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MandelError::validation("sweep width/height must be > 0"));
        }
        self.viewport.validate()?;
        if self.max_iters.is_empty() || self.thread_counts.is_empty() || self.variants.is_empty()
        {
            return Err(MandelError::validation(
                "sweep needs at least one max_iter, thread count and variant",
            ));
        }
        if self.thread_counts.contains(&0) {
            return Err(MandelError::validation("sweep thread counts must be >= 1"));
        }
        if self.repeats == 0 {
            return Err(MandelError::validation("sweep repeats must be >= 1"));
        }
        let mut seen = std::collections::BTreeSet::new();
        for v in &self.variants {
            if !seen.insert(v.name.as_str()) {
                return Err(MandelError::validation(format!(
                    "duplicate sweep variant name '{}'",
                    v.name
                )));
            }
        }
        Ok(())
    }
}

/// Identifies one sweep cell.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct CellKey {
    /// Iteration cap.
    pub max_iter: IterationCount,
    /// Thread count of the cell.
    pub threads: usize,
    /// Variant name.
    pub variant: String,
}

/// Summary statistics over a cell's samples, in nanoseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct TimingSummary {
    /// Number of samples.
    pub runs: usize,
    /// Arithmetic mean.
    pub mean_ns: u64,
    /// Fastest sample.
    pub min_ns: u64,
    /// Median (nearest rank).
    pub p50_ns: u64,
    /// 90th percentile (nearest rank).
    pub p90_ns: u64,
    /// Slowest sample.
    pub max_ns: u64,
}

/// Caller-owned store of run durations keyed by sweep cell.
#[derive(Clone, Debug, Default)]
pub struct TimingAccumulator {
    samples: BTreeMap<CellKey, Vec<Duration>>,
}

impl TimingAccumulator {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample to `key`.
    pub fn record(&mut self, key: CellKey, elapsed: Duration) {
        self.samples.entry(key).or_default().push(elapsed);
    }

    /// Raw samples for `key`, in recording order.
    pub fn samples(&self, key: &CellKey) -> &[Duration] {
        self.samples.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cells that have at least one sample.
    pub fn cells(&self) -> impl Iterator<Item = &CellKey> {
        self.samples.keys()
    }

    /// Summarize `key`, or `None` without samples.
    pub fn summary(&self, key: &CellKey) -> Option<TimingSummary> {
        let v = self.samples.get(key)?;
        if v.is_empty() {
            return None;
        }
        let mut sorted = v.iter().map(|d| nanos(*d)).collect::<Vec<_>>();
        sorted.sort_unstable();
        let total: u128 = sorted.iter().map(|&n| u128::from(n)).sum();
        let mean = u64::try_from(total / sorted.len() as u128).unwrap_or(u64::MAX);
        Some(TimingSummary {
            runs: sorted.len(),
            mean_ns: mean,
            min_ns: sorted[0],
            p50_ns: percentile(&sorted, 0.50),
            p90_ns: percentile(&sorted, 0.90),
            max_ns: sorted[sorted.len() - 1],
        })
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Nearest-rank percentile over sorted, non-empty samples.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    let n = sorted.len();
    let rank = (p * (n as f64)).ceil().clamp(1.0, n as f64) as usize;
    sorted[rank - 1]
}

/// One report line: a variant measured in one cell.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SweepRow {
    /// Iteration cap.
    pub max_iter: IterationCount,
    /// Thread count of the cell.
    pub threads: usize,
    /// Variant name.
    pub variant: String,
    /// Executor used.
    pub strategy: PoolStrategy,
    /// Tiles per run.
    pub tiles: usize,
    /// Executor counters from the last timed run.
    pub pool: PoolStats,
    /// Timing summary over the timed runs.
    pub timing: TimingSummary,
}

/// Result of [`run_sweep`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
    /// Rows in sweep order.
    pub rows: Vec<SweepRow>,
}

impl SweepReport {
    /// Plain-text report: a header per cell and one `name  mean_ns` line per variant.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let mut cell = None;
        for row in &self.rows {
            if cell != Some((row.max_iter, row.threads)) {
                cell = Some((row.max_iter, row.threads));
                out.push_str(&format!(
                    "Max iterations: {}\nThreads: {}\n",
                    row.max_iter, row.threads
                ));
            }
            out.push_str(&format!("{:<24}{}\n", row.variant, row.timing.mean_ns));
        }
        out
    }

    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> MandelResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MandelError::serde(e.to_string()))
    }
}

/// Run every cell of `plan`, recording timed runs into `acc`.
///
/// Each run is timed around the engine call; warmup runs are not recorded. Samples already in
/// `acc` for the same cell are part of the reported summary.
#[tracing::instrument(skip_all, fields(width = plan.width, height = plan.height))]
pub fn run_sweep(plan: &SweepPlan, acc: &mut TimingAccumulator) -> MandelResult<SweepReport> {
    plan.validate()?;

    let mut rows = Vec::new();
    for &max_iter in &plan.max_iters {
        for &threads in &plan.thread_counts {
            tracing::info!(max_iter, threads, "sweep cell");
            for variant in &plan.variants {
                let config = RunConfig {
                    max_iter,
                    viewport: plan.viewport,
                    pool: variant.pool_config(threads, plan.elastic_idle_timeout_ms),
                };
                for _ in 0..plan.warmup {
                    run_once(plan.width, plan.height, &config)?;
                }

                let key = CellKey {
                    max_iter,
                    threads,
                    variant: variant.name.clone(),
                };
                let mut last = None;
                for _ in 0..plan.repeats {
                    let t0 = Instant::now();
                    let (_, stats) = run_once_with_stats(plan.width, plan.height, &config)?;
                    acc.record(key.clone(), t0.elapsed());
                    last = Some(stats);
                }

                let (Some(last), Some(timing)) = (last, acc.summary(&key)) else {
                    return Err(MandelError::Other(anyhow::anyhow!(
                        "no samples recorded for '{}' (unexpected)",
                        variant.name
                    )));
                };
                tracing::info!(
                    variant = %variant.name,
                    mean_ms = timing.mean_ns as f64 / 1e6,
                    "sweep variant done"
                );
                rows.push(SweepRow {
                    max_iter,
                    threads,
                    variant: variant.name.clone(),
                    strategy: variant.strategy,
                    tiles: last.tiles,
                    pool: last.pool,
                    timing,
                });
            }
        }
    }

    Ok(SweepReport {
        width: plan.width,
        height: plan.height,
        rows,
    })
}

#[cfg(test)]
#[path = "../tests/unit/harness.rs"]
mod tests;
