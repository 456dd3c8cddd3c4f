//! mandelpool computes Mandelbrot escape-time grids by cutting the image into row bands,
//! dispatching the bands to a configurable worker pool, and merging the tiles back into one
//! dense grid.
//!
//! The engine entry point is [`run_once`]:
//!
//! - [`plan_tiles`] cuts the image into [`TileJob`]s
//! - a [`TileExecutor`] chosen by [`PoolConfiguration`] computes each tile
//! - [`ResultMerger`] writes every pixel exactly once into an [`OutputGrid`]
//!
//! The grid is bit-identical for every [`PoolStrategy`]; the strategy only changes how long the
//! run takes. [`harness`] measures exactly that.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

mod engine;
mod escape;
/// Timing sweeps over pool variants.
pub mod harness;
mod merge;
mod plan;
mod pool;
mod tile;

pub use crate::foundation::core::{GridSize, IterationCount, Pixel, Viewport};
pub use crate::foundation::error::{MandelError, MandelResult};

pub use crate::engine::{RunConfig, RunStats, run_once, run_once_with_stats};
pub use crate::escape::{compute_iterations, escape_count};
pub use crate::merge::{OutputGrid, ResultMerger, merge_results};
pub use crate::plan::{TileJob, TilePlan, plan_tiles, try_plan_tiles};
pub use crate::pool::{
    PoolConfiguration, PoolStats, PoolStrategy, TileExecutor, TileHandle, await_all,
    create_executor,
};
pub use crate::tile::{TileResult, execute_tile};
