/// Convenience result type used across mandelpool.
pub type MandelResult<T> = Result<T, MandelError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum MandelError {
    /// Invalid caller-provided dimensions or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested partition is degenerate (zero cuts, or more cuts than rows).
    ///
    /// [`plan_tiles`](crate::plan_tiles) recovers from this by planning a single whole-image
    /// tile; only [`try_plan_tiles`](crate::try_plan_tiles) surfaces it.
    #[error("planning error: {0}")]
    Planning(String),

    /// A worker failed while executing a tile.
    #[error("worker fault on rows {row_start}..{row_end}: {message}")]
    WorkerFault {
        /// First row of the failed tile.
        row_start: u32,
        /// Exclusive end row of the failed tile.
        row_end: u32,
        /// Panic payload or disconnect reason.
        message: String,
    },

    /// A tile result would write a pixel twice, outside the grid, or left a pixel unwritten.
    #[error("merge invariant violated: {0}")]
    MergeInvariant(String),

    /// Work was submitted to an executor after it was shut down.
    #[error("pool is shut down: {0}")]
    PoolShutdown(String),

    /// Errors when serializing or deserializing sweep plans and reports.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MandelError {
    /// Build a [`MandelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MandelError::Planning`] value.
    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    /// Build a [`MandelError::WorkerFault`] value for the tile spanning `rows`.
    pub fn worker_fault(rows: std::ops::Range<u32>, msg: impl Into<String>) -> Self {
        Self::WorkerFault {
            row_start: rows.start,
            row_end: rows.end,
            message: msg.into(),
        }
    }

    /// Build a [`MandelError::MergeInvariant`] value.
    pub fn merge_invariant(msg: impl Into<String>) -> Self {
        Self::MergeInvariant(msg.into())
    }

    /// Build a [`MandelError::PoolShutdown`] value.
    pub fn pool_shutdown(msg: impl Into<String>) -> Self {
        Self::PoolShutdown(msg.into())
    }

    /// Build a [`MandelError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` for errors that abort a run because a worker misbehaved.
    pub fn is_worker_fault(&self) -> bool {
        matches!(self, Self::WorkerFault { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
