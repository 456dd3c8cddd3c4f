use crate::foundation::core::{GridSize, IterationCount};
use crate::foundation::error::{MandelError, MandelResult};

/// One unit of work: a rectangular pixel range plus the iteration cap.
///
/// Rows and columns are half-open (`start..end`) and never empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawTileJob")]
pub struct TileJob {
    row_start: u32,
    row_end: u32,
    col_start: u32,
    col_end: u32,
    max_iter: IterationCount,
}

/// Unchecked wire form of [`TileJob`]; converted through [`TileJob::new`].
#[derive(serde::Deserialize)]
struct RawTileJob {
    row_start: u32,
    row_end: u32,
    col_start: u32,
    col_end: u32,
    max_iter: IterationCount,
}

impl TryFrom<RawTileJob> for TileJob {
    type Error = MandelError;

    fn try_from(raw: RawTileJob) -> MandelResult<Self> {
        Self::new(
            raw.row_start..raw.row_end,
            raw.col_start..raw.col_end,
            raw.max_iter,
        )
    }
}

impl TileJob {
    /// Create a validated job; both ranges must be non-empty.
    pub fn new(
        rows: std::ops::Range<u32>,
        cols: std::ops::Range<u32>,
        max_iter: IterationCount,
    ) -> MandelResult<Self> {
        if rows.start >= rows.end || cols.start >= cols.end {
            return Err(MandelError::validation(format!(
                "tile must cover at least one pixel (rows {rows:?}, cols {cols:?})"
            )));
        }
        Ok(Self {
            row_start: rows.start,
            row_end: rows.end,
            col_start: cols.start,
            col_end: cols.end,
            max_iter,
        })
    }

    /// Full-width band covering `rows` of `size`.
    pub fn band(
        size: GridSize,
        rows: std::ops::Range<u32>,
        max_iter: IterationCount,
    ) -> MandelResult<Self> {
        Self::new(rows, 0..size.width, max_iter)
    }

    /// Row range `row_start..row_end`.
    pub fn rows(&self) -> std::ops::Range<u32> {
        self.row_start..self.row_end
    }

    /// Column range `col_start..col_end`.
    pub fn cols(&self) -> std::ops::Range<u32> {
        self.col_start..self.col_end
    }

    /// Iteration cap for every pixel of the tile.
    pub fn max_iter(&self) -> IterationCount {
        self.max_iter
    }

    /// Tile width in pixels.
    pub fn width(&self) -> u32 {
        self.col_end - self.col_start
    }

    /// Tile height in pixels.
    pub fn height(&self) -> u32 {
        self.row_end - self.row_start
    }

    /// Number of pixels in the tile.
    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

/// Ordered list of tile jobs for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TilePlan {
    /// Jobs in top-to-bottom order.
    pub jobs: Vec<TileJob>,
    /// `true` when the requested cut count was degenerate and the whole image became one tile.
    pub fell_back: bool,
}

/// Split `size` into `cut_count` full-width row bands.
///
/// Each band is `height / cut_count` rows tall; the trailing band also takes the remaining
/// `height % cut_count` rows. Fails with [`MandelError::Planning`] when `cut_count` is zero or
/// larger than the height.
pub fn try_plan_tiles(
    size: GridSize,
    cut_count: u32,
    max_iter: IterationCount,
) -> MandelResult<Vec<TileJob>> {
    if cut_count == 0 {
        return Err(MandelError::planning("cut count must be >= 1"));
    }
    let band = size.height / cut_count;
    if band == 0 {
        return Err(MandelError::planning(format!(
            "cut count {cut_count} exceeds image height {}",
            size.height
        )));
    }

    let mut jobs = Vec::with_capacity(cut_count as usize);
    for i in 0..cut_count {
        let start = i * band;
        let end = if i + 1 == cut_count {
            size.height
        } else {
            start + band
        };
        jobs.push(TileJob::band(size, start..end, max_iter)?);
    }
    Ok(jobs)
}

/// Plan row bands, falling back to a single whole-image tile on a degenerate cut count.
#[tracing::instrument(level = "debug", skip(size), fields(width = size.width, height = size.height))]
pub fn plan_tiles(size: GridSize, cut_count: u32, max_iter: IterationCount) -> TilePlan {
    match try_plan_tiles(size, cut_count, max_iter) {
        Ok(jobs) => TilePlan {
            jobs,
            fell_back: false,
        },
        Err(err) => {
            tracing::warn!(%err, "planning whole image as a single tile");
            let whole = TileJob {
                row_start: 0,
                row_end: size.height,
                col_start: 0,
                col_end: size.width,
                max_iter,
            };
            TilePlan {
                jobs: vec![whole],
                fell_back: true,
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/plan.rs"]
mod tests;
