use crate::foundation::core::{GridSize, IterationCount, Pixel};
use crate::foundation::error::{MandelError, MandelResult};
use crate::tile::TileResult;

/// Dense row-major grid of iteration counts for a whole image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputGrid {
    size: GridSize,
    max_iter: IterationCount,
    counts: Vec<IterationCount>,
}

impl OutputGrid {
    /// Grid dimensions.
    pub fn size(&self) -> GridSize {
        self.size
    }

    /// Iteration cap the grid was computed with.
    pub fn max_iter(&self) -> IterationCount {
        self.max_iter
    }

    /// All counts, row-major.
    pub fn counts(&self) -> &[IterationCount] {
        &self.counts
    }

    /// Count at `p`, or `None` when out of bounds.
    pub fn get(&self, p: Pixel) -> Option<IterationCount> {
        self.size.index_of(p).map(|i| self.counts[i])
    }

    /// Counts for row `y`.
    pub fn row(&self, y: u32) -> Option<&[IterationCount]> {
        if y >= self.size.height {
            return None;
        }
        let w = self.size.width as usize;
        let start = y as usize * w;
        Some(&self.counts[start..start + w])
    }

    /// Pack counts into an RGB image using `iter | (iter << 8)` as a 24-bit `0xRRGGBB` value.
    pub fn to_rgb_image(&self) -> image::RgbImage {
        image::RgbImage::from_fn(self.size.width, self.size.height, |x, y| {
            let n = self.counts[y as usize * self.size.width as usize + x as usize];
            let packed = n | (n << 8);
            image::Rgb([
                ((packed >> 16) & 0xFF) as u8,
                ((packed >> 8) & 0xFF) as u8,
                (packed & 0xFF) as u8,
            ])
        })
    }
}

/// Writes tile results into a fresh grid, checking that every pixel is written exactly once.
///
/// Results may arrive in any order. The merger owns the grid until [`ResultMerger::finish`].
#[derive(Debug)]
pub struct ResultMerger {
    size: GridSize,
    max_iter: IterationCount,
    counts: Vec<IterationCount>,
    written: Vec<bool>,
    remaining: usize,
}

impl ResultMerger {
    /// Create a merger for a grid of `size`.
    pub fn new(size: GridSize, max_iter: IterationCount) -> Self {
        let n = size.pixel_count();
        Self {
            size,
            max_iter,
            counts: vec![0; n],
            written: vec![false; n],
            remaining: n,
        }
    }

    /// Pixels not yet written.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Merge one tile.
    ///
    /// The whole tile is checked before anything is written, so a rejected tile leaves the grid
    /// untouched.
    pub fn merge(&mut self, result: TileResult) -> MandelResult<()> {
        let job = *result.job();
        let rows = job.rows();
        let cols = job.cols();
        if rows.end > self.size.height || cols.end > self.size.width {
            return Err(MandelError::merge_invariant(format!(
                "tile rows {rows:?} cols {cols:?} exceeds grid {}x{}",
                self.size.width, self.size.height
            )));
        }

        let w = self.size.width as usize;
        let span = cols.start as usize..cols.end as usize;
        for y in rows.clone() {
            let base = y as usize * w;
            if let Some(dx) = self.written[base + span.start..base + span.end]
                .iter()
                .position(|&done| done)
            {
                return Err(MandelError::merge_invariant(format!(
                    "pixel ({}, {y}) written more than once",
                    span.start + dx
                )));
            }
        }

        let tile_w = job.width() as usize;
        for (i, y) in rows.enumerate() {
            let base = y as usize * w;
            let src = &result.counts()[i * tile_w..(i + 1) * tile_w];
            self.counts[base + span.start..base + span.end].copy_from_slice(src);
            self.written[base + span.start..base + span.end].fill(true);
        }
        self.remaining -= job.pixel_count();
        Ok(())
    }

    /// Publish the grid; fails if any pixel was never written.
    pub fn finish(self) -> MandelResult<OutputGrid> {
        if self.remaining != 0 {
            let first = self.written.iter().position(|&done| !done).unwrap_or(0);
            let w = self.size.width as usize;
            return Err(MandelError::merge_invariant(format!(
                "{} pixel(s) never written, first at ({}, {})",
                self.remaining,
                first % w,
                first / w
            )));
        }
        Ok(OutputGrid {
            size: self.size,
            max_iter: self.max_iter,
            counts: self.counts,
        })
    }
}

/// Merge a complete set of tile results into a grid.
pub fn merge_results(
    size: GridSize,
    max_iter: IterationCount,
    results: impl IntoIterator<Item = TileResult>,
) -> MandelResult<OutputGrid> {
    let mut merger = ResultMerger::new(size, max_iter);
    for r in results {
        merger.merge(r)?;
    }
    merger.finish()
}

#[cfg(test)]
#[path = "../tests/unit/merge.rs"]
mod tests;
