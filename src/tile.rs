use crate::escape::compute_iterations;
use crate::foundation::core::{IterationCount, Pixel, Viewport};
use crate::foundation::error::{MandelError, MandelResult};
use crate::plan::TileJob;

/// Iteration counts for one [`TileJob`]'s rectangle, row-major within the tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileResult {
    job: TileJob,
    counts: Vec<IterationCount>,
}

impl TileResult {
    /// Wrap a counts buffer; its length must equal the job's pixel count.
    pub fn from_parts(job: TileJob, counts: Vec<IterationCount>) -> MandelResult<Self> {
        if counts.len() != job.pixel_count() {
            return Err(MandelError::validation(format!(
                "tile result for rows {:?} has {} counts, expected {}",
                job.rows(),
                counts.len(),
                job.pixel_count()
            )));
        }
        Ok(Self { job, counts })
    }

    /// The job this result was computed for.
    pub fn job(&self) -> &TileJob {
        &self.job
    }

    /// Row-major counts covering the tile rectangle.
    pub fn counts(&self) -> &[IterationCount] {
        &self.counts
    }

    /// Count at grid coordinate `p`, or `None` when `p` is outside the tile.
    pub fn get(&self, p: Pixel) -> Option<IterationCount> {
        if !self.job.rows().contains(&p.y) || !self.job.cols().contains(&p.x) {
            return None;
        }
        let local = (p.y - self.job.rows().start) as usize * self.job.width() as usize
            + (p.x - self.job.cols().start) as usize;
        self.counts.get(local).copied()
    }

    /// Iterate `(pixel, count)` pairs in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Pixel, IterationCount)> + '_ {
        let cols = self.job.cols();
        let width = self.job.width() as usize;
        self.job.rows().flat_map(move |y| {
            let row = (y - self.job.rows().start) as usize * width;
            cols.clone()
                .zip(&self.counts[row..row + width])
                .map(move |(x, &n)| (Pixel::new(x, y), n))
        })
    }

    /// Consume the result, returning the job and its counts.
    pub fn into_parts(self) -> (TileJob, Vec<IterationCount>) {
        (self.job, self.counts)
    }
}

/// Compute every pixel of `job` under `view`.
pub fn execute_tile(job: &TileJob, view: &Viewport) -> TileResult {
    let mut counts = Vec::with_capacity(job.pixel_count());
    for y in job.rows() {
        for x in job.cols() {
            counts.push(compute_iterations(Pixel::new(x, y), job.max_iter(), view));
        }
    }
    TileResult { job: *job, counts }
}
