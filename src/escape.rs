use crate::foundation::core::{IterationCount, Pixel, Viewport};

/// Squared escape radius.
const ESCAPE_RADIUS_SQR: f64 = 4.0;

/// Escape-time count for the complex point `c = cx + i*cy`.
///
/// Iterates `z <- z^2 + c` from `z = 0`, spending one unit of `max_iter` per step, and stops once
/// `|z|^2 >= 4` or the budget is exhausted. The remaining budget is returned: `0` means the point
/// did not escape, values close to `max_iter` mean it escaped almost immediately.
#[inline]
pub fn escape_count(cx: f64, cy: f64, max_iter: IterationCount) -> IterationCount {
    let (mut zx, mut zy) = (0.0f64, 0.0f64);
    let mut iter = max_iter;
    while zx * zx + zy * zy < ESCAPE_RADIUS_SQR && iter > 0 {
        let tmp = zx * zx - zy * zy + cx;
        zy = 2.0 * zx * zy + cy;
        zx = tmp;
        iter -= 1;
    }
    iter
}

/// Escape-time count for one pixel under `view`.
#[inline]
pub fn compute_iterations(
    pixel: Pixel,
    max_iter: IterationCount,
    view: &Viewport,
) -> IterationCount {
    let (cx, cy) = view.to_complex(pixel);
    escape_count(cx, cy, max_iter)
}
