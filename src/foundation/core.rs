use crate::foundation::error::{MandelError, MandelResult};

/// Remaining iteration budget at escape; `0` means the point never escaped.
pub type IterationCount = u32;

/// Integer pixel coordinate inside a [`GridSize`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Pixel {
    /// Column, `0 <= x < width`.
    pub x: u32,
    /// Row, `0 <= y < height`.
    pub y: u32,
}

impl Pixel {
    /// Create a pixel coordinate.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Output grid dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GridSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl GridSize {
    /// Create validated dimensions; both sides must be non-zero.
    pub fn new(width: u32, height: u32) -> MandelResult<Self> {
        if width == 0 || height == 0 {
            return Err(MandelError::validation(format!(
                "grid dimensions must be > 0 (got {width}x{height})"
            )));
        }
        Ok(Self { width, height })
    }

    /// Total number of pixels.
    pub fn pixel_count(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Return `true` when `p` lies inside the grid.
    pub fn contains(self, p: Pixel) -> bool {
        p.x < self.width && p.y < self.height
    }

    /// Row-major index of `p`, or `None` when it is out of bounds.
    pub fn index_of(self, p: Pixel) -> Option<usize> {
        if !self.contains(p) {
            return None;
        }
        Some(p.y as usize * self.width as usize + p.x as usize)
    }
}

/// Linear mapping from pixel space to the complex plane.
///
/// A pixel `(x, y)` maps to `((x - origin_x) / zoom, (y - origin_y) / zoom)`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    /// Pixels per unit of the complex plane.
    pub zoom: f64,
    /// Pixel column mapped to real part 0.
    pub origin_x: f64,
    /// Pixel row mapped to imaginary part 0.
    pub origin_y: f64,
}

impl Default for Viewport {
    /// The classic 800x600 framing: zoom 150 with the origin at the window center.
    fn default() -> Self {
        Self {
            zoom: 150.0,
            origin_x: 400.0,
            origin_y: 300.0,
        }
    }
}

impl Viewport {
    /// Create a validated viewport.
    pub fn new(zoom: f64, origin_x: f64, origin_y: f64) -> MandelResult<Self> {
        let v = Self {
            zoom,
            origin_x,
            origin_y,
        };
        v.validate()?;
        Ok(v)
    }

    /// Viewport with the complex origin placed at the center of `size`.
    pub fn centered(size: GridSize, zoom: f64) -> MandelResult<Self> {
        Self::new(
            zoom,
            f64::from(size.width) / 2.0,
            f64::from(size.height) / 2.0,
        )
    }

    /// Check that the mapping is finite and invertible.
    pub fn validate(&self) -> MandelResult<()> {
        if !self.zoom.is_finite() || self.zoom <= 0.0 {
            return Err(MandelError::validation(format!(
                "viewport zoom must be finite and > 0 (got {})",
                self.zoom
            )));
        }
        if !self.origin_x.is_finite() || !self.origin_y.is_finite() {
            return Err(MandelError::validation("viewport origin must be finite"));
        }
        Ok(())
    }

    /// Map a pixel to its complex coordinate `(re, im)`.
    pub fn to_complex(&self, p: Pixel) -> (f64, f64) {
        (
            (f64::from(p.x) - self.origin_x) / self.zoom,
            (f64::from(p.y) - self.origin_y) / self.zoom,
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
