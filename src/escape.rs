//! Escape-time evaluation of a viewport.
//!
//! Rows are evaluated in parallel with rayon; every pixel is independent and
//! writes only its own cell, so no locking is needed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::trace;
use rayon::prelude::{IndexedParallelIterator, ParallelIterator, ParallelSliceMut};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::viewport::Viewport;

/// Squared escape radius (|z| > 2).
const ESCAPE_RADIUS_SQ: f64 = 4.0;

// ------------------------- Iteration policy -------------------------

/// How the orbit is started and how escape steps are numbered.
///
/// Both policies iterate `z -> z^2 + c`; they differ by one step at both ends:
///
/// * `SeededWithC` starts at `z = c`, labels it step 1 and tests steps
///   `1..depth`. A point escaping on the first test reports `Some(1)`, and at
///   most `depth - 1` tests run.
/// * `FromOrigin` starts at `z = 0`, applies one step before testing, and
///   labels the first tested value step 0. The same point reports `Some(0)`
///   and up to `depth` tests run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IterationPolicy {
    #[default]
    SeededWithC,
    FromOrigin,
}

/// Iteration count at which the orbit of `c` escapes, or `None`.
///
/// A non-finite orbit value counts as escaped at the step it appears.
#[inline]
pub fn escape_time(cx: f64, cy: f64, depth: u32, policy: IterationPolicy) -> Option<u32> {
    match policy {
        IterationPolicy::SeededWithC => {
            let (mut zx, mut zy) = (cx, cy);
            for n in 1..depth {
                let x2 = zx * zx;
                let y2 = zy * zy;
                if !(x2 + y2 <= ESCAPE_RADIUS_SQ) {
                    return Some(n);
                }
                zy = 2.0 * zx * zy + cy;
                zx = x2 - y2 + cx;
            }
            None
        }
        IterationPolicy::FromOrigin => {
            let (mut zx, mut zy) = (0.0f64, 0.0f64);
            for n in 0..depth {
                let x2 = zx * zx;
                let y2 = zy * zy;
                zy = 2.0 * zx * zy + cy;
                zx = x2 - y2 + cx;
                if !(zx * zx + zy * zy <= ESCAPE_RADIUS_SQ) {
                    return Some(n);
                }
            }
            None
        }
    }
}

// ------------------------- Grid -------------------------

/// Row-major `height x width` grid of escape counts (`None` = bounded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapeGrid {
    width: u32,
    height: u32,
    cells: Vec<Option<u32>>,
}

impl EscapeGrid {
    pub fn from_cells(width: u32, height: u32, cells: Vec<Option<u32>>) -> Result<Self> {
        if cells.len() != width as usize * height as usize {
            return Err(Error::InvalidViewport(format!(
                "{} cells do not fill a {}x{} grid",
                cells.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    pub fn filled(width: u32, height: u32, value: Option<u32>) -> Self {
        Self {
            width,
            height,
            cells: vec![value; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        self.cells[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: Option<u32>) {
        let idx = y as usize * self.width as usize + x as usize;
        self.cells[idx] = value;
    }

    pub fn row(&self, y: u32) -> &[Option<u32>] {
        let w = self.width as usize;
        let start = y as usize * w;
        &self.cells[start..start + w]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<u32>]> {
        // chunks() panics on 0, and a zero-width grid has no cells anyway
        self.cells.chunks(self.width.max(1) as usize)
    }

    pub fn cells(&self) -> &[Option<u32>] {
        &self.cells
    }

    pub fn bounded_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }
}

// ------------------------- Cancellation -------------------------

/// Shared flag checked once per row by [`Evaluator::evaluate_with_cancel`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ------------------------- Evaluator -------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Evaluator {
    pub policy: IterationPolicy,
    /// Reclassify interior pixels whose four neighbours all escaped.
    pub smooth_orphans: bool,
}

impl Evaluator {
    pub fn new(policy: IterationPolicy) -> Self {
        Self {
            policy,
            smooth_orphans: false,
        }
    }

    pub fn with_orphan_smoothing(mut self, enabled: bool) -> Self {
        self.smooth_orphans = enabled;
        self
    }

    pub fn evaluate(&self, viewport: &Viewport) -> EscapeGrid {
        let mut cells = vec![None; viewport.pixel_count()];
        if !cells.is_empty() {
            self.trace(viewport);
            cells
                .par_chunks_mut(viewport.width as usize)
                .enumerate()
                .for_each(|(y, row)| self.fill_row(viewport, y, row));
        }
        self.finish(viewport, cells)
    }

    /// Like [`Evaluator::evaluate`], but stops with [`Error::Cancelled`] as
    /// soon as a row starts after `cancel` fires.
    pub fn evaluate_with_cancel(
        &self,
        viewport: &Viewport,
        cancel: &CancelToken,
    ) -> Result<EscapeGrid> {
        let mut cells = vec![None; viewport.pixel_count()];
        if !cells.is_empty() {
            self.trace(viewport);
            cells
                .par_chunks_mut(viewport.width as usize)
                .enumerate()
                .try_for_each(|(y, row)| {
                    if cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    self.fill_row(viewport, y, row);
                    Ok(())
                })?;
        }
        Ok(self.finish(viewport, cells))
    }

    fn trace(&self, viewport: &Viewport) {
        trace!(
            "evaluate {}x{} at ({}, {}) scale {:e} depth {}",
            viewport.width,
            viewport.height,
            viewport.center_x,
            viewport.center_y,
            viewport.scale,
            viewport.depth
        );
    }

    fn fill_row(&self, viewport: &Viewport, y: usize, row: &mut [Option<u32>]) {
        let half_w = viewport.width as f64 / 2.0;
        let half_h = viewport.height as f64 / 2.0;
        // same mapping as viewport::pixel_to_complex
        let cy = viewport.center_y - (y as f64 - half_h) * viewport.scale;
        for (x, cell) in row.iter_mut().enumerate() {
            let cx = viewport.center_x + (x as f64 - half_w) * viewport.scale;
            *cell = escape_time(cx, cy, viewport.depth, self.policy);
        }
    }

    fn finish(&self, viewport: &Viewport, cells: Vec<Option<u32>>) -> EscapeGrid {
        let mut grid = EscapeGrid {
            width: viewport.width,
            height: viewport.height,
            cells,
        };
        if self.smooth_orphans {
            smooth_orphans(&mut grid, viewport.depth);
        }
        grid
    }
}

/// Evaluates with the default policy and no smoothing.
pub fn evaluate(viewport: &Viewport) -> EscapeGrid {
    Evaluator::default().evaluate(viewport)
}

/// Marks isolated bounded pixels as escaping at `depth`.
///
/// A bounded pixel is isolated when its four direct neighbours all escaped.
/// Edge pixels lack a neighbour and are never touched. Neighbours are read
/// from the unsmoothed grid. Returns the number of reclassified pixels.
pub fn smooth_orphans(grid: &mut EscapeGrid, depth: u32) -> usize {
    if grid.width < 3 || grid.height < 3 {
        return 0;
    }
    let mut orphans = Vec::new();
    for y in 1..grid.height - 1 {
        for x in 1..grid.width - 1 {
            if grid.get(x, y).is_some() {
                continue;
            }
            let isolated = grid.get(x - 1, y).is_some()
                && grid.get(x + 1, y).is_some()
                && grid.get(x, y - 1).is_some()
                && grid.get(x, y + 1).is_some();
            if isolated {
                orphans.push((x, y));
            }
        }
    }
    for &(x, y) in &orphans {
        grid.set(x, y, Some(depth));
    }
    orphans.len()
}
