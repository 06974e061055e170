//! Grid statistics used to judge whether a region is worth zooming into.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::escape::EscapeGrid;

/// Default tile edge for density profiling, in pixels.
pub const DEFAULT_BLOCK_SIZE: u32 = 10;

/// Fraction of bounded pixels above which a grid edge counts as touching the set.
pub const DEFAULT_SIDE_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

// ------------------------- Depth histogram -------------------------

/// Pixel coordinates grouped by escape count, plus the bounded pixels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthHistogram {
    pub escaped: BTreeMap<u32, Vec<Coord>>,
    pub bounded: Vec<Coord>,
    /// Deepest populated escape count strictly below the depth limit.
    pub max_depth: Option<u32>,
}

pub fn collate_depths(grid: &EscapeGrid, depth: u32) -> DepthHistogram {
    let mut hist = DepthHistogram::default();
    for (y, row) in grid.rows().enumerate() {
        for (x, cell) in row.iter().enumerate() {
            let coord = Coord {
                x: x as u32,
                y: y as u32,
            };
            match cell {
                Some(n) => hist.escaped.entry(*n).or_default().push(coord),
                None => hist.bounded.push(coord),
            }
        }
    }
    hist.max_depth = hist.escaped.range(..depth).next_back().map(|(n, _)| *n);
    hist
}

impl DepthHistogram {
    pub fn escaped_count(&self) -> usize {
        self.escaped.values().map(Vec::len).sum()
    }

    pub fn total(&self) -> usize {
        self.escaped_count() + self.bounded.len()
    }

    /// Walks buckets from the deepest escape count down, accumulating sizes,
    /// and returns the first bucket at which the running tally exceeds
    /// `threshold`.
    ///
    /// Bucket 0 (first-test escapes under [`IterationPolicy::FromOrigin`]) is
    /// skipped.
    ///
    /// [`IterationPolicy::FromOrigin`]: crate::escape::IterationPolicy::FromOrigin
    pub fn band_above(&self, threshold: usize) -> Option<(u32, &[Coord])> {
        let mut tally = 0usize;
        for (n, coords) in self.escaped.range(1..).rev() {
            tally += coords.len();
            if tally > threshold {
                return Some((*n, coords.as_slice()));
            }
        }
        None
    }
}

// ------------------------- Density profile -------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub row: usize,
    pub col: usize,
}

/// Fraction of bounded pixels in each `block_size` square tile.
///
/// Trailing partial tiles are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityProfile {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

pub fn density_profile(grid: &EscapeGrid, block_size: u32) -> DensityProfile {
    let block = block_size.max(1) as usize;
    let rows = grid.height() as usize / block;
    let cols = grid.width() as usize / block;
    let area = (block * block) as f64;

    let mut values = Vec::with_capacity(rows * cols);
    for by in 0..rows {
        for bx in 0..cols {
            let mut bounded = 0usize;
            for y in by * block..(by + 1) * block {
                let row = grid.row(y as u32);
                bounded += row[bx * block..(bx + 1) * block]
                    .iter()
                    .filter(|c| c.is_none())
                    .count();
            }
            values.push(bounded as f64 / area);
        }
    }
    DensityProfile { rows, cols, values }
}

impl DensityProfile {
    pub fn from_values(rows: usize, cols: usize, values: Vec<f64>) -> Option<Self> {
        (values.len() == rows * cols).then_some(Self { rows, cols, values })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn max_proportion(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Block with the highest proportion. Ties go to the block whose
    /// 4-connected neighbours sum highest, then to the first in row-major order.
    pub fn max_proportion_block(&self) -> Option<Block> {
        if self.is_empty() {
            return None;
        }
        let max = self.max_proportion();
        let mut best: Option<(Block, f64)> = None;
        for row in 0..self.rows {
            for col in 0..self.cols {
                if self.get(row, col) != max {
                    continue;
                }
                let block = Block { row, col };
                let sum = self.neighbour_sum(block);
                match best {
                    Some((_, best_sum)) if sum <= best_sum => {}
                    _ => best = Some((block, sum)),
                }
            }
        }
        best.map(|(block, _)| block)
    }

    fn neighbour_sum(&self, Block { row, col }: Block) -> f64 {
        let mut sum = 0.0;
        if row > 0 {
            sum += self.get(row - 1, col);
        }
        if row + 1 < self.rows {
            sum += self.get(row + 1, col);
        }
        if col > 0 {
            sum += self.get(row, col - 1);
        }
        if col + 1 < self.cols {
            sum += self.get(row, col + 1);
        }
        sum
    }

    /// Centre of `block` as a fraction of the profiled area, `(x, y)`.
    pub fn block_centre(&self, block: Block) -> (f64, f64) {
        (
            (block.col as f64 + 0.5) / self.cols as f64,
            (block.row as f64 + 0.5) / self.rows as f64,
        )
    }

    fn fraction_where(&self, pred: impl Fn(f64) -> bool) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.values.iter().filter(|p| pred(**p)).count() as f64 / self.values.len() as f64
    }

    /// Share of blocks that are partly, but less than half, bounded.
    pub fn grainy_fraction(&self) -> f64 {
        self.fraction_where(|p| p > 0.0 && p < 0.5)
    }

    /// Share of blocks with no bounded pixel at all.
    pub fn clear_fraction(&self) -> f64 {
        self.fraction_where(|p| p == 0.0)
    }

    pub fn total_proportion(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

// ------------------------- Boundary sides -------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundarySides {
    pub north: bool,
    pub south: bool,
    pub east: bool,
    pub west: bool,
}

impl BoundarySides {
    pub fn count(&self) -> usize {
        [self.north, self.south, self.east, self.west]
            .iter()
            .filter(|s| **s)
            .count()
    }

    pub fn any(&self) -> bool {
        self.count() > 0
    }
}

/// Edges of the grid on which more than `threshold` of the pixels are bounded.
pub fn boundary_sides(grid: &EscapeGrid, threshold: f64) -> BoundarySides {
    if grid.is_empty() {
        return BoundarySides::default();
    }
    let (w, h) = (grid.width(), grid.height());
    let heavy = |bounded: usize, len: u32| bounded as f64 / len as f64 > threshold;

    let north = grid.row(0).iter().filter(|c| c.is_none()).count();
    let south = grid.row(h - 1).iter().filter(|c| c.is_none()).count();
    let east = (0..h).filter(|y| grid.get(w - 1, *y).is_none()).count();
    let west = (0..h).filter(|y| grid.get(0, *y).is_none()).count();

    BoundarySides {
        north: heavy(north, w),
        south: heavy(south, w),
        east: heavy(east, h),
        west: heavy(west, h),
    }
}
