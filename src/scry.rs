//! Scrying: an adaptive search for a deep, structured spot in the set.
//!
//! The search runs in two phases. *Seeking* descends four levels at a time,
//! each round jumping to a random pixel from the deepest escape-count band
//! (points hugging the set boundary). *Refining* then evaluates a handful of
//! tries at fine granularity, backing off when a region is empty, noisy,
//! crowded or surrounded, nudging the focus toward set edges, and recording
//! regions that hold a solid block of set points as candidates.
//!
//! Every transition is a plain function of the current [`ScryState`] and one
//! evaluated grid, so the driver loop in [`Scryer`] is the only place that
//! evaluates anything.

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::escape::{EscapeGrid, Evaluator, IterationPolicy};
use crate::profile::{self, BoundarySides};
use crate::viewport::Viewport;

// ------------------------- Config -------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScryConfig {
    /// Search grid size; the search runs well below output resolution.
    pub width: u32,
    pub height: u32,
    pub start_x: f64,
    pub start_y: f64,
    pub initial_depth_adjust: u32,
    pub depth_per_level: u32,
    /// Scale at level `n` is `2^-(scale_exponent + n)`.
    pub scale_exponent: i32,
    pub target_level_base: i32,
    /// Target level is `target_level_base + [0, target_level_spread]`.
    pub target_level_spread: i32,
    pub seek_step: i32,
    pub refine_tries: u32,
    pub block_size: u32,
    pub grainy_threshold: f64,
    pub clear_threshold: f64,
    /// More flagged sides than this means the view is surrounded.
    pub surrounded_sides: usize,
    pub side_threshold: f64,
    pub potential_threshold: f64,
    pub zoom_in_proportion: f64,
    pub noise_depth_step: u32,
    /// Recentres that do not consume a try before they start to.
    pub max_recenters: u32,
    /// Full search runs attempted by [`Scryer::find_target`].
    pub max_restarts: u32,
    pub policy: IterationPolicy,
    pub smooth_orphans: bool,
}

impl Default for ScryConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 33,
            start_x: -0.5,
            start_y: 0.0,
            initial_depth_adjust: 500,
            depth_per_level: 100,
            scale_exponent: 6,
            target_level_base: 16,
            target_level_spread: 4,
            seek_step: 4,
            refine_tries: 5,
            block_size: profile::DEFAULT_BLOCK_SIZE,
            grainy_threshold: 0.25,
            clear_threshold: 0.25,
            surrounded_sides: 2,
            side_threshold: profile::DEFAULT_SIDE_THRESHOLD,
            potential_threshold: 0.8,
            zoom_in_proportion: 0.05,
            noise_depth_step: 100,
            max_recenters: 8,
            max_restarts: 50,
            policy: IterationPolicy::default(),
            smooth_orphans: false,
        }
    }
}

impl ScryConfig {
    pub fn scale_at(&self, level: i32) -> f64 {
        2f64.powi(-(self.scale_exponent + level))
    }

    pub fn depth_at(&self, depth_adjust: u32, level: i32) -> u32 {
        let depth = depth_adjust as i64 + self.depth_per_level as i64 * level as i64;
        depth.clamp(1, u32::MAX as i64) as u32
    }

    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.policy).with_orphan_smoothing(self.smooth_orphans)
    }
}

// ------------------------- State -------------------------

/// Accepted search result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TargetPoint {
    pub x: f64,
    pub y: f64,
    pub level: i32,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ScryPhase {
    Seeking,
    Refining,
    Accepted(TargetPoint),
    Exhausted,
}

impl ScryPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScryPhase::Accepted(_) | ScryPhase::Exhausted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScryState {
    pub phase: ScryPhase,
    pub x: f64,
    pub y: f64,
    pub level: i32,
    /// Depth of the most recent evaluation.
    pub depth: u32,
    pub depth_adjust: u32,
    pub attempt_count: u32,
    pub target_level: i32,
    /// Refining budget; grows by one on every zoom-in.
    pub tries: u32,
    pub tries_used: u32,
    pub recenters: u32,
    pub potentials: Vec<TargetPoint>,
}

/// What a refining try decided about the current region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Empty,
    Noisy,
    Crowded,
    Surrounded,
    Recenter(BoundarySides),
    Focus { potential: bool, zoom_in: bool },
}

impl ScryState {
    pub fn start<R: Rng>(config: &ScryConfig, rng: &mut R) -> Self {
        let spread = config.target_level_spread.max(0);
        let target_level = config.target_level_base + rng.gen_range(0..=spread);
        Self::with_target_level(config, target_level)
    }

    pub fn with_target_level(config: &ScryConfig, target_level: i32) -> Self {
        let phase = if target_level <= 0 {
            ScryPhase::Refining
        } else {
            ScryPhase::Seeking
        };
        Self {
            phase,
            x: config.start_x,
            y: config.start_y,
            level: 0,
            depth: config.depth_at(config.initial_depth_adjust, 0),
            depth_adjust: config.initial_depth_adjust,
            attempt_count: 0,
            target_level,
            tries: config.refine_tries,
            tries_used: 0,
            recenters: 0,
            potentials: Vec::new(),
        }
    }

    /// Viewport the next step must evaluate.
    pub fn viewport(&self, config: &ScryConfig) -> Viewport {
        Viewport {
            center_x: self.x,
            center_y: self.y,
            scale: config.scale_at(self.level),
            width: config.width,
            height: config.height,
            depth: config.depth_at(self.depth_adjust, self.level),
        }
    }
}

// ------------------------- Transitions -------------------------

/// One seeking round over `grid`, which must be the evaluation of
/// `state.viewport(config)`.
pub fn seek_step<R: Rng>(
    mut state: ScryState,
    config: &ScryConfig,
    grid: &EscapeGrid,
    rng: &mut R,
) -> ScryState {
    let viewport = state.viewport(config);
    state.depth = viewport.depth;
    state.attempt_count += 1;

    let hist = profile::collate_depths(grid, viewport.depth);
    let escaped = hist.escaped_count();
    let threshold = (0.1 * rng.gen::<f64>() * escaped as f64).floor() as usize;

    if let Some(max_depth) = hist.max_depth {
        if (max_depth as f64) < viewport.depth as f64 / 2.0 {
            debug!("depth unnecessarily high: adjusting");
            state.depth_adjust = (state.depth_adjust + 1) / 2;
        }
    }

    match hist.band_above(threshold) {
        Some((band, coords)) => {
            let pick = coords[rng.gen_range(0..coords.len())];
            let (x, y) = viewport.pixel_to_complex(pick.x as f64, pick.y as f64);
            debug!("seeking: jumped to band {} at ({}, {})", band, x, y);
            state.x = x;
            state.y = y;
        }
        None => warn!("seeking: no escape band at level {}, staying put", state.level),
    }

    state.level += config.seek_step.max(1);
    if state.level >= state.target_level {
        state.phase = ScryPhase::Refining;
    }
    state
}

/// Classifies the region shown in `grid`.
pub fn judge(config: &ScryConfig, grid: &EscapeGrid) -> Verdict {
    let density = profile::density_profile(grid, config.block_size);
    let max_proportion = density.max_proportion();

    if max_proportion == 0.0 {
        return Verdict::Empty;
    }
    if density.grainy_fraction() > config.grainy_threshold {
        return Verdict::Noisy;
    }
    if density.clear_fraction() <= config.clear_threshold {
        return Verdict::Crowded;
    }
    let sides = profile::boundary_sides(grid, config.side_threshold);
    if sides.count() > config.surrounded_sides {
        return Verdict::Surrounded;
    }
    if sides.any() {
        return Verdict::Recenter(sides);
    }
    Verdict::Focus {
        potential: max_proportion > config.potential_threshold,
        zoom_in: density.total_proportion() < config.zoom_in_proportion,
    }
}

/// One refining try over `grid`, which must be the evaluation of
/// `state.viewport(config)`.
pub fn refine_step(mut state: ScryState, config: &ScryConfig, grid: &EscapeGrid) -> ScryState {
    let viewport = state.viewport(config);
    state.depth = viewport.depth;
    state.attempt_count += 1;

    let verdict = judge(config, grid);
    let mut consume_try = true;
    match verdict {
        Verdict::Empty => {
            debug!("nothing here");
            state.level -= 1;
        }
        Verdict::Noisy => {
            debug!("too much noise: adding depth adjust");
            state.depth_adjust += config.noise_depth_step;
            state.level -= 1;
        }
        Verdict::Crowded => {
            debug!("not enough clear space");
            state.level -= 1;
        }
        Verdict::Surrounded => {
            debug!("totally surrounded");
            state.level -= 1;
        }
        Verdict::Recenter(sides) => {
            debug!("adjusting focus toward {:?}", sides);
            let (w, h) = (viewport.width as f64, viewport.height as f64);
            let mut px = w / 2.0;
            let mut py = h / 2.0;
            if sides.north {
                py = 0.0;
            }
            if sides.south {
                py = h;
            }
            if sides.east {
                px = w;
            }
            if sides.west {
                px = 0.0;
            }
            let (x, y) = viewport.pixel_to_complex(px, py);
            state.x = x;
            state.y = y;
            if state.recenters < config.max_recenters {
                state.recenters += 1;
                consume_try = false;
            }
        }
        Verdict::Focus { potential, zoom_in } => {
            if potential {
                state.potentials.push(TargetPoint {
                    x: state.x,
                    y: state.y,
                    level: state.level,
                    depth: state.depth,
                });
            }
            let density = profile::density_profile(grid, config.block_size);
            if let Some(block) = density.max_proportion_block() {
                let (fx, fy) = density.block_centre(block);
                let (x, y) = viewport
                    .pixel_to_complex(fx * viewport.width as f64, fy * viewport.height as f64);
                state.x = x;
                state.y = y;
            }
            if zoom_in {
                debug!("zooming in");
                state.level += 1;
                state.tries += 1;
            }
        }
    }

    if consume_try {
        state.tries_used += 1;
    }
    if state.tries_used >= state.tries {
        state.phase = match state.potentials.last() {
            Some(target) => ScryPhase::Accepted(*target),
            None => ScryPhase::Exhausted,
        };
    }
    state
}

// ------------------------- Driver -------------------------

/// Runs searches with an injected random source.
pub struct Scryer<R: Rng> {
    config: ScryConfig,
    evaluator: Evaluator,
    rng: R,
    attempts: u32,
}

impl<R: Rng> Scryer<R> {
    pub fn new(config: ScryConfig, rng: R) -> Self {
        let evaluator = config.evaluator();
        Self {
            config,
            evaluator,
            rng,
            attempts: 0,
        }
    }

    pub fn config(&self) -> &ScryConfig {
        &self.config
    }

    /// Evaluations performed so far, across all runs.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Drives one state from start to a terminal phase.
    pub fn drive(&mut self, mut state: ScryState) -> ScryState {
        while !state.phase.is_terminal() {
            let viewport = state.viewport(&self.config);
            info!(
                "{}: level {}, depth {} ({:?})",
                self.attempts, state.level, viewport.depth, state.phase
            );
            let grid = self.evaluator.evaluate(&viewport);
            self.attempts += 1;
            let phase = state.phase;
            state = match phase {
                ScryPhase::Seeking => seek_step(state, &self.config, &grid, &mut self.rng),
                _ => refine_step(state, &self.config, &grid),
            };
        }
        state
    }

    /// One full seeking + refining run.
    pub fn run(&mut self) -> Result<TargetPoint> {
        let state = ScryState::start(&self.config, &mut self.rng);
        match self.drive(state).phase {
            ScryPhase::Accepted(target) => Ok(target),
            _ => Err(Error::SearchExhausted { attempts: 1 }),
        }
    }

    /// Restarts [`Scryer::run`] with fresh randomness until a run succeeds or
    /// `max_restarts` runs have failed.
    pub fn find_target(&mut self) -> Result<TargetPoint> {
        let runs = self.config.max_restarts.max(1);
        for run in 1..=runs {
            match self.run() {
                Ok(target) => {
                    info!(
                        "found a target after {} evaluations ({} runs)",
                        self.attempts, run
                    );
                    return Ok(target);
                }
                Err(Error::SearchExhausted { .. }) => {
                    debug!("run {} exhausted, restarting", run);
                }
                Err(e) => return Err(e),
            }
        }
        warn!("search gave up after {} runs", runs);
        Err(Error::SearchExhausted { attempts: runs })
    }
}

/// Convenience wrapper around [`Scryer::find_target`].
pub fn find_target<R: Rng>(config: ScryConfig, rng: R) -> Result<TargetPoint> {
    Scryer::new(config, rng).find_target()
}
