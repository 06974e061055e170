//! Zoom trajectory planning.
//!
//! Each integer level halves the field of view. The centre travels from the
//! origin to the target, closing a fixed fraction of the remaining distance
//! per level, then finishes linearly over the last two levels so the final
//! keyframe sits exactly on the target.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scry::TargetPoint;
use crate::viewport::{crop_window_between, CropWindow, FrameSpec};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrajectoryConfig {
    pub origin_x: f64,
    pub origin_y: f64,
    /// Each level closes `1 / base` of the remaining distance.
    pub base: f64,
    /// Scale at level `n` is `2^-(scale_exponent + n)`.
    pub scale_exponent: f64,
    pub depth_start: u32,
    pub depth_per_level: u32,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            origin_x: -0.5,
            origin_y: 0.0,
            base: 3.0,
            scale_exponent: 8.0,
            depth_start: 500,
            depth_per_level: 100,
        }
    }
}

/// Ease in and out over `k` in `[0, 1]`.
pub fn sinusoidal_in_out(k: f64) -> f64 {
    0.5 * (1.0 - (PI * k).cos())
}

// ------------------------- Keyframes -------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrajectoryPlanner {
    pub config: TrajectoryConfig,
    pub target_x: f64,
    pub target_y: f64,
    pub level_count: u32,
}

impl TrajectoryPlanner {
    pub fn new(config: TrajectoryConfig, target: &TargetPoint, level_count: u32) -> Self {
        Self {
            config,
            target_x: target.x,
            target_y: target.y,
            level_count,
        }
    }

    /// Fraction of the origin-to-target distance covered at `level`.
    pub fn position(&self, level: f64) -> f64 {
        let n = self.level_count as f64;
        let base = self.config.base;
        if level < n - 2.0 {
            1.0 - base.powf(-level)
        } else if level < n - 1.0 {
            1.0 - base.powf(2.0 - n) * (n - 1.0 - level)
        } else {
            1.0
        }
    }

    pub fn frame_at(&self, level: f64) -> FrameSpec {
        let c = &self.config;
        let pos = self.position(level);
        FrameSpec {
            level,
            scale: 2f64.powf(-c.scale_exponent - level),
            center_x: c.origin_x + (self.target_x - c.origin_x) * pos,
            center_y: c.origin_y + (self.target_y - c.origin_y) * pos,
            depth: c.depth_start + (c.depth_per_level as f64 * level).floor() as u32,
        }
    }

    /// One keyframe per integer level in `[0, level_count)`.
    pub fn keyframes(&self) -> Vec<FrameSpec> {
        (0..self.level_count)
            .map(|level| self.frame_at(level as f64))
            .collect()
    }

    /// Interpolated frames between keyframes, rendered `width` x `height`.
    ///
    /// Fractional levels step through `[0, level_count)` with sinusoidal
    /// easing, `frames_per_level` frames per level on average.
    pub fn subframes(
        &self,
        keyframes: &[FrameSpec],
        frames_per_level: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<Subframe>> {
        let steps = keyframes.len() as u32 * frames_per_level;
        let levels = keyframes.len() as f64;
        let mut out = Vec::with_capacity(steps as usize);

        for step in 0..steps {
            let level = levels * sinusoidal_in_out(step as f64 / steps as f64);
            let frame = self.frame_at(level);
            let current_level = (level.floor() as usize).min(keyframes.len() - 1);

            let current = KeyframeSlice {
                keyframe: current_level,
                crop: crop_window_between(&keyframes[current_level], &frame, width, height)?,
            };
            let previous = match current_level.checked_sub(1) {
                Some(prev) => Some(KeyframeSlice {
                    keyframe: prev,
                    crop: crop_window_between(&keyframes[prev], &frame, width, height)?,
                }),
                None => None,
            };
            let fade = if previous.is_some() {
                cross_fade(&current.crop, width)
            } else {
                1.0
            };

            out.push(Subframe {
                index: step as usize,
                frame,
                current,
                previous,
                fade,
            });
        }
        Ok(out)
    }
}

/// Keyframes for a zoom onto `target`.
pub fn plan_trajectory(
    config: &TrajectoryConfig,
    target: &TargetPoint,
    level_count: u32,
) -> Vec<FrameSpec> {
    TrajectoryPlanner::new(config.clone(), target, level_count).keyframes()
}

// ------------------------- Subframes -------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct KeyframeSlice {
    /// Index into the keyframe list.
    pub keyframe: usize,
    /// Raw window; clamp before cutting pixels.
    pub crop: CropWindow,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Subframe {
    pub index: usize,
    pub frame: FrameSpec,
    pub current: KeyframeSlice,
    pub previous: Option<KeyframeSlice>,
    /// Weight of the current keyframe when blending with the previous one.
    pub fade: f64,
}

/// Weight of the current keyframe slice: 0 when the slice is the whole
/// keyframe, rising to 1 as it shrinks to half the keyframe width.
pub fn cross_fade(crop: &CropWindow, keyframe_width: u32) -> f64 {
    if keyframe_width == 0 {
        return 1.0;
    }
    let ratio = crop.crop_width as f64 / keyframe_width as f64;
    (1.0 - 2.0 * (ratio - 0.5)).clamp(0.0, 1.0)
}
