//! Keyframe rendering and subframe compositing.
//!
//! Keyframes are evaluated at `oversample` times the output size, so that a
//! subframe can crop down to half a keyframe and still resize to the output
//! without visible blur. Each subframe is cut from its enclosing keyframe and,
//! past the first level, cross-faded with the matching cut of the previous
//! keyframe.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::imageops::{self, FilterType};
use image::{ImageError, Rgb, RgbImage};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::escape::{EscapeGrid, Evaluator};
use crate::trajectory::{Subframe, TrajectoryPlanner};
use crate::viewport::{CropWindow, FrameSpec};

// ------------------------- Settings -------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    pub width: u32,
    pub height: u32,
    /// Keyframe size as a multiple of the output size.
    pub oversample: u32,
    pub frames_per_level: u32,
    /// Overrides the level count taken from the search result.
    pub levels: Option<u32>,
    pub out_dir: PathBuf,
    pub smooth_orphans: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            width: 504,
            height: 336,
            oversample: 4,
            frames_per_level: 10,
            levels: None,
            out_dir: PathBuf::from("frames"),
            smooth_orphans: false,
        }
    }
}

impl OutputSettings {
    pub fn keyframe_size(&self) -> (u32, u32) {
        let k = self.oversample.max(1);
        (self.width * k, self.height * k)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image: {0}")]
    Image(ImageError),
    #[error(transparent)]
    Core(#[from] Error),
}

impl From<ImageError> for ExportError {
    fn from(err: ImageError) -> Self {
        ExportError::Image(err)
    }
}

// ------------------------- Preview -------------------------

/// Log-scaled preview: bounded pixels black, escaped pixels from yellow-white
/// (slow escape) to blue (fast escape).
pub fn preview_image(grid: &EscapeGrid, depth: u32) -> RgbImage {
    let min = grid.cells().iter().flatten().copied().min().unwrap_or(0);
    let log_depth = (depth.max(2) as f64).ln();

    let mut img = RgbImage::new(grid.width(), grid.height());
    for (y, row) in grid.rows().enumerate() {
        for (x, cell) in row.iter().enumerate() {
            let px = match cell {
                None => Rgb([0, 0, 0]),
                Some(n) => {
                    let t = 255.0 * (1.5 * (n - min) as f64).ln() / log_depth;
                    let v = t.round().clamp(0.0, 255.0) as u8;
                    Rgb([v, v, 255 - v])
                }
            };
            img.put_pixel(x as u32, y as u32, px);
        }
    }
    img
}

// ------------------------- Keyframes -------------------------

pub fn render_keyframe(
    evaluator: &Evaluator,
    frame: &FrameSpec,
    width: u32,
    height: u32,
) -> RgbImage {
    let viewport = frame.viewport(width, height);
    let grid = evaluator.evaluate(&viewport);
    preview_image(&grid, frame.depth)
}

pub fn render_keyframes(
    evaluator: &Evaluator,
    frames: &[FrameSpec],
    width: u32,
    height: u32,
) -> Vec<RgbImage> {
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let start = Instant::now();
            let img = render_keyframe(evaluator, frame, width, height);
            debug!("keyframe #{} rendered in {:?}", i, start.elapsed());
            img
        })
        .collect()
}

// ------------------------- Compositing -------------------------

fn cut(keyframe: &RgbImage, crop: &CropWindow, w: u32, h: u32, filter: FilterType) -> RgbImage {
    let fitted = crop.fit_within(keyframe.width(), keyframe.height());
    let view = imageops::crop_imm(
        keyframe,
        fitted.left as u32,
        fitted.top as u32,
        fitted.crop_width,
        fitted.crop_height,
    );
    imageops::resize(&view.to_image(), w, h, filter)
}

/// Builds one output frame from its keyframe slices.
pub fn composite_subframe(
    sub: &Subframe,
    keyframes: &[RgbImage],
    width: u32,
    height: u32,
) -> Result<RgbImage, ExportError> {
    let missing = |i: usize| Error::InvalidViewport(format!("no keyframe #{i} for subframe"));
    let current_key = keyframes
        .get(sub.current.keyframe)
        .ok_or_else(|| missing(sub.current.keyframe))?;
    let mut current = cut(current_key, &sub.current.crop, width, height, FilterType::Triangle);

    let Some(prev) = sub.previous else {
        return Ok(current);
    };
    let prev_key = keyframes.get(prev.keyframe).ok_or_else(|| missing(prev.keyframe))?;
    let previous = cut(prev_key, &prev.crop, width, height, FilterType::CatmullRom);

    let fade = sub.fade;
    for (a, b) in current.pixels_mut().zip(previous.pixels()) {
        for c in 0..3 {
            a[c] = (a[c] as f64 * fade + b[c] as f64 * (1.0 - fade)).floor() as u8;
        }
    }
    Ok(current)
}

// ------------------------- Export -------------------------

/// Renders every keyframe and subframe of `planner` into `dir` as PNGs.
///
/// Returns the subframe paths in playback order.
pub fn export_frames(
    planner: &TrajectoryPlanner,
    settings: &OutputSettings,
    evaluator: &Evaluator,
    dir: &Path,
) -> Result<Vec<PathBuf>, ExportError> {
    let started = Instant::now();
    fs::create_dir_all(dir)?;

    let (key_w, key_h) = settings.keyframe_size();
    let frames = planner.keyframes();
    let keyframes = render_keyframes(evaluator, &frames, key_w, key_h);
    for (i, img) in keyframes.iter().enumerate() {
        img.save(dir.join(format!("key-{i}.png")))?;
    }

    let subframes = planner.subframes(&frames, settings.frames_per_level, key_w, key_h)?;
    let mut paths = Vec::with_capacity(subframes.len());
    for sub in &subframes {
        debug!("frame {} of {}", sub.index + 1, subframes.len());
        let img = composite_subframe(sub, &keyframes, settings.width, settings.height)?;
        let path = dir.join(format!("{:03}.png", sub.index));
        img.save(&path)?;
        paths.push(path);
    }

    info!(
        "exported {} keyframes and {} frames to {} in {:?}",
        keyframes.len(),
        paths.len(),
        dir.display(),
        started.elapsed()
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::KeyframeSlice;

    #[test]
    fn preview_colours() {
        let grid = EscapeGrid::from_cells(3, 1, vec![None, Some(2), Some(40)]).unwrap();
        let img = preview_image(&grid, 100);
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        // the shallowest escape maps to ln(0): clamped to 0
        assert_eq!(img.get_pixel(1, 0), &Rgb([0, 0, 255]));
        let expected = (255.0 * (1.5f64 * 38.0).ln() / 100f64.ln()).round() as u8;
        assert_eq!(img.get_pixel(2, 0), &Rgb([expected, expected, 255 - expected]));
    }

    #[test]
    fn composite_without_previous_is_a_resized_cut() {
        let mut key = RgbImage::new(8, 8);
        for (x, _, px) in key.enumerate_pixels_mut() {
            *px = if x < 4 { Rgb([200, 0, 0]) } else { Rgb([0, 0, 200]) };
        }
        let sub = Subframe {
            index: 0,
            frame: FrameSpec {
                level: 0.0,
                scale: 1.0,
                center_x: 0.0,
                center_y: 0.0,
                depth: 10,
            },
            current: KeyframeSlice {
                keyframe: 0,
                crop: CropWindow {
                    left: -3,
                    top: 0,
                    crop_width: 4,
                    crop_height: 4,
                },
            },
            previous: None,
            fade: 1.0,
        };
        let out = composite_subframe(&sub, &[key], 4, 4).unwrap();
        assert_eq!(out.dimensions(), (4, 4));
        assert!(out.pixels().all(|p| *p == Rgb([200, 0, 0])));
    }

    #[test]
    fn composite_blends_with_previous() {
        let current = RgbImage::from_pixel(4, 4, Rgb([200, 100, 0]));
        let previous = RgbImage::from_pixel(4, 4, Rgb([0, 100, 200]));
        let whole = CropWindow {
            left: 0,
            top: 0,
            crop_width: 4,
            crop_height: 4,
        };
        let sub = Subframe {
            index: 3,
            frame: FrameSpec {
                level: 1.5,
                scale: 1.0,
                center_x: 0.0,
                center_y: 0.0,
                depth: 10,
            },
            current: KeyframeSlice {
                keyframe: 1,
                crop: whole,
            },
            previous: Some(KeyframeSlice {
                keyframe: 0,
                crop: whole,
            }),
            fade: 0.25,
        };
        let out = composite_subframe(&sub, &[previous, current], 4, 4).unwrap();
        assert!(out.pixels().all(|p| *p == Rgb([50, 100, 150])));
    }

    #[test]
    fn missing_keyframe_is_an_error() {
        let sub = Subframe {
            index: 0,
            frame: FrameSpec {
                level: 0.0,
                scale: 1.0,
                center_x: 0.0,
                center_y: 0.0,
                depth: 10,
            },
            current: KeyframeSlice {
                keyframe: 2,
                crop: CropWindow {
                    left: 0,
                    top: 0,
                    crop_width: 1,
                    crop_height: 1,
                },
            },
            previous: None,
            fade: 1.0,
        };
        assert!(matches!(
            composite_subframe(&sub, &[], 2, 2),
            Err(ExportError::Core(Error::InvalidViewport(_)))
        ));
    }
}
