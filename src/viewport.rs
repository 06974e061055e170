//! Viewport geometry.
//!
//! A [`Viewport`] is a rectangular pixel grid laid over the complex plane:
//! its centre sits at pixel `(width / 2, height / 2)` and every pixel spans
//! `scale` complex units. Screen y grows downwards while the imaginary axis
//! grows upwards, so the y mapping is inverted.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ------------------------- Viewport -------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub center_x: f64,
    pub center_y: f64,
    /// Complex-plane units per pixel.
    pub scale: f64,
    pub width: u32,
    pub height: u32,
    /// Maximum iteration count.
    pub depth: u32,
}

impl Viewport {
    /// Builds a validated viewport.
    pub fn new(
        center_x: f64,
        center_y: f64,
        scale: f64,
        width: u32,
        height: u32,
        depth: u32,
    ) -> Result<Self> {
        let viewport = Self {
            center_x,
            center_y,
            scale,
            width,
            height,
            depth,
        };
        viewport.validate()?;
        Ok(viewport)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::InvalidViewport(format!(
                "scale must be finite and positive, got {}",
                self.scale
            )));
        }
        if !self.center_x.is_finite() || !self.center_y.is_finite() {
            return Err(Error::InvalidViewport(format!(
                "center must be finite, got ({}, {})",
                self.center_x, self.center_y
            )));
        }
        if self.depth == 0 {
            return Err(Error::InvalidViewport("depth must be at least 1".into()));
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn pixel_to_complex(&self, px: f64, py: f64) -> (f64, f64) {
        pixel_to_complex(px, py, self)
    }

    pub fn complex_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        complex_to_pixel(x, y, self)
    }
}

pub fn pixel_to_complex(px: f64, py: f64, viewport: &Viewport) -> (f64, f64) {
    let half_w = viewport.width as f64 / 2.0;
    let half_h = viewport.height as f64 / 2.0;
    (
        viewport.center_x + (px - half_w) * viewport.scale,
        viewport.center_y - (py - half_h) * viewport.scale,
    )
}

pub fn complex_to_pixel(x: f64, y: f64, viewport: &Viewport) -> (f64, f64) {
    let half_w = viewport.width as f64 / 2.0;
    let half_h = viewport.height as f64 / 2.0;
    (
        (x - viewport.center_x) / viewport.scale + half_w,
        (viewport.center_y - y) / viewport.scale + half_h,
    )
}

// ------------------------- Frames -------------------------

/// One point on a zoom trajectory. `level` may be fractional for subframes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FrameSpec {
    pub level: f64,
    pub scale: f64,
    pub center_x: f64,
    pub center_y: f64,
    pub depth: u32,
}

impl FrameSpec {
    pub fn viewport(&self, width: u32, height: u32) -> Viewport {
        Viewport {
            center_x: self.center_x,
            center_y: self.center_y,
            scale: self.scale,
            width,
            height,
            depth: self.depth,
        }
    }
}

/// Source-pixel rectangle of an enclosing frame that shows a more zoomed frame.
///
/// `left` and `top` are raw and may be negative when the inner frame pokes out
/// of the outer one; use [`CropWindow::clamped`] before cutting pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CropWindow {
    pub left: i64,
    pub top: i64,
    pub crop_width: u32,
    pub crop_height: u32,
}

impl CropWindow {
    pub fn clamped(&self) -> Self {
        Self {
            left: self.left.max(0),
            top: self.top.max(0),
            ..*self
        }
    }

    /// Clamps the window so it lies entirely inside a `width` x `height` source
    /// and is at least one pixel in each direction.
    pub fn fit_within(&self, width: u32, height: u32) -> Self {
        let clamped = self.clamped();
        let left = (clamped.left as u64).min(width.saturating_sub(1) as u64) as u32;
        let top = (clamped.top as u64).min(height.saturating_sub(1) as u64) as u32;
        Self {
            left: left as i64,
            top: top as i64,
            crop_width: clamped.crop_width.clamp(1, (width - left).max(1)),
            crop_height: clamped.crop_height.clamp(1, (height - top).max(1)),
        }
    }
}

/// Computes where `inner` sits inside `outer` when both are rendered at
/// `pixel_width` x `pixel_height`.
pub fn crop_window_between(
    outer: &FrameSpec,
    inner: &FrameSpec,
    pixel_width: u32,
    pixel_height: u32,
) -> Result<CropWindow> {
    if outer.scale == 0.0 || !outer.scale.is_finite() {
        return Err(Error::InvalidViewport(format!(
            "outer frame scale must be finite and non-zero, got {}",
            outer.scale
        )));
    }
    let w = pixel_width as f64;
    let h = pixel_height as f64;
    let r = inner.scale / outer.scale;
    let delta_x = (inner.center_x - outer.center_x) / outer.scale;
    let delta_y = (inner.center_y - outer.center_y) / outer.scale;

    Ok(CropWindow {
        left: (delta_x + (1.0 - r) * w / 2.0).floor() as i64,
        top: (-delta_y + (1.0 - r) * h / 2.0).floor() as i64,
        crop_width: (r * w).floor().max(0.0) as u32,
        crop_height: (r * h).floor().max(0.0) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(level: f64, scale: f64, x: f64, y: f64) -> FrameSpec {
        FrameSpec {
            level,
            scale,
            center_x: x,
            center_y: y,
            depth: 500,
        }
    }

    #[test]
    fn pixel_mapping_round_trips() {
        let v = Viewport::new(-0.743, 0.1318, 1.0 / 4096.0, 150, 100, 300).unwrap();
        for py in (0..100).step_by(7) {
            for px in (0..150).step_by(11) {
                let (x, y) = v.pixel_to_complex(px as f64, py as f64);
                let (bx, by) = v.complex_to_pixel(x, y);
                assert!((bx - px as f64).abs() < 1e-6, "x {px} -> {bx}");
                assert!((by - py as f64).abs() < 1e-6, "y {py} -> {by}");
            }
        }
    }

    #[test]
    fn y_axis_is_inverted() {
        let v = Viewport::new(0.0, 0.0, 0.5, 10, 10, 10).unwrap();
        let (_, top) = v.pixel_to_complex(5.0, 0.0);
        let (_, bottom) = v.pixel_to_complex(5.0, 10.0);
        assert_eq!(top, 2.5);
        assert_eq!(bottom, -2.5);
        assert_eq!(v.pixel_to_complex(5.0, 5.0), (0.0, 0.0));
    }

    #[test]
    fn rejects_bad_viewports() {
        assert!(matches!(
            Viewport::new(0.0, 0.0, 0.0, 10, 10, 10),
            Err(Error::InvalidViewport(_))
        ));
        assert!(Viewport::new(0.0, 0.0, -1.0, 10, 10, 10).is_err());
        assert!(Viewport::new(f64::NAN, 0.0, 1.0, 10, 10, 10).is_err());
        assert!(Viewport::new(0.0, 0.0, f64::INFINITY, 10, 10, 10).is_err());
        assert!(Viewport::new(0.0, 0.0, 1.0, 10, 10, 0).is_err());
    }

    #[test]
    fn crop_of_identical_frames_is_whole_image() {
        let f = frame(3.0, 2f64.powi(-11), -0.3, 0.66);
        let crop = crop_window_between(&f, &f, 504, 336).unwrap();
        assert_eq!(
            crop,
            CropWindow {
                left: 0,
                top: 0,
                crop_width: 504,
                crop_height: 336
            }
        );
    }

    #[test]
    fn crop_of_half_scale_centred_frame() {
        let outer = frame(0.0, 0.0625, 0.0, 0.0);
        let inner = frame(1.0, 0.03125, 0.0, 0.0);
        let crop = crop_window_between(&outer, &inner, 200, 100).unwrap();
        assert_eq!(crop.left, 50);
        assert_eq!(crop.top, 25);
        assert_eq!(crop.crop_width, 100);
        assert_eq!(crop.crop_height, 50);
    }

    #[test]
    fn crop_follows_inner_centre_offset() {
        let outer = frame(0.0, 0.0625, 0.0, 0.0);
        // 20px right and 10px up of the outer centre
        let inner = frame(1.0, 0.03125, 1.25, 0.625);
        let crop = crop_window_between(&outer, &inner, 200, 100).unwrap();
        assert_eq!(crop.left, 70);
        assert_eq!(crop.top, 15);
    }

    #[test]
    fn raw_crop_can_be_negative_and_clamps() {
        let outer = frame(0.0, 0.0625, 0.0, 0.0);
        let inner = frame(1.0, 0.03125, -8.0, 8.0);
        let crop = crop_window_between(&outer, &inner, 200, 100).unwrap();
        assert!(crop.left < 0);
        assert!(crop.top < 0);
        let clamped = crop.clamped();
        assert_eq!((clamped.left, clamped.top), (0, 0));
        assert_eq!(clamped.crop_width, crop.crop_width);
    }

    #[test]
    fn fit_within_keeps_window_inside_source() {
        let crop = CropWindow {
            left: 190,
            top: -4,
            crop_width: 100,
            crop_height: 50,
        };
        let fitted = crop.fit_within(200, 100);
        assert_eq!(fitted.left, 190);
        assert_eq!(fitted.top, 0);
        assert_eq!(fitted.crop_width, 10);
        assert_eq!(fitted.crop_height, 50);
    }

    #[test]
    fn zero_outer_scale_is_invalid() {
        let outer = frame(0.0, 0.0, 0.0, 0.0);
        let inner = frame(1.0, 0.5, 0.0, 0.0);
        assert!(matches!(
            crop_window_between(&outer, &inner, 10, 10),
            Err(Error::InvalidViewport(_))
        ));
    }
}
