//! mandelscry: finds visually interesting points on the Mandelbrot set
//! boundary and plans smooth zoom animations onto them.
//!
//! - [`escape`]: escape-time evaluation of a [`Viewport`] into an [`EscapeGrid`]
//! - [`profile`]: depth histograms, block density and edge checks
//! - [`scry`]: randomized seek/refine search for a [`TargetPoint`]
//! - [`trajectory`]: keyframes and eased subframes from origin to target
//! - [`render`]: preview colouring, compositing and PNG export
//! - [`config`]: `.toml` / `.json` settings

pub mod config;
pub mod error;
pub mod escape;
pub mod profile;
pub mod render;
pub mod scry;
pub mod trajectory;
pub mod viewport;

pub use config::{ConfigError, Settings};
pub use error::{Error, Result};
pub use escape::{escape_time, evaluate, CancelToken, EscapeGrid, Evaluator, IterationPolicy};
pub use profile::{
    boundary_sides, collate_depths, density_profile, BoundarySides, DensityProfile, DepthHistogram,
};
pub use render::{export_frames, preview_image, ExportError, OutputSettings};
pub use scry::{find_target, ScryConfig, Scryer, TargetPoint};
pub use trajectory::{plan_trajectory, Subframe, TrajectoryConfig, TrajectoryPlanner};
pub use viewport::{
    complex_to_pixel, crop_window_between, pixel_to_complex, CropWindow, FrameSpec, Viewport,
};
