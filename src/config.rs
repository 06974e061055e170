//! Settings files (`.toml` or `.json`).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::escape::Evaluator;
use crate::render::OutputSettings;
use crate::scry::ScryConfig;
use crate::trajectory::TrajectoryConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub search: ScryConfig,
    pub trajectory: TrajectoryConfig,
    pub output: OutputSettings,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error(transparent)]
    Invalid(#[from] Error),
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let settings: Settings = match path.extension().and_then(|ext| ext.to_str()).unwrap_or("") {
            "json" => serde_json::from_str(&data)?,
            "toml" => toml::from_str(&data)?,
            _ => match serde_json::from_str(&data) {
                Ok(settings) => settings,
                Err(_) => toml::from_str(&data)?,
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Loads `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let s = &self.search;
        if s.width == 0 || s.height == 0 {
            return Err(Error::InvalidViewport("search grid must be non-empty".into()));
        }
        if s.block_size == 0 || s.width < s.block_size || s.height < s.block_size {
            return Err(Error::InvalidViewport(format!(
                "search grid {}x{} cannot hold a {}px block",
                s.width, s.height, s.block_size
            )));
        }
        let o = &self.output;
        if o.width == 0 || o.height == 0 {
            return Err(Error::InvalidViewport("output size must be non-empty".into()));
        }
        if o.frames_per_level == 0 {
            return Err(Error::InvalidViewport("frames_per_level must be at least 1".into()));
        }
        let t = &self.trajectory;
        if !(t.base > 1.0) || !t.scale_exponent.is_finite() {
            return Err(Error::InvalidViewport(format!(
                "trajectory base must exceed 1 and the scale exponent be finite, got {} / {}",
                t.base, t.scale_exponent
            )));
        }
        Ok(())
    }

    /// Evaluator used for rendering output frames.
    pub fn render_evaluator(&self) -> Evaluator {
        Evaluator::new(self.search.policy).with_orphan_smoothing(self.output.smooth_orphans)
    }
}
