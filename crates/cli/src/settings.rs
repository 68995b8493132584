use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use facewatch_core::detection::domain::detection_mode::DetectionMode;
use facewatch_core::detection::domain::detection_params::{
    DetectionParams, DEFAULT_MIN_NEIGHBORS, DEFAULT_MIN_SIZE, DEFAULT_SCALE_FACTOR,
};
use facewatch_core::pipeline::pipeline_executor::PipelineConfig;
use facewatch_core::shared::constants::{
    DEFAULT_CYCLE_INTERVAL_MS, DEFAULT_HANDOFF_CAPACITY, DEFAULT_MAX_CONSECUTIVE_FAILURES,
};

/// Smallest eye side searched for inside a face crop.
pub const DEFAULT_EYE_MIN_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Single,
    Nested,
}

impl From<Mode> for DetectionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Single => DetectionMode::Single,
            Mode::Nested => DetectionMode::Nested,
        }
    }
}

/// Persistent defaults, overridden field by field by command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub device: String,
    pub mode: Mode,
    pub face_model: Option<PathBuf>,
    pub eye_model: Option<PathBuf>,
    pub scale_factor: f64,
    pub min_neighbors: u32,
    pub min_size: u32,
    pub max_size: Option<u32>,
    pub eye_min_size: u32,
    pub interval_ms: u64,
    pub max_consecutive_failures: u32,
    pub snapshot: Option<PathBuf>,
    pub looping: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: "any".to_string(),
            mode: Mode::Single,
            face_model: None,
            eye_model: None,
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: DEFAULT_MIN_SIZE.0,
            max_size: None,
            eye_min_size: DEFAULT_EYE_MIN_SIZE,
            interval_ms: DEFAULT_CYCLE_INTERVAL_MS,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            snapshot: None,
            looping: false,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("facewatch").join("settings.json"))
    }

    /// Settings from the user config directory, or defaults if there are none.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Settings from an explicit file. Missing or invalid files are errors.
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read settings {}: {e}", path.display()))?;
        let settings = serde_json::from_str(&json)
            .map_err(|e| format!("Invalid settings {}: {e}", path.display()))?;
        Ok(settings)
    }

    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_size: (self.min_size, self.min_size),
            max_size: self.max_size.map(|s| (s, s)),
        }
    }

    /// Parameters for the eye detector, which searches inside each face crop.
    /// Face size limits do not apply there.
    pub fn eye_detection_params(&self) -> DetectionParams {
        DetectionParams {
            min_size: (self.eye_min_size, self.eye_min_size),
            max_size: None,
            ..self.detection_params()
        }
    }

    pub fn pipeline_config(&self, max_frames: Option<usize>) -> PipelineConfig {
        PipelineConfig {
            interval: std::time::Duration::from_millis(self.interval_ms),
            max_consecutive_failures: self.max_consecutive_failures,
            handoff_capacity: DEFAULT_HANDOFF_CAPACITY,
            max_frames,
        }
    }
}
