//! Tuning constants for the face tracker.
//!
//! Every field has a default, so a JSON document only needs to name the
//! values it overrides:
//!
//! ```json
//! { "frame_width": 1280, "frame_height": 720, "missing_detection": "predict_only" }
//! ```
use crate::PrecisionType;
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which point of a detection box the filter tracks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Center,
    TopLeft,
}

impl Default for Anchor {
    fn default() -> Self {
        Anchor::Center
    }
}

/// What to feed the filter on a frame without a detection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDetection {
    /// Observe the last estimate again under the low-trust noise.
    HoldLast,
    /// Observe a box centred in the frame under the low-trust noise.
    FrameCenter,
    /// Skip the correction step entirely.
    PredictOnly,
}

impl Default for MissingDetection {
    fn default() -> Self {
        MissingDetection::HoldLast
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub frame_width: PrecisionType,
    pub frame_height: PrecisionType,
    /// Size of the prior box before the first detection.
    pub default_size: (PrecisionType, PrecisionType),
    /// Variance of every state component in the prior.
    pub prior_variance: PrecisionType,
    /// Diagonal of `R` for `[u, v, vu, vv, w, h]`.
    pub process_noise: [PrecisionType; 6],
    /// Diagonal of `Q` when a face was detected.
    pub observed_noise: [PrecisionType; 4],
    /// Diagonal of `Q` for the fallback observation.
    pub missing_noise: [PrecisionType; 4],
    pub anchor: Anchor,
    pub missing_detection: MissingDetection,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            frame_width: 640.,
            frame_height: 480.,
            default_size: (10., 10.),
            prior_variance: 1600.,
            process_noise: [25., 25., 100., 100., 4., 4.],
            observed_noise: [90., 90., 90., 90.],
            missing_noise: [3600., 3600., 3600., 3600.],
            anchor: Anchor::default(),
            missing_detection: MissingDetection::default(),
        }
    }
}

impl TrackingConfig {
    pub fn with_frame_size(width: PrecisionType, height: PrecisionType) -> Self {
        Self {
            frame_width: width,
            frame_height: height,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse tracking config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tracking config {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Measurement noise must be positive definite for the innovation
    /// covariance to stay invertible; process noise may be zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.frame_width > 0. && self.frame_height > 0.,
            "frame size must be positive, got {}x{}",
            self.frame_width,
            self.frame_height
        );
        ensure!(
            self.prior_variance > 0.,
            "prior_variance must be positive, got {}",
            self.prior_variance
        );
        ensure!(
            self.process_noise.iter().all(|v| *v >= 0.),
            "process_noise must be non-negative, got {:?}",
            self.process_noise
        );
        ensure!(
            self.observed_noise.iter().all(|v| *v > 0.),
            "observed_noise must be positive, got {:?}",
            self.observed_noise
        );
        ensure!(
            self.missing_noise.iter().all(|v| *v > 0.),
            "missing_noise must be positive, got {:?}",
            self.missing_noise
        );
        Ok(())
    }

    /// Anchor point of the default box in the middle of the frame.
    pub fn frame_center(&self) -> (PrecisionType, PrecisionType) {
        let (cx, cy) = (self.frame_width / 2., self.frame_height / 2.);
        match self.anchor {
            Anchor::Center => (cx, cy),
            Anchor::TopLeft => (cx - self.default_size.0 / 2., cy - self.default_size.1 / 2.),
        }
    }
}
