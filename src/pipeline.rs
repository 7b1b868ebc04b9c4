//! Per-frame driver: frame source -> detector -> tracking model -> renderer.
use crate::bbox::BBox;
use crate::config::TrackingConfig;
use crate::error::FilterError;
use crate::tracker::{Estimate, TrackingModel};
use crate::PrecisionType;
use anyhow::Context;
use log::{debug, warn};

/// A captured video frame. Pixels are opaque to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Capture time in seconds.
    pub ts: PrecisionType,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, ts: PrecisionType, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            ts,
            pixels,
        }
    }
}

pub trait FrameSource {
    /// `None` once the source is exhausted.
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>>;
}

pub trait Detector {
    /// Faces found in `frame`, possibly none.
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<BBox>>;

    /// Detector name, for logging
    fn name(&self) -> &str;
}

pub trait Renderer {
    fn draw(&mut self, frame: &Frame, estimate: &Estimate) -> anyhow::Result<()>;
}

/// Update `model`, falling back to prediction alone for this frame when the
/// innovation covariance cannot be inverted.
pub fn track_frame(
    model: &mut TrackingModel,
    detections: &[BBox],
    ts: PrecisionType,
) -> Result<Estimate, FilterError> {
    match model.update(detections, ts) {
        Err(FilterError::SingularInnovationCovariance) => {
            warn!("{} at {:.3}s, predicting only", FilterError::SingularInnovationCovariance, ts);
            model.predict_only(ts)
        }
        other => other,
    }
}

/// Runs one frame at a time; the next frame is not pulled before the
/// current one has been drawn.
pub struct DetectionLoop<S, D, R> {
    source: S,
    detector: D,
    renderer: R,
    model: TrackingModel,
    frame_count: u64,
}

impl<S, D, R> DetectionLoop<S, D, R>
where
    S: FrameSource,
    D: Detector,
    R: Renderer,
{
    pub fn new(source: S, detector: D, renderer: R, config: TrackingConfig, start: PrecisionType) -> Self {
        Self {
            source,
            detector,
            renderer,
            model: TrackingModel::new(config, start),
            frame_count: 0,
        }
    }

    pub fn model(&self) -> &TrackingModel {
        &self.model
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Process the next frame. Returns `None` once the source is exhausted.
    ///
    /// A failing detector counts as a frame without detection; a frame with a
    /// non-finite timestamp is drawn with the estimate of the previous one.
    pub fn step(&mut self) -> anyhow::Result<Option<Estimate>> {
        let frame = match self.source.next_frame().context("Failed to grab frame")? {
            Some(frame) => frame,
            None => return Ok(None),
        };
        self.frame_count += 1;

        let detections = self.detector.detect(&frame).unwrap_or_else(|e| {
            warn!("{} failed on frame {}: {:#}", self.detector.name(), self.frame_count, e);
            vec![]
        });
        debug!(
            "frame {} at {:.3}s: {} detection(s)",
            self.frame_count,
            frame.ts,
            detections.len()
        );

        let estimate = match track_frame(&mut self.model, &detections, frame.ts) {
            Err(FilterError::NonFiniteTimestamp(ts)) => {
                warn!("skipping frame {} with timestamp {}", self.frame_count, ts);
                self.model.estimate()
            }
            other => other?,
        };
        self.renderer
            .draw(&frame, &estimate)
            .context("Failed to draw estimate")?;
        Ok(Some(estimate))
    }

    /// Drain the source. Returns the number of frames processed.
    pub fn run(&mut self) -> anyhow::Result<u64> {
        let mut processed = 0;
        while self.step()?.is_some() {
            processed += 1;
        }
        Ok(processed)
    }
}
