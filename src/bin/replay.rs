//! Replay a recorded detection log through the tracker.
//!
//! Input is a JSON array of `{"ts": seconds, "detections": [{x, y, width, height}, ...]}`;
//! one estimate per frame is printed to stdout as a JSON line.
use anyhow::{bail, Context};
use facetrack_rs::pipeline::{DetectionLoop, Detector, Frame, FrameSource, Renderer};
use facetrack_rs::{BBox, Estimate, TrackingConfig};
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::{self, Write};

#[derive(Debug, Deserialize)]
struct RecordedFrame {
    ts: f64,
    #[serde(default)]
    detections: Vec<BBox>,
}

/// Serves the timestamps of the log as empty frames.
struct Timeline {
    width: u32,
    height: u32,
    ts: VecDeque<f64>,
}

impl FrameSource for Timeline {
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        Ok(self
            .ts
            .pop_front()
            .map(|ts| Frame::new(self.width, self.height, ts, vec![])))
    }
}

/// Hands out the recorded detections in frame order.
struct Recorded(VecDeque<Vec<BBox>>);

impl Detector for Recorded {
    fn detect(&mut self, _frame: &Frame) -> anyhow::Result<Vec<BBox>> {
        Ok(self.0.pop_front().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "recorded"
    }
}

struct JsonLines<W: Write>(W);

impl<W: Write> Renderer for JsonLines<W> {
    fn draw(&mut self, _frame: &Frame, estimate: &Estimate) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.0, estimate)?;
        writeln!(self.0)?;
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let log_path = match args.next() {
        Some(path) => path,
        None => bail!("usage: replay <detections.json> [config.json]"),
    };
    let config = match args.next() {
        Some(path) => TrackingConfig::from_path(path)?,
        None => TrackingConfig::default(),
    };

    let json = std::fs::read_to_string(&log_path)
        .with_context(|| format!("Failed to read detection log {}", log_path))?;
    let frames: Vec<RecordedFrame> =
        serde_json::from_str(&json).context("Failed to parse detection log")?;
    let start = frames.first().map(|f| f.ts).unwrap_or(0.);

    let timeline = Timeline {
        width: config.frame_width as u32,
        height: config.frame_height as u32,
        ts: frames.iter().map(|f| f.ts).collect(),
    };
    let detector = Recorded(frames.into_iter().map(|f| f.detections).collect());
    let stdout = io::stdout();
    let renderer = JsonLines(io::BufWriter::new(stdout.lock()));

    let mut pipeline = DetectionLoop::new(timeline, detector, renderer, config, start);
    let processed = pipeline.run()?;
    log::info!("replayed {} frames", processed);
    Ok(())
}
