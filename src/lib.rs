mod bbox;
pub mod config;
mod error;
pub mod kalman;
pub mod pipeline;
pub mod tracker;

pub use bbox::BBox;
pub use config::{Anchor, MissingDetection, TrackingConfig};
pub use error::FilterError;
pub use tracker::{Estimate, Marker, TrackingModel};

pub type PrecisionType = f64;

use libc::{c_char, size_t};
use log::error;
use std::ffi::CStr;
use std::slice;

/// Wrapper around the tracking model for hosts driving it through the C ABI.
///
/// A handle must not be used from two threads at once.
pub struct FaceTracker {
    model: TrackingModel,
}

impl FaceTracker {
    pub fn new(config: TrackingConfig, ts: PrecisionType) -> Self {
        FaceTracker {
            model: TrackingModel::new(config, ts),
        }
    }

    /// `None` when the frame could not be tracked at all; the belief is then
    /// left as it was.
    pub fn update(&mut self, detections: &[BBox], ts: PrecisionType) -> Option<Estimate> {
        pipeline::track_frame(&mut self.model, detections, ts)
            .map_err(|e| error!("Failed to track frame at {:.3}s: {}", ts, e))
            .ok()
    }

    pub fn predict(&mut self, ts: PrecisionType) -> Option<Estimate> {
        self.model
            .predict_only(ts)
            .map_err(|e| error!("Failed to predict at {:.3}s: {}", ts, e))
            .ok()
    }

    pub fn reset(&mut self, ts: PrecisionType) {
        self.model.reset(ts);
    }

    pub fn estimate(&self) -> Estimate {
        self.model.estimate()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DetectionBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<DetectionBox> for BBox {
    fn from(b: DetectionBox) -> Self {
        BBox::new(b.x, b.y, b.width, b.height)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct TrackedMarker {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub observed: bool,
}

impl From<&Estimate> for TrackedMarker {
    fn from(estimate: &Estimate) -> Self {
        TrackedMarker {
            x: estimate.marker.x,
            y: estimate.marker.y,
            radius: estimate.marker.radius,
            observed: estimate.observed,
        }
    }
}

fn write_marker(out: *mut TrackedMarker, estimate: Option<Estimate>) -> bool {
    match estimate {
        Some(estimate) => {
            if !out.is_null() {
                unsafe { *out = TrackedMarker::from(&estimate) };
            }
            true
        }
        None => false,
    }
}

#[no_mangle]
pub extern "C" fn face_tracker_new(width: u32, height: u32, ts: f64) -> *mut FaceTracker {
    let config = TrackingConfig::with_frame_size(width as PrecisionType, height as PrecisionType);
    Box::into_raw(Box::new(FaceTracker::new(config, ts)))
}

/// Returns null if `config` is not a valid JSON tracking config.
#[no_mangle]
pub extern "C" fn face_tracker_new_from_json(config: *const c_char, ts: f64) -> *mut FaceTracker {
    let config = unsafe {
        assert!(!config.is_null());
        CStr::from_ptr(config)
    };
    let config = config
        .to_str()
        .map_err(anyhow::Error::from)
        .and_then(TrackingConfig::from_json);
    match config {
        Ok(config) => Box::into_raw(Box::new(FaceTracker::new(config, ts))),
        Err(e) => {
            error!("Failed to configure face tracker: {:#}", e);
            std::ptr::null_mut()
        }
    }
}

#[no_mangle]
pub extern "C" fn face_tracker_update(
    ptr: *mut FaceTracker,
    boxes: *const DetectionBox,
    len: size_t,
    ts: f64,
    out: *mut TrackedMarker,
) -> bool {
    let tracker = unsafe {
        assert!(!ptr.is_null());
        &mut *ptr
    };
    let detections: Vec<BBox> = if len == 0 {
        vec![]
    } else {
        let boxes = unsafe {
            assert!(!boxes.is_null());
            slice::from_raw_parts(boxes, len as usize)
        };
        boxes.iter().map(|b| BBox::from(*b)).collect()
    };

    write_marker(out, tracker.update(&detections, ts))
}

#[no_mangle]
pub extern "C" fn face_tracker_predict(ptr: *mut FaceTracker, ts: f64, out: *mut TrackedMarker) -> bool {
    let tracker = unsafe {
        assert!(!ptr.is_null());
        &mut *ptr
    };
    write_marker(out, tracker.predict(ts))
}

#[no_mangle]
pub extern "C" fn face_tracker_reset(ptr: *mut FaceTracker, ts: f64) {
    let tracker = unsafe {
        assert!(!ptr.is_null());
        &mut *ptr
    };
    tracker.reset(ts);
}

#[no_mangle]
pub extern "C" fn face_tracker_free(ptr: *mut FaceTracker) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(ptr));
    }
}
