use crate::bbox::BBox;
use crate::config::{MissingDetection, TrackingConfig};
use crate::error::FilterError;
use crate::kalman::{Belief, KalmanFilter};
use crate::PrecisionType;
use log::{debug, warn};
use na::DVector;
use nalgebra as na;
use serde::Serialize;
mod linear_observation_model;
pub use linear_observation_model::BoxObservationModel;
mod motion_model;
pub use motion_model::ConstantVelocity2DModel;

/// Circle to draw over the tracked face.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub x: PrecisionType,
    pub y: PrecisionType,
    pub radius: PrecisionType,
}

/// Screen-space view of the belief after a frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub ts: PrecisionType,
    pub bbox: BBox,
    /// Anchor velocity in pixels per second.
    pub velocity: (PrecisionType, PrecisionType),
    /// Standard deviation of the tracked anchor.
    pub position_std: (PrecisionType, PrecisionType),
    /// Whether a detection was fed to the filter on this frame.
    pub observed: bool,
    pub marker: Marker,
}

impl Estimate {
    fn from_belief(belief: &Belief, config: &TrackingConfig, ts: PrecisionType, observed: bool) -> Self {
        let mean = belief.mean();
        let variances = belief.variances();
        let bbox = BBox::from_x(mean.as_slice(), config.anchor);
        let (x, y) = bbox.center();
        Self {
            ts,
            bbox,
            velocity: (mean[2], mean[3]),
            position_std: (variances[0].max(0.).sqrt(), variances[1].max(0.).sqrt()),
            observed,
            marker: Marker {
                x,
                y,
                radius: bbox.width.max(bbox.height).abs() / 2.,
            },
        }
    }
}

/// Single-face tracker: carries the belief from frame to frame and rebuilds
/// the filter around it with the matrices of the current frame.
#[derive(Debug, Clone)]
pub struct TrackingModel {
    config: TrackingConfig,
    belief: Belief,
    last_updated: PrecisionType,
    last_observed: bool,
}

impl TrackingModel {
    /// `ts` is the session start, in seconds.
    pub fn new(config: TrackingConfig, ts: PrecisionType) -> Self {
        let belief = Self::prior(&config);
        Self {
            config,
            belief,
            last_updated: ts,
            last_observed: false,
        }
    }

    /// Zero velocity at the frame centre with the default size.
    fn prior(config: &TrackingConfig) -> Belief {
        let (u, v) = config.frame_center();
        let (w, h) = config.default_size;
        Belief::isotropic(
            DVector::from_row_slice(&[u, v, 0., 0., w, h]),
            config.prior_variance,
        )
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn belief(&self) -> &Belief {
        &self.belief
    }

    pub fn last_updated(&self) -> PrecisionType {
        self.last_updated
    }

    /// Current estimate without advancing time.
    pub fn estimate(&self) -> Estimate {
        Estimate::from_belief(&self.belief, &self.config, self.last_updated, self.last_observed)
    }

    pub fn reset(&mut self, ts: PrecisionType) {
        debug!("reset tracker at {:.3}s", ts);
        self.belief = Self::prior(&self.config);
        self.last_updated = ts;
        self.last_observed = false;
    }

    /// Clock regressions are clamped to zero; a non-finite `ts` is rejected
    /// before it reaches the transition matrix.
    fn elapsed(&self, ts: PrecisionType) -> Result<PrecisionType, FilterError> {
        let dt = ts - self.last_updated;
        if !ts.is_finite() || !dt.is_finite() {
            return Err(FilterError::NonFiniteTimestamp(ts));
        }
        if dt < 0. {
            warn!(
                "{}; clamping to 0",
                FilterError::NegativeElapsedTime(dt)
            );
            Ok(0.)
        } else {
            Ok(dt)
        }
    }

    /// Advance the belief to `ts` and fold in the first of `detections`.
    ///
    /// An empty slice means nothing was detected on this frame, handled per
    /// [`MissingDetection`]. On error neither the belief nor the timestamp
    /// change.
    pub fn update(&mut self, detections: &[BBox], ts: PrecisionType) -> Result<Estimate, FilterError> {
        if detections.len() > 1 {
            debug!("{} detections, tracking the first", detections.len());
        }
        let dt = self.elapsed(ts)?;
        let transition = ConstantVelocity2DModel::new(dt, &self.config.process_noise)?;

        let observed = detections.first().is_some();
        let (observation, z) = match detections.first() {
            Some(bbox) => {
                let (u, v, w, h) = bbox.convert_to_z(self.config.anchor);
                (
                    BoxObservationModel::new(&self.config.observed_noise),
                    Some(DVector::from_row_slice(&[u, v, w, h])),
                )
            }
            None => {
                let observation = BoxObservationModel::new(&self.config.missing_noise);
                let z = match self.config.missing_detection {
                    MissingDetection::HoldLast => Some(observation.project(self.belief.mean())),
                    MissingDetection::FrameCenter => {
                        let mean = self.belief.mean();
                        let centered = BBox::from_center(
                            self.config.frame_width / 2.,
                            self.config.frame_height / 2.,
                            mean[4],
                            mean[5],
                        );
                        let (u, v, w, h) = centered.convert_to_z(self.config.anchor);
                        Some(DVector::from_row_slice(&[u, v, w, h]))
                    }
                    MissingDetection::PredictOnly => None,
                };
                (observation, z)
            }
        };

        let mut kf = KalmanFilter::from_models(&transition, &observation, self.belief.clone())?;
        let belief = match z {
            Some(z) => {
                kf.update(&z)?;
                kf.into_belief()
            }
            None => Self::checked_predict(&kf)?,
        };
        debug!(
            "frame at {:.3}s: dt={:.3}s observed={} mean={:?}",
            ts,
            dt,
            observed,
            belief.mean().as_slice()
        );

        self.belief = belief;
        self.last_updated = ts;
        self.last_observed = observed;
        Ok(self.estimate())
    }

    fn checked_predict(kf: &KalmanFilter) -> Result<Belief, FilterError> {
        let predicted = kf.predict();
        if predicted.is_finite() {
            Ok(predicted)
        } else {
            Err(FilterError::NonFiniteBelief)
        }
    }

    /// Advance the belief to `ts` with the motion model alone.
    pub fn predict_only(&mut self, ts: PrecisionType) -> Result<Estimate, FilterError> {
        let dt = self.elapsed(ts)?;
        let transition = ConstantVelocity2DModel::new(dt, &self.config.process_noise)?;
        let observation = BoxObservationModel::new(&self.config.missing_noise);
        let kf = KalmanFilter::from_models(&transition, &observation, self.belief.clone())?;

        self.belief = Self::checked_predict(&kf)?;
        self.last_updated = ts;
        self.last_observed = false;
        Ok(self.estimate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Anchor;
    use approx::assert_abs_diff_eq;

    fn face_config(anchor: Anchor) -> TrackingConfig {
        TrackingConfig {
            anchor,
            ..TrackingConfig::with_frame_size(640., 480.)
        }
    }

    #[test]
    fn test_prior_is_frame_center() {
        let model = TrackingModel::new(face_config(Anchor::Center), 0.);
        assert_eq!(model.belief().mean().as_slice(), &[320., 240., 0., 0., 10., 10.]);
        assert_eq!(model.belief().variances().as_slice(), &[1600.; 6]);

        let estimate = model.estimate();
        assert_eq!(estimate.marker, Marker { x: 320., y: 240., radius: 5. });
        assert!(!estimate.observed);
    }

    #[test]
    fn test_detection_pulls_corner_towards_box() -> anyhow::Result<()> {
        let mut model = TrackingModel::new(face_config(Anchor::TopLeft), 0.);
        // Corner anchor: the prior corner sits at (315, 235).
        let detection = BBox::new(330., 245., 12., 9.);
        let estimate = model.update(&[detection], 1.)?;

        assert!(estimate.observed);
        assert!(estimate.bbox.x > 315. && estimate.bbox.x <= 330.);
        assert!(estimate.bbox.y > 235. && estimate.bbox.y <= 245.);
        assert!(estimate.bbox.width > 10. && estimate.bbox.width <= 12.);
        assert!(estimate.bbox.height < 10. && estimate.bbox.height >= 9.);
        assert_eq!(model.last_updated(), 1.);
        Ok(())
    }

    #[test]
    fn test_detection_pulls_center_towards_box_center() -> anyhow::Result<()> {
        let mut model = TrackingModel::new(face_config(Anchor::Center), 0.);
        let estimate = model.update(&[BBox::new(330., 245., 12., 9.)], 1.)?;
        let (cx, cy) = estimate.bbox.center();

        assert!(cx > 320. && cx <= 336.);
        assert!(cy > 240. && cy <= 249.5);
        assert!(estimate.position_std.0 < 40.);
        Ok(())
    }

    #[test]
    fn test_missing_detection_follows_prediction() -> anyhow::Result<()> {
        let mut model = TrackingModel::new(face_config(Anchor::Center), 0.);
        let estimate = model.update(&[], 1.)?;

        assert!(!estimate.observed);
        let mean = model.belief().mean();
        for (next, pred) in mean.iter().zip([320., 240., 0., 0., 10., 10.].iter()) {
            assert!((next - pred).abs() <= 0.01 * pred.abs().max(1.));
        }
        Ok(())
    }

    #[test]
    fn test_predict_only_policy_grows_uncertainty() -> anyhow::Result<()> {
        let config = TrackingConfig {
            missing_detection: MissingDetection::PredictOnly,
            ..face_config(Anchor::Center)
        };
        let mut model = TrackingModel::new(config, 0.);
        let before = model.belief().variances();
        model.update(&[], 0.5)?;
        let after = model.belief().variances();

        for (b, a) in before.iter().zip(after.iter()) {
            assert!(a > b);
        }
        assert_eq!(model.belief().mean().as_slice(), &[320., 240., 0., 0., 10., 10.]);
        Ok(())
    }

    #[test]
    fn test_frame_center_fallback_drifts_back() -> anyhow::Result<()> {
        let config = TrackingConfig {
            missing_detection: MissingDetection::FrameCenter,
            ..face_config(Anchor::Center)
        };
        let mut centering = TrackingModel::new(config, 0.);
        centering.update(&[BBox::from_center(500., 400., 20., 20.)], 1.)?;
        let mut holding = TrackingModel::new(face_config(Anchor::Center), 0.);
        holding.update(&[BBox::from_center(500., 400., 20., 20.)], 1.)?;
        assert_eq!(centering.belief(), holding.belief());

        let centered = centering.update(&[], 2.)?.bbox.center();
        let held = holding.update(&[], 2.)?.bbox.center();
        assert!(centered.0 < held.0 && centered.0 > 320.);
        assert!(centered.1 < held.1 && centered.1 > 240.);
        Ok(())
    }

    #[test]
    fn test_frame_center_fallback_keeps_face_size_with_corner_anchor() -> anyhow::Result<()> {
        let config = TrackingConfig {
            missing_detection: MissingDetection::FrameCenter,
            missing_noise: [1e-6; 4],
            ..face_config(Anchor::TopLeft)
        };
        let mut model = TrackingModel::new(config, 0.);
        for i in 0..20 {
            let t = i as PrecisionType * 0.1;
            model.update(&[BBox::from_center(320., 240., 200., 200.)], t)?;
        }
        let estimate = model.update(&[], 2.)?;

        assert_abs_diff_eq!(estimate.marker.x, 320., epsilon = 0.5);
        assert_abs_diff_eq!(estimate.marker.y, 240., epsilon = 0.5);
        assert_abs_diff_eq!(estimate.bbox.width, 200., epsilon = 0.5);
        Ok(())
    }

    #[test]
    fn test_velocity_is_learned() -> anyhow::Result<()> {
        let mut model = TrackingModel::new(face_config(Anchor::Center), 0.);
        for i in 0..30 {
            let t = i as PrecisionType * 0.1;
            model.update(&[BBox::from_center(100. + 50. * t, 200., 40., 40.)], t)?;
        }
        let estimate = model.estimate();
        assert_abs_diff_eq!(estimate.velocity.0, 50., epsilon = 10.);
        assert_abs_diff_eq!(estimate.velocity.1, 0., epsilon = 5.);
        assert_abs_diff_eq!(estimate.bbox.width, 40., epsilon = 1.);
        Ok(())
    }

    #[test]
    fn test_first_detection_wins() -> anyhow::Result<()> {
        let mut first = TrackingModel::new(face_config(Anchor::Center), 0.);
        let mut both = first.clone();
        let a = BBox::new(100., 100., 30., 30.);
        let b = BBox::new(500., 300., 30., 30.);

        assert_eq!(first.update(&[a], 1.)?, both.update(&[a, b], 1.)?);
        Ok(())
    }

    #[test]
    fn test_clock_regression_is_clamped() -> anyhow::Result<()> {
        let mut model = TrackingModel::new(face_config(Anchor::Center), 10.);
        let mut reference = model.clone();
        let detection = [BBox::new(300., 200., 10., 10.)];

        let regressed = model.update(&detection, 9.)?;
        let same_time = reference.update(&detection, 10.)?;
        assert_eq!(regressed.bbox, same_time.bbox);
        assert_eq!(model.belief(), reference.belief());
        assert_eq!(model.last_updated(), 9.);
        Ok(())
    }

    #[test]
    fn test_failed_update_keeps_belief() {
        // Measurement noise cancelling the prior variance exactly makes S zero.
        let config = TrackingConfig {
            observed_noise: [-1625., -1625., -1604., -1604.],
            ..face_config(Anchor::Center)
        };
        let mut model = TrackingModel::new(config, 0.);
        let before = model.belief().clone();

        let err = model.update(&[BBox::new(0., 0., 10., 10.)], 0.).unwrap_err();
        assert_eq!(err, FilterError::SingularInnovationCovariance);
        assert_eq!(model.belief(), &before);
        assert_eq!(model.last_updated(), 0.);
    }

    #[test]
    fn test_non_finite_timestamp_is_rejected() -> anyhow::Result<()> {
        let mut model = TrackingModel::new(face_config(Anchor::Center), 0.);
        let before = model.belief().clone();
        let face = [BBox::new(300., 200., 40., 40.)];

        for &ts in &[PrecisionType::NAN, PrecisionType::INFINITY] {
            let err = model.update(&face, ts).unwrap_err();
            assert!(matches!(err, FilterError::NonFiniteTimestamp(_)));
            let err = model.predict_only(ts).unwrap_err();
            assert!(matches!(err, FilterError::NonFiniteTimestamp(_)));
        }
        assert_eq!(model.belief(), &before);
        assert_eq!(model.last_updated(), 0.);

        let estimate = model.update(&face, 1.)?;
        assert!(estimate.marker.x.is_finite() && estimate.marker.radius.is_finite());
        Ok(())
    }

    #[test]
    fn test_non_finite_prediction_keeps_belief() {
        let config = TrackingConfig {
            process_noise: [PrecisionType::INFINITY; 6],
            missing_detection: MissingDetection::PredictOnly,
            ..face_config(Anchor::Center)
        };
        let mut model = TrackingModel::new(config, 0.);
        let before = model.belief().clone();

        assert_eq!(model.predict_only(1.).unwrap_err(), FilterError::NonFiniteBelief);
        assert_eq!(model.update(&[], 1.).unwrap_err(), FilterError::NonFiniteBelief);
        assert_eq!(model.belief(), &before);
        assert_eq!(model.last_updated(), 0.);
    }

    #[test]
    fn test_reset_restores_prior() -> anyhow::Result<()> {
        let mut model = TrackingModel::new(face_config(Anchor::Center), 0.);
        model.update(&[BBox::new(10., 10., 50., 50.)], 1.)?;
        model.reset(2.);
        assert_eq!(model.belief(), TrackingModel::new(face_config(Anchor::Center), 2.).belief());
        assert_eq!(model.last_updated(), 2.);
        Ok(())
    }
}
