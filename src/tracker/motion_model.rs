use crate::error::FilterError;
use crate::kalman::TransitionModel;
use crate::PrecisionType;
use na::{DMatrix, DVector};
use nalgebra as na;

/// Constant velocity model over a step of `dt` seconds.
///
/// # Model
/// x = [ u, v, v_u, v_v, w, h ]_T
/// - u: X coordinate of the tracked anchor
/// - v: Y coordinate of the tracked anchor
/// - v_u, v_v: anchor velocity in pixels per second
/// - w, h: width and height of the bounding box
#[derive(Debug, Clone)]
pub struct ConstantVelocity2DModel {
    pub transition_model: DMatrix<PrecisionType>,
    pub transition_noise_covariance: DMatrix<PrecisionType>,
}

impl ConstantVelocity2DModel {
    pub fn new(dt: PrecisionType, process_noise: &[PrecisionType; 6]) -> Result<Self, FilterError> {
        if dt < 0. {
            return Err(FilterError::NegativeElapsedTime(dt));
        }

        // Note that from_row_slice uses row major
        #[rustfmt::skip]
        let transition_model = DMatrix::from_row_slice(6, 6, &[
            1., 0., dt, 0., 0., 0.,
            0., 1., 0., dt, 0., 0.,
            0., 0., 1., 0., 0., 0.,
            0., 0., 0., 1., 0., 0.,
            0., 0., 0., 0., 1., 0.,
            0., 0., 0., 0., 0., 1.]);

        let transition_noise_covariance =
            DMatrix::from_diagonal(&DVector::from_row_slice(process_noise));

        Ok(Self {
            transition_model,
            transition_noise_covariance,
        })
    }
}

impl TransitionModel for ConstantVelocity2DModel {
    fn transition_matrix(&self) -> &DMatrix<PrecisionType> {
        &self.transition_model
    }
    fn transition_noise_covariance(&self) -> &DMatrix<PrecisionType> {
        &self.transition_noise_covariance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dt_is_identity() -> anyhow::Result<()> {
        let model = ConstantVelocity2DModel::new(0., &[1.; 6])?;
        assert_eq!(model.transition_matrix(), &DMatrix::identity(6, 6));
        Ok(())
    }

    #[test]
    fn position_advances_by_velocity() -> anyhow::Result<()> {
        let model = ConstantVelocity2DModel::new(0.5, &[0.; 6])?;
        let x = DVector::from_row_slice(&[10., 20., 4., -2., 8., 6.]);
        let next = model.transition_matrix() * x;
        assert_eq!(next.as_slice(), &[12., 19., 4., -2., 8., 6.]);
        Ok(())
    }

    #[test]
    fn negative_dt_is_rejected() {
        let err = ConstantVelocity2DModel::new(-0.1, &[1.; 6]).unwrap_err();
        assert_eq!(err, FilterError::NegativeElapsedTime(-0.1));
    }
}
