use crate::kalman::ObservationModel;
use crate::PrecisionType;
use na::{DMatrix, DVector};
use nalgebra as na;

// observation model -------

/// Observes `[u, v, w, h]` out of the six-dimensional box state.
#[derive(Debug, Clone)]
pub struct BoxObservationModel {
    pub observation_matrix: DMatrix<PrecisionType>,
    pub observation_noise_covariance: DMatrix<PrecisionType>,
}

impl BoxObservationModel {
    pub fn new(observation_noise: &[PrecisionType; 4]) -> Self {
        // We observe the anchor and the size, never the velocity.
        // Note that from_row_slice uses row major
        #[rustfmt::skip]
        let observation_matrix = DMatrix::from_row_slice(4, 6, &[
            1., 0., 0., 0., 0., 0.,
            0., 1., 0., 0., 0., 0.,
            0., 0., 0., 0., 1., 0.,
            0., 0., 0., 0., 0., 1.]);

        let observation_noise_covariance =
            DMatrix::from_diagonal(&DVector::from_row_slice(observation_noise));

        Self {
            observation_matrix,
            observation_noise_covariance,
        }
    }

    /// `C x`, the observation a state would produce without noise.
    pub fn project(&self, state: &DVector<PrecisionType>) -> DVector<PrecisionType> {
        &self.observation_matrix * state
    }
}

impl ObservationModel for BoxObservationModel {
    fn observation_matrix(&self) -> &DMatrix<PrecisionType> {
        &self.observation_matrix
    }
    fn observation_noise_covariance(&self) -> &DMatrix<PrecisionType> {
        &self.observation_noise_covariance
    }
}
