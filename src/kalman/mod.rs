//! Linear Kalman filter with explicit transition and observation models.
//!
//! Notation follows the probabilistic-robotics convention:
//! - `A`: state transition, `x_t = A x_{t-1} + eps_t`
//! - `R`: covariance of the transition noise `eps_t`
//! - `C`: observation matrix, `z_t = C x_t + delta_t`
//! - `Q`: covariance of the observation noise `delta_t`
use crate::error::FilterError;
use crate::PrecisionType;
use log::trace;
use na::{DMatrix, DVector};
use nalgebra as na;

/// Mean and covariance of the state estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Belief {
    mean: DVector<PrecisionType>,
    covariance: DMatrix<PrecisionType>,
}

impl Belief {
    pub fn new(
        mean: DVector<PrecisionType>,
        covariance: DMatrix<PrecisionType>,
    ) -> Result<Self, FilterError> {
        let n = mean.nrows();
        FilterError::check_shape("covariance", (n, n), covariance.shape())?;
        Ok(Self { mean, covariance })
    }

    /// Belief with the same variance on every component and no correlation.
    pub fn isotropic(mean: DVector<PrecisionType>, variance: PrecisionType) -> Self {
        let n = mean.nrows();
        Self {
            mean,
            covariance: DMatrix::identity(n, n) * variance,
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.mean.nrows()
    }

    pub fn mean(&self) -> &DVector<PrecisionType> {
        &self.mean
    }

    pub fn covariance(&self) -> &DMatrix<PrecisionType> {
        &self.covariance
    }

    /// Diagonal of the covariance.
    pub fn variances(&self) -> DVector<PrecisionType> {
        self.covariance.diagonal()
    }

    pub fn is_finite(&self) -> bool {
        self.mean.iter().chain(self.covariance.iter()).all(|v| v.is_finite())
    }
}

/// Provides `A` and `R`.
pub trait TransitionModel {
    fn transition_matrix(&self) -> &DMatrix<PrecisionType>;
    fn transition_noise_covariance(&self) -> &DMatrix<PrecisionType>;
}

/// Provides `C` and `Q`.
pub trait ObservationModel {
    fn observation_matrix(&self) -> &DMatrix<PrecisionType>;
    fn observation_noise_covariance(&self) -> &DMatrix<PrecisionType>;
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    transition_matrix: DMatrix<PrecisionType>,
    transition_noise_covariance: DMatrix<PrecisionType>,
    observation_matrix: DMatrix<PrecisionType>,
    observation_noise_covariance: DMatrix<PrecisionType>,
    belief: Belief,
}

impl KalmanFilter {
    /// Every operand is checked against the state dimension of `belief` and the
    /// observation dimension given by the rows of `observation_matrix`.
    pub fn new(
        transition_matrix: DMatrix<PrecisionType>,
        transition_noise_covariance: DMatrix<PrecisionType>,
        observation_matrix: DMatrix<PrecisionType>,
        observation_noise_covariance: DMatrix<PrecisionType>,
        belief: Belief,
    ) -> Result<Self, FilterError> {
        let n = belief.dim();
        let m = observation_matrix.nrows();
        FilterError::check_shape("transition matrix", (n, n), transition_matrix.shape())?;
        FilterError::check_shape(
            "transition noise covariance",
            (n, n),
            transition_noise_covariance.shape(),
        )?;
        FilterError::check_shape("observation matrix", (m, n), observation_matrix.shape())?;
        FilterError::check_shape(
            "observation noise covariance",
            (m, m),
            observation_noise_covariance.shape(),
        )?;

        Ok(Self {
            transition_matrix,
            transition_noise_covariance,
            observation_matrix,
            observation_noise_covariance,
            belief,
        })
    }

    pub fn from_models<T, O>(transition: &T, observation: &O, belief: Belief) -> Result<Self, FilterError>
    where
        T: TransitionModel,
        O: ObservationModel,
    {
        Self::new(
            transition.transition_matrix().clone(),
            transition.transition_noise_covariance().clone(),
            observation.observation_matrix().clone(),
            observation.observation_noise_covariance().clone(),
            belief,
        )
    }

    pub fn belief(&self) -> &Belief {
        &self.belief
    }

    pub fn into_belief(self) -> Belief {
        self.belief
    }

    /// Project the belief one step forward without looking at an observation.
    ///
    /// `mu_pred = A mu`, `sigma_pred = A sigma A^T + R`
    pub fn predict(&self) -> Belief {
        let a = &self.transition_matrix;
        let mean = a * &self.belief.mean;
        let covariance = a * &self.belief.covariance * a.transpose() + &self.transition_noise_covariance;
        trace!(
            "predict: mean={:?} var={:?}",
            mean.as_slice(),
            covariance.diagonal().as_slice()
        );
        Belief { mean, covariance }
    }

    /// Predict, then correct the prediction with the observation `z`.
    ///
    /// On error the belief is left as it was.
    pub fn update(&mut self, z: &DVector<PrecisionType>) -> Result<(), FilterError> {
        let m = self.observation_matrix.nrows();
        FilterError::check_shape("observation", (m, 1), z.shape())?;
        trace!(
            "update: mean={:?} z={:?}",
            self.belief.mean.as_slice(),
            z.as_slice()
        );

        let prior = self.predict();
        let c = &self.observation_matrix;
        let c_t = c.transpose();

        let innovation_covariance = c * &prior.covariance * &c_t + &self.observation_noise_covariance;
        let innovation_covariance_inv = innovation_covariance
            .try_inverse()
            .filter(|inv| inv.iter().all(|v| v.is_finite()))
            .ok_or(FilterError::SingularInnovationCovariance)?;

        let gain = &prior.covariance * &c_t * innovation_covariance_inv;
        let innovation = z - c * &prior.mean;
        let mean = &prior.mean + &gain * innovation;

        let kc = &gain * c;
        let identity = DMatrix::<PrecisionType>::identity(kc.nrows(), kc.ncols());
        let covariance = (identity - kc) * &prior.covariance;
        // Keep sigma symmetric against rounding.
        let covariance = (&covariance + covariance.transpose()) * 0.5;

        let posterior = Belief { mean, covariance };
        if !posterior.is_finite() {
            return Err(FilterError::SingularInnovationCovariance);
        }
        trace!(
            "update: posterior mean={:?} var={:?}",
            posterior.mean.as_slice(),
            posterior.variances().as_slice()
        );
        self.belief = posterior;
        Ok(())
    }
}
