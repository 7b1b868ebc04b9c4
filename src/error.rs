use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("innovation covariance is not invertible")]
    SingularInnovationCovariance,
    #[error("{what} has shape {actual:?}, expected {expected:?}")]
    InvalidDimension {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("elapsed time is negative: {0}s")]
    NegativeElapsedTime(f64),
    #[error("timestamp is not finite: {0}")]
    NonFiniteTimestamp(f64),
    #[error("predicted belief is not finite")]
    NonFiniteBelief,
}

impl FilterError {
    pub(crate) fn check_shape(
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Result<(), FilterError> {
        if expected == actual {
            Ok(())
        } else {
            Err(FilterError::InvalidDimension {
                what,
                expected,
                actual,
            })
        }
    }
}
