/// Error returned by parameter validation, trajectory and magnification evaluation
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MulensError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },

    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(&'static str),

    #[error("invalid input {name}: {reason}")]
    InvalidInput { name: &'static str, reason: String },

    #[error("unknown magnification method {0:?}")]
    UnknownMethod(String),

    #[error("numerical solver did not converge: {0}")]
    NumericNonConvergence(&'static str),
}

impl MulensError {
    pub(crate) fn invalid_parameter(name: &'static str, reason: &'static str) -> Self {
        Self::InvalidParameter { name, reason }
    }

    pub(crate) fn invalid_input(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            name,
            reason: reason.into(),
        }
    }

    /// Auxiliary per-time array doesn't match the time array
    pub(crate) fn length_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::invalid_input(
            name,
            format!("length {actual} doesn't match the number of time samples {expected}"),
        )
    }

    /// Is this error a deterministic configuration defect rather than a numerical failure?
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::NumericNonConvergence(_))
    }
}
