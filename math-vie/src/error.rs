//! Error types for the volume-integral engine.
//!
//! Singular kernel entries and coincident source points are regularized or
//! skipped, never reported here. Krylov non-convergence is reported through
//! [`math_audio_solvers::SolverStatus`] rather than as an error.

use thiserror::Error;

/// Errors raised while building grids, kernels, operators and sources.
#[derive(Debug, Error)]
pub enum VieError {
    /// Grid geometry violates the uniform-pitch contract.
    #[error("invalid voxel geometry: {reason}")]
    Geometry {
        /// What was wrong with the geometry
        reason: String,
    },

    /// An array does not match the shape or length it must be combined with.
    #[error("{what} dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Which array was checked
        what: &'static str,
        /// Expected shape, formatted
        expected: String,
        /// Actual shape, formatted
        got: String,
    },

    /// A physical or numerical parameter is out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// A cancellable computation observed its token.
    #[error("computation cancelled")]
    Cancelled,

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration or output (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for volume-integral operations.
pub type Result<T> = std::result::Result<T, VieError>;

impl VieError {
    /// Shorthand for [`VieError::Geometry`]
    pub fn geometry(reason: impl Into<String>) -> Self {
        Self::Geometry {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`VieError::InvalidParameter`]
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Shorthand for [`VieError::DimensionMismatch`] from two shapes
    pub fn mismatch<E: std::fmt::Debug, G: std::fmt::Debug>(
        what: &'static str,
        expected: E,
        got: G,
    ) -> Self {
        Self::DimensionMismatch {
            what,
            expected: format!("{expected:?}"),
            got: format!("{got:?}"),
        }
    }

    /// Returns `true` for errors caused by invalid input.
    ///
    /// This includes `Geometry`, `DimensionMismatch` and `InvalidParameter`.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Geometry { .. } | Self::DimensionMismatch { .. } | Self::InvalidParameter { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = VieError::mismatch("field", (4, 4, 4), (4, 4, 5));
        assert_eq!(
            err.to_string(),
            "field dimension mismatch: expected (4, 4, 4), got (4, 4, 5)"
        );
        assert!(err.is_validation_error());

        let err = VieError::invalid("source_count", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid parameter `source_count`: must be positive"
        );
    }

    #[test]
    fn test_cancelled_is_not_validation() {
        assert!(!VieError::Cancelled.is_validation_error());
        assert!(VieError::geometry("zero pitch").is_validation_error());
    }
}
