//! Unified error handling for overlay components.
//!
//! Analytics functions ([`crate::segment_stops`], [`crate::excluded_distance`])
//! degrade to empty/zero output instead of failing; errors here cover the
//! rendering seam, where a map surface can refuse a resource operation.

use thiserror::Error;

/// Unified error type for overlay operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    /// A data source with this key is already registered on the surface.
    #[error("source '{0}' is already registered")]
    DuplicateSource(String),

    /// A rendering layer with this key is already registered on the surface.
    #[error("layer '{0}' is already registered")]
    DuplicateLayer(String),

    /// The named data source does not exist on the surface.
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    /// The named rendering layer does not exist on the surface.
    #[error("unknown layer '{0}'")]
    UnknownLayer(String),

    /// The map engine rejected an operation for an engine-specific reason.
    #[error("map surface error: {0}")]
    Surface(String),
}

/// Result type alias for overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OverlayError::DuplicateSource("markers-src-3".to_string());
        assert_eq!(err.to_string(), "source 'markers-src-3' is already registered");

        let err = OverlayError::UnknownLayer("measure-line-7".to_string());
        assert!(err.to_string().contains("measure-line-7"));
    }
}
