//! Material system error types.

use std::fmt;

/// Errors that can occur in the material parameter system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialError {
    /// A parameter store was constructed against a layout that was never
    /// finalized.
    LayoutNotFinalized(String),
    /// A parameter store was constructed against a layout with no
    /// descriptors.
    EmptyLayout(String),
    /// A parameter store or material system was given an empty device set.
    NoDevices,
    /// An invalid parameter was provided.
    InvalidParameter(String),
}

impl fmt::Display for MaterialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LayoutNotFinalized(name) => {
                write!(f, "parameter layout '{name}' is not finalized")
            }
            Self::EmptyLayout(name) => {
                write!(f, "parameter layout '{name}' has no descriptors")
            }
            Self::NoDevices => write!(f, "device set is empty"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
        }
    }
}

impl std::error::Error for MaterialError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MaterialError::NoDevices;
        assert_eq!(err.to_string(), "device set is empty");

        let err = MaterialError::LayoutNotFinalized("standard_pbr".to_string());
        assert_eq!(
            err.to_string(),
            "parameter layout 'standard_pbr' is not finalized"
        );
    }
}
