//! Error types for SunSpec register access.

use std::io;
use thiserror::Error;

/// Result type alias for SunSpec operations.
pub type Result<T> = std::result::Result<T, SunSpecError>;

/// Errors that can occur while reading or decoding device registers.
#[derive(Debug, Error)]
pub enum SunSpecError {
    /// Invalid parameter provided.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// A response frame failed validation.
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// Description of the response error.
        reason: String,
    },

    /// Communication timeout.
    #[error("Communication timeout")]
    Timeout,

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A layout names a type tag this decoder does not know.
    #[error("Unknown field type '{tag}'")]
    UnknownFieldType {
        /// The offending type tag.
        tag: String,
    },

    /// A layout entry is malformed.
    #[error("Invalid layout entry '{field}': {reason}")]
    InvalidLayout {
        /// Name of the field.
        field: String,
        /// Description of the problem.
        reason: String,
    },

    /// A layout entry extends past the end of the register buffer.
    #[error("Field '{field}' needs bytes up to {needed}, buffer holds {available}")]
    LayoutOverrun {
        /// Name of the field.
        field: String,
        /// End offset (exclusive) in bytes required by the field.
        needed: usize,
        /// Size of the register buffer in bytes.
        available: usize,
    },

    /// None of the candidate base addresses carries the SunSpec marker.
    #[error("Device {unit_id} has no SunSpec register map")]
    NoSunSpecMap {
        /// Modbus unit id of the device.
        unit_id: u8,
    },
}

impl SunSpecError {
    /// Creates a new `InvalidParameter` error.
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::SunSpecError;
    ///
    /// let err = SunSpecError::invalid_parameter("count", "must be greater than 0");
    /// ```
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidResponse` error.
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::SunSpecError;
    ///
    /// let err = SunSpecError::invalid_response("response too short");
    /// ```
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidLayout` error.
    pub fn invalid_layout(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLayout {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `UnknownFieldType` error.
    pub fn unknown_field_type(tag: impl Into<String>) -> Self {
        Self::UnknownFieldType { tag: tag.into() }
    }

    /// Returns whether this error came from the wire (transport or frame
    /// validation) rather than from a layout or parameter mistake.
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::SunSpecError;
    ///
    /// assert!(SunSpecError::Timeout.is_read_failure());
    /// assert!(!SunSpecError::unknown_field_type("uint128").is_read_failure());
    /// ```
    pub fn is_read_failure(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Io(_) | Self::InvalidResponse { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_display() {
        let err = SunSpecError::invalid_parameter("count", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'count': must be greater than 0"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = SunSpecError::Timeout;
        assert_eq!(err.to_string(), "Communication timeout");
    }

    #[test]
    fn test_layout_overrun_display() {
        let err = SunSpecError::LayoutOverrun {
            field: "W".to_string(),
            needed: 10,
            available: 8,
        };
        assert_eq!(
            err.to_string(),
            "Field 'W' needs bytes up to 10, buffer holds 8"
        );
    }

    #[test]
    fn test_no_sunspec_map_display() {
        let err = SunSpecError::NoSunSpecMap { unit_id: 3 };
        assert_eq!(err.to_string(), "Device 3 has no SunSpec register map");
    }

    #[test]
    fn test_read_failure_classification() {
        assert!(SunSpecError::invalid_response("short").is_read_failure());
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(SunSpecError::Io(reset).is_read_failure());
        assert!(!SunSpecError::invalid_parameter("count", "zero").is_read_failure());
        assert!(!SunSpecError::NoSunSpecMap { unit_id: 1 }.is_read_failure());
    }
}
