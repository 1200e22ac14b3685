//! # Error Types
//!
//! Failure classes for the audio boundaries. Estimation and matching never
//! fail; only acquiring or emitting audio can, and those failures halt a
//! single session rather than the whole application.

use thiserror::Error;

/// Errors raised at the audio input/output boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TunerError {
    /// Microphone access was refused. A new explicit activation is
    /// required; sessions never retry on their own.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// No usable input device, or the capture stream failed.
    #[error("audio input unavailable: {0}")]
    DeviceUnavailable(String),

    /// No usable output device, or the playback stream failed.
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),
}

impl TunerError {
    /// Classifies a backend error message from the input side.
    ///
    /// cpal has no portable permission-denied error variant, so messages
    /// that look like an access refusal are mapped to [`PermissionDenied`]
    /// and everything else to [`DeviceUnavailable`].
    ///
    /// [`PermissionDenied`]: TunerError::PermissionDenied
    /// [`DeviceUnavailable`]: TunerError::DeviceUnavailable
    pub(crate) fn from_input_backend(context: &str, message: String) -> TunerError {
        let lower = message.to_ascii_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("access") {
            TunerError::PermissionDenied
        } else {
            TunerError::DeviceUnavailable(format!("{context}: {message}"))
        }
    }
}

#[cfg(test)]
mod test_error {
    use super::*;

    #[test]
    fn permission_messages_are_classified() {
        let err = TunerError::from_input_backend("building stream", "Access denied by user".to_string());
        assert_eq!(err, TunerError::PermissionDenied);
    }

    #[test]
    fn other_messages_map_to_device_unavailable() {
        let err = TunerError::from_input_backend("building stream", "device disconnected".to_string());
        assert_eq!(
            err,
            TunerError::DeviceUnavailable("building stream: device disconnected".to_string())
        );
    }
}
