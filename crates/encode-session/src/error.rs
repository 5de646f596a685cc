//! Encode session error types

use std::time::Duration;

use thiserror::Error;

use crate::SessionHandle;

/// Broad failure category, independent of the exact cause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Null surface, dead handle, or an unusable configuration
    InvalidArgument,
    /// The caller's configuration no longer matches the session
    ConfigurationDrift,
    /// An encode was requested while another one was still in flight
    ConcurrentEncodeRejected,
    /// The native encoder call failed or stalled
    NativeFailure,
    /// A session could not be created
    ResourceExhausted,
}

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("The given surface reference is null")]
    NullSurface,

    #[error("Encoder session {0} is not valid")]
    InvalidHandle(SessionHandle),

    #[error("Encoder not initialized")]
    NotInitialized,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "Encode setting has changed ({field}: {recorded} -> {live}). Please reinitialize the encoder"
    )]
    ConfigurationDrift {
        field: &'static str,
        recorded: String,
        live: String,
    },

    #[error("The previous encode has not finished yet")]
    EncodeInProgress,

    #[error("{api} call failed: {message}")]
    Native { api: &'static str, message: String },

    #[error("Encode did not complete within {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Encoder session creation failed: {0}")]
    ResourceExhausted(String),

    #[error("An exclusive encoder session is already active")]
    AlreadyActive,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EncoderError {
    /// Shorthand for a failed native call
    pub fn native(api: &'static str, message: impl Into<String>) -> Self {
        Self::Native {
            api,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EncoderError::NullSurface
            | EncoderError::InvalidHandle(_)
            | EncoderError::NotInitialized
            | EncoderError::InvalidConfig(_) => ErrorKind::InvalidArgument,
            EncoderError::ConfigurationDrift { .. } => ErrorKind::ConfigurationDrift,
            EncoderError::EncodeInProgress => ErrorKind::ConcurrentEncodeRejected,
            EncoderError::Native { .. } | EncoderError::Timeout(_) | EncoderError::Internal(_) => {
                ErrorKind::NativeFailure
            }
            EncoderError::ResourceExhausted(_) | EncoderError::AlreadyActive => {
                ErrorKind::ResourceExhausted
            }
        }
    }
}

pub type EncoderResult<T> = Result<T, EncoderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_message_format() {
        let err = EncoderError::native("nvEncEncodePicture", "NV_ENC_ERR_ENCODER_BUSY");
        assert_eq!(
            err.to_string(),
            "nvEncEncodePicture call failed: NV_ENC_ERR_ENCODER_BUSY"
        );
        assert_eq!(err.kind(), ErrorKind::NativeFailure);
    }

    #[test]
    fn test_drift_mentions_reinitialize() {
        let err = EncoderError::ConfigurationDrift {
            field: "width",
            recorded: "1920".into(),
            live: "1280".into(),
        };
        let message = err.to_string();
        assert!(message.contains("width: 1920 -> 1280"));
        assert!(message.contains("reinitialize"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(EncoderError::NullSurface.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            EncoderError::EncodeInProgress.kind(),
            ErrorKind::ConcurrentEncodeRejected
        );
        assert_eq!(
            EncoderError::Timeout(Duration::from_millis(5)).kind(),
            ErrorKind::NativeFailure
        );
        assert_eq!(EncoderError::AlreadyActive.kind(), ErrorKind::ResourceExhausted);
    }
}
