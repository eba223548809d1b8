//! Error types for device access and protocol runs.
//!
//! Two layers: [`TransportError`] for anything that went wrong between the
//! host and the device, and [`Error`], the taxonomy every protocol run
//! reports. Callers decide what to do from the kind alone:
//!
//! - `InvalidParameter` / `StateInvalid`: a caller bug, fail fast
//! - `Transport`: the environment, retry with a fresh run
//! - `VerificationFailed`: a legitimate negative answer

use atsha_crypto::{SessionError, StateViolation};
use atsha_proto::ProtocolError;
use thiserror::Error;

/// A device round trip did not complete with a usable response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Link-level I/O failure
    #[error("link failure: {reason}")]
    Link {
        /// Description from the link
        reason: String,
    },

    /// Packet could not be built or the response failed framing checks
    #[error("packet error: {0}")]
    Packet(#[from] ProtocolError),

    /// Device answered with a non-success status byte
    #[error("device status {status:#04x}")]
    Device {
        /// Raw status byte
        status: u8,
    },

    /// Response payload has the wrong size for the command
    #[error("unexpected response length: expected {expected} bytes, got {actual}")]
    UnexpectedLength {
        /// Payload bytes the command returns
        expected: usize,
        /// Payload bytes received
        actual: usize,
    },
}

impl TransportError {
    /// Shorthand for a link failure.
    pub fn link(reason: impl Into<String>) -> Self {
        Self::Link { reason: reason.into() }
    }
}

/// Outcome kinds of device operations and protocol runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed or missing input, detected before any device traffic
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// What was wrong
        reason: &'static str,
    },

    /// Host TempKey precondition failed, or the run was already used
    #[error("session state invalid: {0}")]
    StateInvalid(StateViolation),

    /// Device round trip failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Device and host disagree on a digest
    #[error("verification failed in {run}")]
    VerificationFailed {
        /// Run that performed the comparison
        run: &'static str,
    },
}

impl Error {
    /// Returns true if a fresh run may succeed.
    ///
    /// Only transport failures qualify. A retry must start from a new run
    /// since device-side TempKey state cannot be resumed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if the error indicates a sequencing or input bug in the
    /// caller.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. } | Self::StateInvalid(_))
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidParameter { reason } => Self::InvalidParameter { reason },
            SessionError::StateInvalid(violation) => Self::StateInvalid(violation),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Self::Transport(TransportError::Packet(err))
    }
}

/// Result alias for device operations and protocol runs.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(Error::Transport(TransportError::Device { status: 0x0F }).is_retryable());
        assert!(!Error::VerificationFailed { run: "authenticate" }.is_retryable());
        assert!(!Error::StateInvalid(StateViolation::NotValid).is_retryable());
        assert!(!Error::InvalidParameter { reason: "slot" }.is_retryable());
    }

    #[test]
    fn verification_failure_is_not_a_programming_error() {
        assert!(!Error::VerificationFailed { run: "authenticate" }.is_programming_error());
        assert!(Error::StateInvalid(StateViolation::NotFromDataZone).is_programming_error());
    }

    #[test]
    fn session_errors_keep_their_kind() {
        let err: Error = SessionError::StateInvalid(StateViolation::CheckFlagSet).into();
        assert_eq!(err, Error::StateInvalid(StateViolation::CheckFlagSet));

        let err: Error = SessionError::InvalidParameter { reason: "num_in" }.into();
        assert_eq!(err, Error::InvalidParameter { reason: "num_in" });
    }

    #[test]
    fn packet_errors_are_transport_errors() {
        let err: Error = ProtocolError::CrcMismatch { received: 1, computed: 2 }.into();
        assert!(err.is_retryable());
    }
}
