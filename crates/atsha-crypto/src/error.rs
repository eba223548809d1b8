//! Error types for the session primitives.

use thiserror::Error;

use crate::temp_key::TempKeySource;

/// Errors returned by session primitives.
///
/// Both kinds indicate a caller bug. Neither mutates TempKey except that a
/// consuming primitive clears `valid` after a failed state check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Input missing, mis-sized or out of range
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// What was wrong
        reason: &'static str,
    },

    /// TempKey precondition failed
    #[error("tempkey state invalid: {0}")]
    StateInvalid(#[from] StateViolation),
}

impl SessionError {
    pub(crate) fn invalid(reason: &'static str) -> Self {
        Self::InvalidParameter { reason }
    }
}

/// The TempKey precondition a primitive found violated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateViolation {
    /// Check flag is set
    #[error("check flag is set")]
    CheckFlagSet,

    /// No usable value loaded, or already consumed
    #[error("tempkey is not valid")]
    NotValid,

    /// Mode's source-flag bit disagrees with how TempKey was loaded
    #[error("mode expects a {expected:?} tempkey, found {actual:?}")]
    SourceMismatch {
        /// Source the mode bit declares
        expected: TempKeySource,
        /// Source recorded in TempKey
        actual: TempKeySource,
    },

    /// Last producer was not GenDig over the data zone
    #[error("tempkey was not generated from the data zone")]
    NotFromDataZone,

    /// TempKey was loaded by pass-through rather than a random nonce
    #[error("tempkey source is not random")]
    SourceNotRandom,

    /// A protocol run was already driven once and cannot be reused
    #[error("run was already used")]
    RunAlreadyUsed,
}
