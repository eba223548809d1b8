//! Protocol runs.
//!
//! Each run interleaves device commands with the host primitive that
//! mirrors them, in a fixed order, and stops at the first failure:
//!
//! ```text
//!   host                                   device
//!    │ ── Nonce(num_in) ─────────────────────> │  TempKey = H(rand ‖ num_in ‖ …)
//!    │ <───────────────────────── rand_out ─── │
//!    │  nonce(temp_key, num_in, rand_out)      │
//!    │ ── GenDig / MAC / HMAC / … ───────────> │
//!    │  gen_dig / mac / hmac / … (mirror)      │
//!    │ <──────────────────── digest / data ─── │
//!    │  compare or decrypt                     │
//! ```
//!
//! # Run Lifecycle
//!
//! - Every run owns one host [`TempKey`]. It is never shared and is wiped
//!   when the run returns, whatever the outcome.
//! - Runs are single-use. A second call to `run` fails with
//!   [`Error::StateInvalid`] without talking to the device.
//! - A failed run reports the state it aborted in through `aborted_in`.
//!   Device-side effects already issued (a nonce, a write) are not rolled
//!   back.
//! - Nothing retries internally. After a transport error the caller may
//!   build a new run.

mod authenticate;
mod check_mac;
mod confidential;
mod key_roll;

use std::fmt;

pub use authenticate::{AuthMethod, AuthState, Authentication};
use atsha_crypto::{StateViolation, TempKey};
pub use check_mac::{CheckMacProof, CheckMacState};
pub use confidential::{ConfidentialRead, ConfidentialWrite, ReadState, WriteState};
pub use key_roll::{KeyRoll, KeyRollState};
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

/// States common to every run's state enum.
pub(crate) trait RunState: Copy + fmt::Debug + PartialEq {
    /// Before `run` was called
    const INITIAL: Self;
    /// After any failure
    const FAILED: Self;
}

/// Bookkeeping shared by every run: current state, abort point, TempKey.
#[derive(Debug)]
pub(crate) struct Session<S> {
    run: &'static str,
    state: S,
    aborted_in: Option<S>,
    pub(crate) temp_key: TempKey,
}

impl<S: RunState> Session<S> {
    pub(crate) fn new(run: &'static str) -> Self {
        Self { run, state: S::INITIAL, aborted_in: None, temp_key: TempKey::new() }
    }

    pub(crate) fn state(&self) -> S {
        self.state
    }

    pub(crate) fn aborted_in(&self) -> Option<S> {
        self.aborted_in
    }

    pub(crate) fn advance(&mut self, next: S) {
        tracing::debug!(run = self.run, from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    /// Execute `steps` once, then record the outcome and wipe TempKey.
    ///
    /// `done` is the terminal success state.
    pub(crate) fn drive<T>(
        &mut self,
        done: S,
        steps: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.state != S::INITIAL {
            tracing::warn!(run = self.run, state = ?self.state, "run already used");
            return Err(Error::StateInvalid(StateViolation::RunAlreadyUsed));
        }

        let result = steps(self);
        self.temp_key.invalidate();

        match &result {
            Ok(_) => self.advance(done),
            Err(Error::VerificationFailed { .. }) => {
                tracing::info!(run = self.run, "verification failed");
                self.fail();
            },
            Err(err) => {
                tracing::warn!(run = self.run, state = ?self.state, error = %err, "run aborted");
                self.fail();
            },
        }
        result
    }

    fn fail(&mut self) {
        self.aborted_in = Some(self.state);
        self.state = S::FAILED;
    }

    /// Compare a device digest with the host's in constant time.
    pub(crate) fn verify(&self, device: &[u8; 32], host: &[u8; 32]) -> Result<()> {
        if bool::from(device.as_slice().ct_eq(host.as_slice())) {
            tracing::info!(run = self.run, "verification succeeded");
            Ok(())
        } else {
            Err(Error::VerificationFailed { run: self.run })
        }
    }
}

/// Reject slot ids the device cannot address.
pub(crate) fn check_slot(slot: u16, what: &'static str) -> Result<()> {
    if slot > atsha_proto::KEY_ID_MAX {
        return Err(Error::InvalidParameter { reason: what });
    }
    Ok(())
}
