//! Random challenge-response authentication.
//!
//! ```text
//! ┌──────┐ Nonce ┌───────────┐ mirror ┌───────────────┐ MAC/HMAC ┌─────────────────┐
//! │ Init │──────>│ NonceSent │───────>│ NonceMirrored │─────────>│ ChallengeIssued │
//! └──────┘       └───────────┘        └───────────────┘          └─────────────────┘
//!                                                                         │ digest
//!                          ┌──────────┐  match  ┌──────────────────┐      │
//!                          │ Verified │<────────│ ResponseReceived │<─────┘
//!                          └──────────┘         └──────────────────┘
//! ```
//!
//! The device's random output makes every challenge fresh, so a recorded
//! digest cannot be replayed.

use atsha_crypto::{HmacRequest, MacRequest, hmac, mac, nonce};
use atsha_proto::{KEY_SIZE, MacMode, NUM_IN_SIZE, NonceMode};

use super::{RunState, Session, check_slot};
use crate::{
    config::SessionConfig, device::Device, error::Result, transport::CommandExecutor,
};

/// Digest command the device is asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// MAC over slot key and TempKey
    Mac,
    /// HMAC keyed by the slot key over TempKey
    Hmac,
}

/// States of an [`Authentication`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Not started
    Init,
    /// Device nonce requested
    NonceSent,
    /// Host TempKey mirrors the device
    NonceMirrored,
    /// Digest command sent to the device
    ChallengeIssued,
    /// Device digest in hand
    ResponseReceived,
    /// Device digest matched the host's
    Verified,
    /// Aborted or mismatched
    Failed,
}

impl RunState for AuthState {
    const INITIAL: Self = Self::Init;
    const FAILED: Self = Self::Failed;
}

/// Verifies that the device holds the secret in slot `key_id`.
pub struct Authentication<'a> {
    session: Session<AuthState>,
    method: AuthMethod,
    key_id: u16,
    secret: &'a [u8; KEY_SIZE],
    num_in: [u8; NUM_IN_SIZE],
}

impl<'a> Authentication<'a> {
    /// Prepare a run against slot `key_id`, expected to hold `secret`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidParameter` if `key_id` is not a slot
    /// - `Error::InvalidParameter` if `config.validate()` fails
    pub fn new(
        method: AuthMethod,
        key_id: u16,
        secret: &'a [u8; KEY_SIZE],
        config: &SessionConfig,
    ) -> Result<Self> {
        check_slot(key_id, "authentication key id is not a slot")?;
        config.validate()?;
        let run = match method {
            AuthMethod::Mac => "authenticate",
            AuthMethod::Hmac => "authenticate_hmac",
        };
        Ok(Self { session: Session::new(run), method, key_id, secret, num_in: config.auth_num_in })
    }

    /// Current state.
    pub fn state(&self) -> AuthState {
        self.session.state()
    }

    /// State the run was in when it failed.
    pub fn aborted_in(&self) -> Option<AuthState> {
        self.session.aborted_in()
    }

    /// Execute the run.
    ///
    /// # Errors
    ///
    /// - `Error::VerificationFailed` if the device digest differs from the
    ///   host's
    /// - `Error::Transport` if a device round trip fails
    /// - `Error::StateInvalid` if the run was already used
    pub fn run<E: CommandExecutor>(&mut self, device: &mut Device<E>) -> Result<()> {
        let (method, key_id, secret, num_in) = (self.method, self.key_id, self.secret, self.num_in);

        self.session.drive(AuthState::Verified, |session| {
            session.advance(AuthState::NonceSent);
            let rand_out = device.nonce(NonceMode::NoSeedUpdate, &num_in)?;

            nonce(&mut session.temp_key, NonceMode::NoSeedUpdate, &num_in, Some(&rand_out))?;
            session.advance(AuthState::NonceMirrored);

            session.advance(AuthState::ChallengeIssued);
            let device_digest = match method {
                AuthMethod::Mac => device.mac(MacMode::BLOCK2_TEMPKEY, key_id, None)?,
                AuthMethod::Hmac => device.hmac(MacMode::empty(), key_id)?,
            };
            session.advance(AuthState::ResponseReceived);

            let host_digest = match method {
                AuthMethod::Mac => {
                    let request = MacRequest {
                        mode: MacMode::BLOCK2_TEMPKEY,
                        key_id,
                        key: Some(secret),
                        challenge: None,
                        otp: None,
                        sn: None,
                    };
                    mac(&request, Some(&mut session.temp_key))?
                },
                AuthMethod::Hmac => {
                    let request =
                        HmacRequest { mode: MacMode::empty(), key_id, key: secret, otp: None, sn: None };
                    hmac(&request, &mut session.temp_key)?
                },
            };
            session.verify(&device_digest, &host_digest)
        })
    }
}

#[cfg(test)]
mod tests {
    use atsha_proto::Opcode;

    use super::*;
    use crate::{
        error::{Error, TransportError},
        transport::testing::ScriptedExecutor,
    };

    const SECRET: [u8; 32] = [0x55; 32];

    fn expected_mac(rand_out: &[u8; 32]) -> [u8; 32] {
        let mut temp_key = atsha_crypto::TempKey::new();
        let num_in = SessionConfig::default().auth_num_in;
        nonce(&mut temp_key, NonceMode::NoSeedUpdate, &num_in, Some(rand_out)).unwrap();
        let request = MacRequest {
            mode: MacMode::BLOCK2_TEMPKEY,
            key_id: 5,
            key: Some(&SECRET),
            challenge: None,
            otp: None,
            sn: None,
        };
        mac(&request, Some(&mut temp_key)).unwrap()
    }

    #[test]
    fn matching_digest_verifies() {
        let script = ScriptedExecutor::default().respond(&[0xAA; 32]).respond(&expected_mac(&[0xAA; 32]));
        let mut device = Device::new(script);
        let mut auth =
            Authentication::new(AuthMethod::Mac, 5, &SECRET, &SessionConfig::default()).unwrap();

        auth.run(&mut device).unwrap();

        assert_eq!(auth.state(), AuthState::Verified);
        let opcodes: Vec<Opcode> = device.executor().sent.iter().map(|c| c.opcode()).collect();
        assert_eq!(opcodes, [Opcode::Nonce, Opcode::Mac]);
        assert_eq!(device.executor().sent[1].param1(), 0x01);
    }

    #[test]
    fn wrong_digest_fails_verification() {
        let mut digest = expected_mac(&[0xAA; 32]);
        digest[0] ^= 0x80;
        let script = ScriptedExecutor::default().respond(&[0xAA; 32]).respond(&digest);
        let mut device = Device::new(script);
        let mut auth =
            Authentication::new(AuthMethod::Mac, 5, &SECRET, &SessionConfig::default()).unwrap();

        assert_eq!(auth.run(&mut device), Err(Error::VerificationFailed { run: "authenticate" }));
        assert_eq!(auth.state(), AuthState::Failed);
        assert_eq!(auth.aborted_in(), Some(AuthState::ResponseReceived));
    }

    #[test]
    fn transport_failure_aborts_in_current_state() {
        let script = ScriptedExecutor::default()
            .respond(&[0xAA; 32])
            .fail(TransportError::link("bus stuck"));
        let mut device = Device::new(script);
        let mut auth =
            Authentication::new(AuthMethod::Hmac, 5, &SECRET, &SessionConfig::default()).unwrap();

        let err = auth.run(&mut device).unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(auth.aborted_in(), Some(AuthState::ChallengeIssued));
    }

    #[test]
    fn slot_out_of_range_is_rejected_up_front() {
        assert!(matches!(
            Authentication::new(AuthMethod::Mac, 16, &SECRET, &SessionConfig::default()),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn run_is_single_use() {
        let script = ScriptedExecutor::default().respond(&[0xAA; 32]).respond(&expected_mac(&[0xAA; 32]));
        let mut device = Device::new(script);
        let mut auth =
            Authentication::new(AuthMethod::Mac, 5, &SECRET, &SessionConfig::default()).unwrap();
        auth.run(&mut device).unwrap();

        assert!(matches!(auth.run(&mut device), Err(Error::StateInvalid(_))));
        assert_eq!(device.executor().sent.len(), 2);
    }

    #[test]
    fn shared_num_in_is_refused_when_distinct_required() {
        let config = SessionConfig { distinct_num_in: true, ..SessionConfig::default() };

        let result = Authentication::new(AuthMethod::Hmac, 5, &SECRET, &config);

        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }
}
