//! CheckMac: the host proves knowledge of a slot secret to the device.
//!
//! ```text
//! Init ─> NonceSent ─> NonceMirrored ─> ResponseComputed ─> ProofSent ─> Accepted
//! ```
//!
//! The client response is computed over the device's fresh TempKey, so the
//! device accepts it once. A miscompare is reported by the device as status
//! 0x01 and surfaces as [`Error::VerificationFailed`].

use atsha_crypto::{CheckMacRequest, check_mac_response, nonce};
use atsha_proto::{CheckMacMode, KEY_SIZE, NUM_IN_SIZE, NonceMode, OTHER_DATA_SIZE, Opcode};

use super::{RunState, Session, check_slot};
use crate::{
    config::SessionConfig,
    device::Device,
    error::{Error, Result, TransportError},
    transport::CommandExecutor,
};

/// Device status for a CheckMac miscompare.
const MISCOMPARE: u8 = 0x01;

/// States of a [`CheckMacProof`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMacState {
    /// Not started
    Init,
    /// Device nonce requested
    NonceSent,
    /// Host TempKey mirrors the device
    NonceMirrored,
    /// Client response computed
    ResponseComputed,
    /// CheckMac sent to the device
    ProofSent,
    /// Device accepted the response
    Accepted,
    /// Aborted or rejected
    Failed,
}

impl RunState for CheckMacState {
    const INITIAL: Self = Self::Init;
    const FAILED: Self = Self::Failed;
}

/// Proves to the device that the host knows the secret in slot `key_id`.
pub struct CheckMacProof<'a> {
    session: Session<CheckMacState>,
    key_id: u16,
    secret: &'a [u8; KEY_SIZE],
    other_data: [u8; OTHER_DATA_SIZE],
    num_in: [u8; NUM_IN_SIZE],
}

impl<'a> CheckMacProof<'a> {
    /// Prepare a proof for slot `key_id` holding `secret`.
    ///
    /// OtherData defaults to the header of the equivalent MAC command
    /// (`0x08 ‖ 0x01 ‖ key_id(LE)`, zero padded), so the response equals
    /// the digest a MAC command over the same TempKey would return.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidParameter` if `key_id` is not a slot
    /// - `Error::InvalidParameter` if `config.validate()` fails
    pub fn new(key_id: u16, secret: &'a [u8; KEY_SIZE], config: &SessionConfig) -> Result<Self> {
        check_slot(key_id, "check mac key id is not a slot")?;
        config.validate()?;
        let [lo, hi] = key_id.to_le_bytes();
        let mut other_data = [0u8; OTHER_DATA_SIZE];
        other_data[..4].copy_from_slice(&[Opcode::Mac.to_u8(), 0x01, lo, hi]);
        Ok(Self {
            session: Session::new("check_mac"),
            key_id,
            secret,
            other_data,
            num_in: config.check_mac_num_in,
        })
    }

    /// Replace the OtherData field.
    #[must_use]
    pub fn with_other_data(mut self, other_data: [u8; OTHER_DATA_SIZE]) -> Self {
        self.other_data = other_data;
        self
    }

    /// Current state.
    pub fn state(&self) -> CheckMacState {
        self.session.state()
    }

    /// State the run was in when it failed.
    pub fn aborted_in(&self) -> Option<CheckMacState> {
        self.session.aborted_in()
    }

    /// Execute the run.
    ///
    /// # Errors
    ///
    /// - `Error::VerificationFailed` if the device rejects the response
    /// - `Error::Transport` if a device round trip fails
    /// - `Error::StateInvalid` if the run was already used
    pub fn run<E: CommandExecutor>(&mut self, device: &mut Device<E>) -> Result<()> {
        let (key_id, secret, other_data, num_in) =
            (self.key_id, self.secret, self.other_data, self.num_in);
        let mode = CheckMacMode::BLOCK2_TEMPKEY;
        // Block 2 comes from TempKey; the device still expects a challenge field.
        let client_challenge = [0u8; KEY_SIZE];

        self.session.drive(CheckMacState::Accepted, |session| {
            session.advance(CheckMacState::NonceSent);
            let rand_out = device.nonce(NonceMode::NoSeedUpdate, &num_in)?;
            nonce(&mut session.temp_key, NonceMode::NoSeedUpdate, &num_in, Some(&rand_out))?;
            session.advance(CheckMacState::NonceMirrored);

            let request = CheckMacRequest {
                mode,
                key: secret,
                client_challenge: None,
                other_data: &other_data,
                otp: None,
            };
            let response = check_mac_response(&request, Some(&mut session.temp_key))?;
            session.advance(CheckMacState::ResponseComputed);

            session.advance(CheckMacState::ProofSent);
            match device.check_mac(mode, key_id, &client_challenge, &response, &other_data) {
                Ok(()) => {
                    tracing::info!(run = "check_mac", "verification succeeded");
                    Ok(())
                },
                Err(TransportError::Device { status: MISCOMPARE }) => {
                    Err(Error::VerificationFailed { run: "check_mac" })
                },
                Err(err) => Err(err.into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use atsha_crypto::{MacRequest, TempKey, mac};
    use atsha_proto::MacMode;

    use super::*;
    use crate::transport::testing::ScriptedExecutor;

    const SECRET: [u8; 32] = [0x55; 32];

    #[test]
    fn accepted_response_completes() {
        let script = ScriptedExecutor::default().respond(&[0x42; 32]).respond(&[0x00]);
        let mut device = Device::new(script);
        let mut proof = CheckMacProof::new(5, &SECRET, &SessionConfig::default()).unwrap();

        proof.run(&mut device).unwrap();

        assert_eq!(proof.state(), CheckMacState::Accepted);
        let sent = &device.executor().sent[1];
        assert_eq!(sent.opcode(), Opcode::CheckMac);
        assert_eq!(sent.param1(), 0x01);
        assert_eq!(sent.param2(), 5);
        assert_eq!(sent.data_len(), 32 + 32 + 13);
    }

    #[test]
    fn default_response_equals_mac_digest() {
        let script = ScriptedExecutor::default().respond(&[0x42; 32]).respond(&[0x00]);
        let mut device = Device::new(script);
        let config = SessionConfig::default();
        CheckMacProof::new(5, &SECRET, &config).unwrap().run(&mut device).unwrap();

        let mut temp_key = TempKey::new();
        nonce(&mut temp_key, NonceMode::NoSeedUpdate, &config.check_mac_num_in, Some(&[0x42; 32]))
            .unwrap();
        let request = MacRequest {
            mode: MacMode::BLOCK2_TEMPKEY,
            key_id: 5,
            key: Some(&SECRET),
            challenge: None,
            otp: None,
            sn: None,
        };
        let digest = mac(&request, Some(&mut temp_key)).unwrap();

        let segments: Vec<&[u8]> = device.executor().sent[1].data().collect();
        assert_eq!(segments[1], digest.as_slice());
    }

    #[test]
    fn miscompare_is_verification_failure() {
        let script = ScriptedExecutor::default().respond(&[0x42; 32]).respond(&[0x01]);
        let mut device = Device::new(script);
        let mut proof = CheckMacProof::new(5, &SECRET, &SessionConfig::default()).unwrap();

        assert_eq!(proof.run(&mut device), Err(Error::VerificationFailed { run: "check_mac" }));
        assert_eq!(proof.aborted_in(), Some(CheckMacState::ProofSent));
    }

    #[test]
    fn other_device_errors_stay_transport_errors() {
        let script = ScriptedExecutor::default().respond(&[0x42; 32]).respond(&[0x0F]);
        let mut device = Device::new(script);
        let mut proof = CheckMacProof::new(5, &SECRET, &SessionConfig::default()).unwrap();

        assert_eq!(
            proof.run(&mut device),
            Err(Error::Transport(TransportError::Device { status: 0x0F }))
        );
    }

    #[test]
    fn shared_num_in_is_refused_when_distinct_required() {
        let config = SessionConfig { distinct_num_in: true, ..SessionConfig::default() };

        assert!(matches!(
            CheckMacProof::new(5, &SECRET, &config),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
