//! Key roll: replace a slot key with a digest of itself and a fresh nonce.
//!
//! ```text
//! Init ─> NonceSent ─> NonceMirrored ─> KeyComputed ─> DeriveIssued ─> Rolled
//! ```
//!
//! The host computes the new key before the device overwrites the old one.
//! If the DeriveKey command fails the slot may or may not have changed; the
//! caller must re-establish which key is live.

use atsha_crypto::{derive_key, derive_key_mac, nonce};
use atsha_proto::{DeriveKeyMode, KEY_SIZE, NUM_IN_SIZE, NonceMode};
use zeroize::Zeroizing;

use super::{RunState, Session, check_slot};
use crate::{config::SessionConfig, device::Device, error::Result, transport::CommandExecutor};

/// States of a [`KeyRoll`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRollState {
    /// Not started
    Init,
    /// Device nonce requested
    NonceSent,
    /// Host TempKey mirrors the device
    NonceMirrored,
    /// New key computed on the host
    KeyComputed,
    /// DeriveKey sent to the device
    DeriveIssued,
    /// Device accepted the derivation
    Rolled,
    /// Aborted
    Failed,
}

impl RunState for KeyRollState {
    const INITIAL: Self = Self::Init;
    const FAILED: Self = Self::Failed;
}

/// Rolls the key in slot `target_key_id`.
pub struct KeyRoll<'a> {
    session: Session<KeyRollState>,
    target_key_id: u16,
    current_key: &'a [u8; KEY_SIZE],
    authorizing_key: Option<&'a [u8; KEY_SIZE]>,
    num_in: [u8; NUM_IN_SIZE],
}

impl<'a> KeyRoll<'a> {
    /// Prepare a roll of slot `target_key_id`, currently holding
    /// `current_key`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidParameter` if `target_key_id` is not a slot
    /// - `Error::InvalidParameter` if `config.validate()` fails
    pub fn new(
        target_key_id: u16,
        current_key: &'a [u8; KEY_SIZE],
        config: &SessionConfig,
    ) -> Result<Self> {
        check_slot(target_key_id, "roll target is not a slot")?;
        config.validate()?;
        Ok(Self {
            session: Session::new("key_roll"),
            target_key_id,
            current_key,
            authorizing_key: None,
            num_in: config.derive_num_in,
        })
    }

    /// Attach an input MAC keyed by the target slot's write key, for
    /// slots that demand one.
    #[must_use]
    pub fn with_input_mac(mut self, write_key: &'a [u8; KEY_SIZE]) -> Self {
        self.authorizing_key = Some(write_key);
        self
    }

    /// Current state.
    pub fn state(&self) -> KeyRollState {
        self.session.state()
    }

    /// State the run was in when it failed.
    pub fn aborted_in(&self) -> Option<KeyRollState> {
        self.session.aborted_in()
    }

    /// Execute the run and return the key now stored in the target slot.
    ///
    /// # Errors
    ///
    /// - `Error::Transport` if a device round trip fails
    /// - `Error::StateInvalid` if the run was already used
    pub fn run<E: CommandExecutor>(
        &mut self,
        device: &mut Device<E>,
    ) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        let (target, current_key, authorizing_key, num_in) =
            (self.target_key_id, self.current_key, self.authorizing_key, self.num_in);
        let mode = DeriveKeyMode::empty();

        self.session.drive(KeyRollState::Rolled, |session| {
            session.advance(KeyRollState::NonceSent);
            let rand_out = device.nonce(NonceMode::NoSeedUpdate, &num_in)?;
            nonce(&mut session.temp_key, NonceMode::NoSeedUpdate, &num_in, Some(&rand_out))?;
            session.advance(KeyRollState::NonceMirrored);

            let new_key =
                Zeroizing::new(derive_key(&mut session.temp_key, mode, target, current_key)?);
            let input_mac =
                authorizing_key.map(|key| derive_key_mac(mode, target, key)).transpose()?;
            session.advance(KeyRollState::KeyComputed);

            session.advance(KeyRollState::DeriveIssued);
            device.derive_key(mode, target, input_mac.as_ref())?;
            Ok(new_key)
        })
    }
}

#[cfg(test)]
mod tests {
    use atsha_crypto::TempKey;
    use atsha_proto::Opcode;

    use super::*;
    use crate::error::{Error, TransportError};
    use crate::transport::testing::ScriptedExecutor;

    const KEY: [u8; 32] = [0x77; 32];

    #[test]
    fn roll_returns_derived_key() {
        let config = SessionConfig::default();
        let script = ScriptedExecutor::default().respond(&[0x09; 32]).respond(&[0x00]);
        let mut device = Device::new(script);
        let mut roll = KeyRoll::new(7, &KEY, &config).unwrap();

        let new_key = roll.run(&mut device).unwrap();

        let mut temp_key = TempKey::new();
        nonce(&mut temp_key, NonceMode::NoSeedUpdate, &config.derive_num_in, Some(&[0x09; 32]))
            .unwrap();
        let expected = derive_key(&mut temp_key, DeriveKeyMode::empty(), 7, &KEY).unwrap();
        assert_eq!(*new_key, expected);
        assert_eq!(roll.state(), KeyRollState::Rolled);

        let sent = &device.executor().sent[1];
        assert_eq!(sent.opcode(), Opcode::DeriveKey);
        assert_eq!(sent.param1(), 0x00);
        assert_eq!(sent.param2(), 7);
        assert_eq!(sent.data_len(), 0);
    }

    #[test]
    fn input_mac_is_attached_when_requested() {
        let write_key = [0x12; 32];
        let script = ScriptedExecutor::default().respond(&[0x09; 32]).respond(&[0x00]);
        let mut device = Device::new(script);
        let mut roll =
            KeyRoll::new(7, &KEY, &SessionConfig::default()).unwrap().with_input_mac(&write_key);

        roll.run(&mut device).unwrap();

        let expected = derive_key_mac(DeriveKeyMode::empty(), 7, &write_key).unwrap();
        let segments: Vec<&[u8]> = device.executor().sent[1].data().collect();
        assert_eq!(segments, [expected.as_slice()]);
    }

    #[test]
    fn rejected_derivation_aborts() {
        let script = ScriptedExecutor::default().respond(&[0x09; 32]).respond(&[0x0F]);
        let mut device = Device::new(script);
        let mut roll = KeyRoll::new(7, &KEY, &SessionConfig::default()).unwrap();

        assert_eq!(
            roll.run(&mut device).unwrap_err(),
            Error::Transport(TransportError::Device { status: 0x0F })
        );
        assert_eq!(roll.aborted_in(), Some(KeyRollState::DeriveIssued));
    }

    #[test]
    fn shared_num_in_is_refused_when_distinct_required() {
        let config = SessionConfig { distinct_num_in: true, ..SessionConfig::default() };

        assert!(matches!(KeyRoll::new(7, &KEY, &config), Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn distinct_inputs_are_accepted() {
        let config = SessionConfig {
            auth_num_in: [1; 20],
            read_num_in: [2; 20],
            write_num_in: [3; 20],
            check_mac_num_in: [4; 20],
            derive_num_in: [5; 20],
            distinct_num_in: true,
        };

        assert!(KeyRoll::new(7, &KEY, &config).is_ok());
    }
}
