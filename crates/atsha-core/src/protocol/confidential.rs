//! Confidential slot read and write.
//!
//! Both runs bind the host and device TempKeys to a slot key with GenDig
//! over the data zone, then use TempKey as a one-time XOR pad for the
//! slot's 32 bytes:
//!
//! ```text
//! Init ─> NonceSent ─> NonceMirrored ─> DigestIssued ─> DigestMirrored ─┐
//!                                                                       │
//!   read:  ─> DataRead ─> Decrypted                               <─────┤
//!   write: ─> Encrypted ─> WriteIssued ─> Done                    <─────┘
//! ```
//!
//! GenDig must be mirrored before the data moves. Decrypting or encrypting
//! with a TempKey that was not bound this way is refused by the primitives.

use atsha_crypto::{decrypt, encrypt, gen_dig, nonce};
use atsha_proto::{KEY_SIZE, NUM_IN_SIZE, NonceMode, Zone, ZoneParam, zone::slot_address};
use zeroize::Zeroizing;

use super::{RunState, Session, check_slot};
use crate::{
    config::SessionConfig,
    device::Device,
    error::{Error, Result},
    transport::CommandExecutor,
};

/// States of a [`ConfidentialRead`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Not started
    Init,
    /// Device nonce requested
    NonceSent,
    /// Host TempKey mirrors the device
    NonceMirrored,
    /// Device GenDig requested
    DigestIssued,
    /// Host TempKey bound to the read key
    DigestMirrored,
    /// Ciphertext received
    DataRead,
    /// Plaintext recovered
    Decrypted,
    /// Aborted
    Failed,
}

impl RunState for ReadState {
    const INITIAL: Self = Self::Init;
    const FAILED: Self = Self::Failed;
}

/// States of a [`ConfidentialWrite`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// Not started
    Init,
    /// Device nonce requested
    NonceSent,
    /// Host TempKey mirrors the device
    NonceMirrored,
    /// Device GenDig requested
    DigestIssued,
    /// Host TempKey bound to the write key
    DigestMirrored,
    /// Ciphertext and input MAC computed
    Encrypted,
    /// Device Write requested
    WriteIssued,
    /// Device accepted the write
    Done,
    /// Aborted
    Failed,
}

impl RunState for WriteState {
    const INITIAL: Self = Self::Init;
    const FAILED: Self = Self::Failed;
}

fn data_slot_address(slot: u16) -> Result<u16> {
    slot_address(slot).ok_or(Error::InvalidParameter { reason: "target slot out of range" })
}

/// Bind both TempKeys to `key` in slot `key_id`. Shared steps 1 to 4.
fn bind<S: RunState, E: CommandExecutor>(
    session: &mut Session<S>,
    device: &mut Device<E>,
    num_in: &[u8; NUM_IN_SIZE],
    key_id: u16,
    key: &[u8; KEY_SIZE],
    states: [S; 4],
) -> Result<()> {
    let [nonce_sent, nonce_mirrored, digest_issued, digest_mirrored] = states;

    session.advance(nonce_sent);
    let rand_out = device.nonce(NonceMode::SeedUpdate, num_in)?;
    nonce(&mut session.temp_key, NonceMode::SeedUpdate, num_in, Some(&rand_out))?;
    session.advance(nonce_mirrored);

    session.advance(digest_issued);
    device.gen_dig(Zone::Data, key_id)?;
    gen_dig(&mut session.temp_key, Zone::Data, key_id, key)?;
    session.advance(digest_mirrored);
    Ok(())
}

/// Reads a slot configured for encrypted reads.
pub struct ConfidentialRead<'a> {
    session: Session<ReadState>,
    address: u16,
    read_key_id: u16,
    read_key: &'a [u8; KEY_SIZE],
    num_in: [u8; NUM_IN_SIZE],
}

impl<'a> ConfidentialRead<'a> {
    /// Prepare a read of `slot`, whose read key sits in slot `read_key_id`
    /// and holds `read_key`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidParameter` if either id is not a slot
    /// - `Error::InvalidParameter` if `config.validate()` fails
    pub fn new(
        slot: u16,
        read_key_id: u16,
        read_key: &'a [u8; KEY_SIZE],
        config: &SessionConfig,
    ) -> Result<Self> {
        let address = data_slot_address(slot)?;
        check_slot(read_key_id, "read key id is not a slot")?;
        config.validate()?;
        Ok(Self {
            session: Session::new("confidential_read"),
            address,
            read_key_id,
            read_key,
            num_in: config.read_num_in,
        })
    }

    /// Current state.
    pub fn state(&self) -> ReadState {
        self.session.state()
    }

    /// State the run was in when it failed.
    pub fn aborted_in(&self) -> Option<ReadState> {
        self.session.aborted_in()
    }

    /// Execute the run and return the slot's plaintext.
    ///
    /// # Errors
    ///
    /// - `Error::Transport` if a device round trip fails
    /// - `Error::StateInvalid` if the run was already used
    pub fn run<E: CommandExecutor>(
        &mut self,
        device: &mut Device<E>,
    ) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        let (address, key_id, key, num_in) =
            (self.address, self.read_key_id, self.read_key, self.num_in);

        self.session.drive(ReadState::Decrypted, |session| {
            bind(
                session,
                device,
                &num_in,
                key_id,
                key,
                [
                    ReadState::NonceSent,
                    ReadState::NonceMirrored,
                    ReadState::DigestIssued,
                    ReadState::DigestMirrored,
                ],
            )?;

            let mut data = Zeroizing::new(device.read_block(Zone::Data, address)?);
            session.advance(ReadState::DataRead);

            decrypt(&mut session.temp_key, &mut data)?;
            Ok(data)
        })
    }
}

/// Writes a slot configured for encrypted writes.
pub struct ConfidentialWrite<'a> {
    session: Session<WriteState>,
    address: u16,
    write_key_id: u16,
    write_key: &'a [u8; KEY_SIZE],
    plaintext: Zeroizing<[u8; KEY_SIZE]>,
    with_mac: bool,
    num_in: [u8; NUM_IN_SIZE],
}

impl<'a> ConfidentialWrite<'a> {
    /// Prepare a write of `plaintext` to `slot`, whose write key sits in
    /// slot `write_key_id` and holds `write_key`.
    ///
    /// The Write carries an input MAC unless [`Self::without_mac`] is used.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidParameter` if either id is not a slot
    /// - `Error::InvalidParameter` if `config.validate()` fails
    pub fn new(
        slot: u16,
        write_key_id: u16,
        write_key: &'a [u8; KEY_SIZE],
        plaintext: &[u8; KEY_SIZE],
        config: &SessionConfig,
    ) -> Result<Self> {
        let address = data_slot_address(slot)?;
        check_slot(write_key_id, "write key id is not a slot")?;
        config.validate()?;
        Ok(Self {
            session: Session::new("confidential_write"),
            address,
            write_key_id,
            write_key,
            plaintext: Zeroizing::new(*plaintext),
            with_mac: true,
            num_in: config.write_num_in,
        })
    }

    /// Omit the input MAC, for slots that do not demand one.
    #[must_use]
    pub fn without_mac(mut self) -> Self {
        self.with_mac = false;
        self
    }

    /// Current state.
    pub fn state(&self) -> WriteState {
        self.session.state()
    }

    /// State the run was in when it failed.
    pub fn aborted_in(&self) -> Option<WriteState> {
        self.session.aborted_in()
    }

    /// Execute the run.
    ///
    /// # Errors
    ///
    /// - `Error::Transport` if a device round trip fails, including the
    ///   device rejecting the input MAC
    /// - `Error::StateInvalid` if the run was already used
    pub fn run<E: CommandExecutor>(&mut self, device: &mut Device<E>) -> Result<()> {
        let (address, key_id, key, num_in, with_mac) =
            (self.address, self.write_key_id, self.write_key, self.num_in, self.with_mac);
        let mut data = self.plaintext.clone();
        let param = ZoneParam::block(Zone::Data);

        self.session.drive(WriteState::Done, |session| {
            bind(
                session,
                device,
                &num_in,
                key_id,
                key,
                [
                    WriteState::NonceSent,
                    WriteState::NonceMirrored,
                    WriteState::DigestIssued,
                    WriteState::DigestMirrored,
                ],
            )?;

            let mac = encrypt(&mut session.temp_key, param.to_u8(), address, &mut data, with_mac)?;
            session.advance(WriteState::Encrypted);

            session.advance(WriteState::WriteIssued);
            device.write(param, address, data.as_slice(), mac.as_ref())?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use atsha_crypto::{TempKey, TempKeySource};
    use atsha_proto::Opcode;

    use super::*;
    use crate::{error::TransportError, transport::testing::ScriptedExecutor};

    const KEY: [u8; 32] = [0x33; 32];

    /// TempKey the device would hold after nonce + GenDig with `rand_out`.
    fn bound_value(rand_out: &[u8; 32], key_id: u16, num_in: &[u8; 20]) -> [u8; 32] {
        let mut temp_key = TempKey::new();
        nonce(&mut temp_key, NonceMode::SeedUpdate, num_in, Some(rand_out)).unwrap();
        gen_dig(&mut temp_key, Zone::Data, key_id, &KEY).unwrap();
        *temp_key.value()
    }

    #[test]
    fn read_decrypts_block_with_bound_temp_key() {
        let config = SessionConfig::default();
        let pad = bound_value(&[0x10; 32], 4, &config.read_num_in);
        let plaintext = [0xC3; 32];
        let ciphertext: [u8; 32] = std::array::from_fn(|i| plaintext[i] ^ pad[i]);

        let script = ScriptedExecutor::default()
            .respond(&[0x10; 32])
            .respond(&[0x00])
            .respond(&ciphertext);
        let mut device = Device::new(script);
        let mut read = ConfidentialRead::new(9, 4, &KEY, &config).unwrap();

        let data = read.run(&mut device).unwrap();

        assert_eq!(*data, plaintext);
        assert_eq!(read.state(), ReadState::Decrypted);
        let sent = &device.executor().sent;
        assert_eq!(sent[1].opcode(), Opcode::GenDig);
        assert_eq!(sent[2].opcode(), Opcode::Read);
        assert_eq!(sent[2].param1(), 0x82);
        assert_eq!(sent[2].param2(), 72);
    }

    #[test]
    fn rejected_gen_dig_stops_before_reading() {
        let script = ScriptedExecutor::default().respond(&[0x10; 32]).respond(&[0x0F]);
        let mut device = Device::new(script);
        let mut read = ConfidentialRead::new(9, 4, &KEY, &SessionConfig::default()).unwrap();

        let result = read.run(&mut device);

        assert_eq!(result.unwrap_err(), Error::Transport(TransportError::Device { status: 0x0F }));
        assert_eq!(read.aborted_in(), Some(ReadState::DigestIssued));
        assert_eq!(device.executor().sent.len(), 2);
    }

    #[test]
    fn write_sends_ciphertext_and_mac() {
        let config = SessionConfig::default();
        let pad = bound_value(&[0x20; 32], 2, &config.write_num_in);
        let plaintext = [0x5A; 32];

        let script = ScriptedExecutor::default()
            .respond(&[0x20; 32])
            .respond(&[0x00])
            .respond(&[0x00]);
        let mut device = Device::new(script);
        let mut write = ConfidentialWrite::new(3, 2, &KEY, &plaintext, &config).unwrap();

        write.run(&mut device).unwrap();

        assert_eq!(write.state(), WriteState::Done);
        let sent = &device.executor().sent[2];
        assert_eq!(sent.opcode(), Opcode::Write);
        assert_eq!(sent.param2(), 24);
        assert_eq!(sent.data_len(), 64);

        let mut expected = TempKey::loaded(pad, TempKeySource::Random).bound_to_data_slot(2);
        let mut ciphertext = plaintext;
        let mac = encrypt(&mut expected, 0x82, 24, &mut ciphertext, true).unwrap().unwrap();
        let segments: Vec<&[u8]> = sent.data().collect();
        assert_eq!(segments, [ciphertext.as_slice(), mac.as_slice()]);
    }

    #[test]
    fn write_without_mac_sends_only_ciphertext() {
        let script = ScriptedExecutor::default()
            .respond(&[0x20; 32])
            .respond(&[0x00])
            .respond(&[0x00]);
        let mut device = Device::new(script);
        let mut write = ConfidentialWrite::new(3, 2, &KEY, &[0; 32], &SessionConfig::default())
            .unwrap()
            .without_mac();

        write.run(&mut device).unwrap();
        assert_eq!(device.executor().sent[2].data_len(), 32);
    }

    #[test]
    fn slot_sixteen_is_not_addressable() {
        assert!(matches!(
            ConfidentialRead::new(16, 0, &KEY, &SessionConfig::default()),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            ConfidentialWrite::new(0, 16, &KEY, &[0; 32], &SessionConfig::default()),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn shared_num_in_is_refused_when_distinct_required() {
        let config = SessionConfig {
            read_num_in: [0x01; 20],
            write_num_in: [0x01; 20],
            distinct_num_in: true,
            ..SessionConfig::default()
        };

        assert!(matches!(
            ConfidentialRead::new(9, 4, &KEY, &config),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            ConfidentialWrite::new(3, 2, &KEY, &[0; 32], &config),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
