//! One method per device command.
//!
//! [`Device`] turns a [`CommandExecutor`] into typed calls that return the
//! command's payload. It holds no session state and computes no digests;
//! pairing device commands with host computations is the job of
//! [`crate::protocol`].
//!
//! Every wrapper checks the response shape itself, so it behaves the same
//! over a [`crate::Marshaler`] or an executor that passes error statuses
//! through.

use atsha_proto::{
    CheckMacMode, Command, DeriveKeyMode, DeviceStatus, KEY_SIZE, LockMode, MacMode,
    NUM_IN_SIZE, NonceMode, OTHER_DATA_SIZE, Response, SERIAL_NUMBER_SIZE, Zone, ZoneParam,
};

use crate::{error::TransportError, transport::CommandExecutor};

/// Size of the configuration zone.
pub const CONFIG_SIZE: usize = 88;

/// Configuration bytes 16..84, the part writable before the zone is locked.
pub const CONFIG_WRITABLE_SIZE: usize = 68;

/// Word address of the first writable configuration word.
pub const CONFIG_WRITABLE_WORD: u16 = 0x04;

/// Word address holding UserExtra, Selector, LockValue and LockConfig.
pub const LOCK_WORD: u16 = 0x15;

const WORD_SIZE: usize = 4;

type Result<T> = std::result::Result<T, TransportError>;

/// Typed access to one device.
#[derive(Debug)]
pub struct Device<E> {
    executor: E,
}

impl<E: CommandExecutor> Device<E> {
    /// Wrap `executor`.
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Underlying executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Underlying executor, mutably.
    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Release the executor.
    pub fn into_inner(self) -> E {
        self.executor
    }

    fn exchange(&mut self, command: &Command) -> Result<Response> {
        let response = self.executor.execute(command)?;
        if let Some(status) = response.status()
            && status != DeviceStatus::Success.to_u8()
        {
            return Err(TransportError::Device { status });
        }
        Ok(response)
    }

    fn status(&mut self, command: &Command) -> Result<()> {
        let response = self.exchange(command)?;
        match response.status() {
            Some(status) if status == DeviceStatus::Success.to_u8() => Ok(()),
            _ => Err(TransportError::UnexpectedLength { expected: 1, actual: response.data().len() }),
        }
    }

    fn fixed<const N: usize>(&mut self, command: &Command) -> Result<[u8; N]> {
        let response = self.exchange(command)?;
        let data = response.data();
        data.try_into()
            .map_err(|_| TransportError::UnexpectedLength { expected: N, actual: data.len() })
    }

    /// DevRev: the four revision bytes.
    pub fn dev_rev(&mut self) -> Result<[u8; 4]> {
        self.fixed(&Command::dev_rev())
    }

    /// Random: 32 bytes from the device RNG.
    pub fn random(&mut self, update_seed: bool) -> Result<[u8; KEY_SIZE]> {
        self.fixed(&Command::random(update_seed))
    }

    /// Nonce with a 20-byte host input. Returns the device's `rand_out`.
    ///
    /// Meant for the random modes; the device rejects a pass-through nonce
    /// of this length with a parse error. Use [`Device::load_temp_key`] to
    /// pass a value through.
    pub fn nonce(&mut self, mode: NonceMode, num_in: &[u8; NUM_IN_SIZE]) -> Result<[u8; KEY_SIZE]> {
        self.fixed(&Command::nonce(mode, num_in))
    }

    /// Nonce in pass-through mode: load `value` into the device TempKey.
    pub fn load_temp_key(&mut self, value: &[u8; KEY_SIZE]) -> Result<()> {
        self.status(&Command::nonce(NonceMode::PassThrough, value))
    }

    /// GenDig over the value at `key_id` in `zone`.
    pub fn gen_dig(&mut self, zone: Zone, key_id: u16) -> Result<()> {
        self.status(&Command::gen_dig(zone, key_id))
    }

    /// MAC: the 32-byte digest.
    pub fn mac(
        &mut self,
        mode: MacMode,
        key_id: u16,
        challenge: Option<&[u8; KEY_SIZE]>,
    ) -> Result<[u8; KEY_SIZE]> {
        self.fixed(&Command::mac(mode, key_id, challenge))
    }

    /// HMAC: the 32-byte digest.
    pub fn hmac(&mut self, mode: MacMode, key_id: u16) -> Result<[u8; KEY_SIZE]> {
        self.fixed(&Command::hmac(mode, key_id))
    }

    /// CheckMac. A miscompare surfaces as `TransportError::Device` with
    /// status 0x01.
    pub fn check_mac(
        &mut self,
        mode: CheckMacMode,
        key_id: u16,
        client_challenge: &[u8; KEY_SIZE],
        client_response: &[u8; KEY_SIZE],
        other_data: &[u8; OTHER_DATA_SIZE],
    ) -> Result<()> {
        self.status(&Command::check_mac(mode, key_id, client_challenge, client_response, other_data))
    }

    /// DeriveKey into `target_key_id`.
    pub fn derive_key(
        &mut self,
        mode: DeriveKeyMode,
        target_key_id: u16,
        mac: Option<&[u8; KEY_SIZE]>,
    ) -> Result<()> {
        self.status(&Command::derive_key(mode, target_key_id, mac))
    }

    /// Read 4 or 32 bytes at word `address`.
    pub fn read(&mut self, param: ZoneParam, address: u16) -> Result<Vec<u8>> {
        let expected = param.byte_count();
        let response = self.exchange(&Command::read(param, address))?;
        let data = response.data();
        if data.len() != expected {
            return Err(TransportError::UnexpectedLength { expected, actual: data.len() });
        }
        Ok(data.to_vec())
    }

    /// Read one 4-byte word.
    pub fn read_word(&mut self, zone: Zone, address: u16) -> Result<[u8; WORD_SIZE]> {
        self.fixed(&Command::read(ZoneParam::word(zone), address))
    }

    /// Read one 32-byte block starting at word `address`.
    pub fn read_block(&mut self, zone: Zone, address: u16) -> Result<[u8; KEY_SIZE]> {
        self.fixed(&Command::read(ZoneParam::block(zone), address))
    }

    /// Write 4 or 32 bytes, with the input MAC of an encrypted write.
    pub fn write(
        &mut self,
        param: ZoneParam,
        address: u16,
        value: &[u8],
        mac: Option<&[u8; KEY_SIZE]>,
    ) -> Result<()> {
        self.status(&Command::write(param, address, value, mac))
    }

    /// Lock the configuration zone, or the data and OTP zones.
    pub fn lock(&mut self, mode: LockMode, summary_crc: u16) -> Result<()> {
        self.status(&Command::lock(mode, summary_crc))
    }

    /// The 9-byte serial number from configuration words 0..=3.
    pub fn read_serial_number(&mut self) -> Result<[u8; SERIAL_NUMBER_SIZE]> {
        let block = self.read_block(Zone::Config, 0)?;
        let mut sn = [0u8; SERIAL_NUMBER_SIZE];
        sn[..4].copy_from_slice(&block[..4]);
        sn[4..8].copy_from_slice(&block[8..12]);
        sn[8] = block[12];
        Ok(sn)
    }

    /// Configuration word 0x15: UserExtra, Selector, LockValue, LockConfig.
    pub fn read_lock_bytes(&mut self) -> Result<[u8; WORD_SIZE]> {
        self.read_word(Zone::Config, LOCK_WORD)
    }

    /// The whole configuration zone: two block reads and six word reads.
    pub fn read_config(&mut self) -> Result<[u8; CONFIG_SIZE]> {
        let mut config = [0u8; CONFIG_SIZE];
        for (i, chunk) in config[..2 * KEY_SIZE].chunks_exact_mut(KEY_SIZE).enumerate() {
            chunk.copy_from_slice(&self.read_block(Zone::Config, 8 * i as u16)?);
        }
        for (i, chunk) in config[2 * KEY_SIZE..].chunks_exact_mut(WORD_SIZE).enumerate() {
            chunk.copy_from_slice(&self.read_word(Zone::Config, 0x10 + i as u16)?);
        }
        Ok(config)
    }

    /// Write configuration bytes 16..84 one word at a time.
    ///
    /// Stops at the first failing word; earlier words stay written.
    pub fn write_config(&mut self, data: &[u8; CONFIG_WRITABLE_SIZE]) -> Result<()> {
        for (i, word) in data.chunks_exact(WORD_SIZE).enumerate() {
            let address = CONFIG_WRITABLE_WORD + i as u16;
            self.write(ZoneParam::word(Zone::Config), address, word, None)?;
        }
        Ok(())
    }
}
