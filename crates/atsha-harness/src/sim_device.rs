//! Software model of the SHA-204 device.
//!
//! `SimDevice` executes decoded [`Command`]s against its own memory and
//! TempKey register. It models what the host can observe:
//!
//! - Sixteen 32-byte data slots, each with a [`SlotPolicy`]
//! - A 64-byte OTP zone and an 88-byte configuration zone holding the
//!   serial number, revision and lock bytes
//! - TempKey with its valid flag, source flag and GenDig binding; every
//!   command that reads TempKey clears it, and sleep discards it
//! - Zone locking with summary CRC checks
//!
//! Failures come back as the status byte the real device would send.
//! Anything the device cannot parse is `ParseError`; anything refused in the
//! current state (invalid TempKey, locked zone, protected slot, bad input
//! MAC) is `ExecutionError`.

use std::ops::Range;

use atsha_crypto::params;
use atsha_proto::{
    CheckMacMode, Command, DeriveKeyMode, DeviceStatus, LockMode, MacMode, Opcode, Response, Zone,
    ZoneParam, command::nonce_input_len, crc16,
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::digest::{self, Block};

/// Size of the configuration zone.
pub const CONFIG_SIZE: usize = 88;

/// Serial number of a fresh [`SimDevice`].
pub const DEFAULT_SERIAL: [u8; 9] = [0x01, 0x23, 0x6A, 0x5B, 0x10, 0x20, 0x30, 0x40, 0xEE];

const OTP_SIZE: usize = 64;
const SLOT_COUNT: usize = 16;
const REVISION: [u8; 4] = [0x00, 0x02, 0x00, 0x09];

const LOCK_VALUE: usize = 86;
const LOCK_CONFIG: usize = 87;
const UNLOCKED: u8 = 0x55;
const LOCKED: u8 = 0x00;

/// Configuration words writable before the configuration zone is locked.
const WRITABLE_CONFIG_WORDS: Range<u16> = 0x04..0x15;

type Outcome = Result<Vec<u8>, DeviceStatus>;

fn parse_error<E>(_: E) -> DeviceStatus {
    DeviceStatus::ParseError
}

/// Access rules of one data slot, enforced once the data zone is locked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotPolicy {
    /// Plain reads and writes are refused
    pub secret: bool,
    /// Reads return the slot encrypted under the key in this slot
    pub read_key: Option<u8>,
    /// Writes and DeriveKey are authorized by the key in this slot
    pub write_key: Option<u8>,
}

impl SlotPolicy {
    /// Key slot that never leaves the device.
    pub fn secret() -> Self {
        Self { secret: true, ..Self::default() }
    }

    /// Slot read and written only in encrypted form.
    pub fn encrypted(read_key: u8, write_key: u8) -> Self {
        Self { secret: true, read_key: Some(read_key), write_key: Some(write_key) }
    }
}

#[derive(Debug, Clone, Default)]
struct SimTempKey {
    value: Block,
    valid: bool,
    from_input: bool,
    data_slot: Option<u8>,
}

impl SimTempKey {
    fn loaded(value: Block, from_input: bool) -> Self {
        Self { value, valid: true, from_input, data_slot: None }
    }
}

/// Software SHA-204 device.
#[derive(Debug, Clone)]
pub struct SimDevice {
    slots: [Block; SLOT_COUNT],
    policies: [SlotPolicy; SLOT_COUNT],
    otp: [u8; OTP_SIZE],
    config: [u8; CONFIG_SIZE],
    temp_key: SimTempKey,
    rng: ChaCha8Rng,
}

impl SimDevice {
    /// Blank, unlocked device whose RNG is seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        let mut config = [0u8; CONFIG_SIZE];
        config[0..4].copy_from_slice(&DEFAULT_SERIAL[0..4]);
        config[4..8].copy_from_slice(&REVISION);
        config[8..13].copy_from_slice(&DEFAULT_SERIAL[4..9]);
        config[LOCK_VALUE] = UNLOCKED;
        config[LOCK_CONFIG] = UNLOCKED;

        Self {
            slots: [[0; 32]; SLOT_COUNT],
            policies: [SlotPolicy::default(); SLOT_COUNT],
            otp: [0; OTP_SIZE],
            config,
            temp_key: SimTempKey::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Provision `slot` with `value` and `policy`.
    #[must_use]
    pub fn with_slot(mut self, slot: usize, value: Block, policy: SlotPolicy) -> Self {
        self.slots[slot] = value;
        self.policies[slot] = policy;
        self
    }

    /// Provision the OTP zone.
    #[must_use]
    pub fn with_otp(mut self, otp: [u8; OTP_SIZE]) -> Self {
        self.otp = otp;
        self
    }

    /// Lock both zones without CRC checks, as a personalized part ships.
    #[must_use]
    pub fn locked(mut self) -> Self {
        self.config[LOCK_CONFIG] = LOCKED;
        self.config[LOCK_VALUE] = LOCKED;
        self
    }

    /// Serial number assembled from the configuration zone.
    pub fn serial_number(&self) -> [u8; 9] {
        let mut sn = [0u8; 9];
        sn[0..4].copy_from_slice(&self.config[0..4]);
        sn[4..9].copy_from_slice(&self.config[8..13]);
        sn
    }

    /// Current content of `slot`.
    pub fn slot(&self, slot: usize) -> &Block {
        &self.slots[slot]
    }

    /// Configuration zone.
    pub fn config(&self) -> &[u8; CONFIG_SIZE] {
        &self.config
    }

    /// TempKey value, if valid.
    pub fn temp_key(&self) -> Option<&Block> {
        self.temp_key.valid.then_some(&self.temp_key.value)
    }

    /// Whether the configuration zone is locked.
    pub fn config_locked(&self) -> bool {
        self.config[LOCK_CONFIG] != UNLOCKED
    }

    /// Whether the data and OTP zones are locked.
    pub fn data_locked(&self) -> bool {
        self.config[LOCK_VALUE] != UNLOCKED
    }

    /// Enter sleep; TempKey is lost.
    pub fn sleep(&mut self) {
        self.temp_key = SimTempKey::default();
    }

    /// Execute `command` and frame the outcome as a response packet.
    pub fn respond(&mut self, command: &Command) -> Response {
        match self.execute(command) {
            Ok(data) if data.is_empty() => Response::from_status(DeviceStatus::Success),
            Ok(data) => Response::from_data(&data),
            Err(status) => {
                tracing::debug!(opcode = ?command.opcode(), ?status, "simulated device refused");
                Response::from_status(status)
            },
        }
    }

    /// Execute `command`. An empty `Ok` is a bare success status.
    pub fn execute(&mut self, command: &Command) -> Outcome {
        let data: Vec<u8> = command.data().flatten().copied().collect();
        let (param1, param2) = (command.param1(), command.param2());

        match command.opcode() {
            Opcode::Nonce => self.nonce(param1, &data),
            Opcode::GenDig => self.gen_dig(param1, param2, &data),
            Opcode::Mac => self.mac(param1, param2, &data),
            Opcode::Hmac => self.hmac(param1, param2, &data),
            Opcode::CheckMac => self.check_mac(param1, param2, &data),
            Opcode::DeriveKey => self.derive_key(param1, param2, &data),
            Opcode::Read => self.read(param1, param2),
            Opcode::Write => self.write(param1, param2, &data),
            Opcode::Lock => self.lock(param1, param2),
            Opcode::Random => {
                let mut out = [0u8; 32];
                self.rng.fill_bytes(&mut out);
                Ok(out.to_vec())
            },
            Opcode::DevRev => Ok(REVISION.to_vec()),
            Opcode::Pause | Opcode::UpdateExtra => Err(DeviceStatus::ParseError),
        }
    }

    fn nonce(&mut self, raw_mode: u8, data: &[u8]) -> Outcome {
        let mode = params::nonce_mode(raw_mode).map_err(parse_error)?;
        if data.len() != nonce_input_len(mode) {
            return Err(DeviceStatus::ParseError);
        }

        if mode.is_random() {
            let mut rand_out = [0u8; 32];
            self.rng.fill_bytes(&mut rand_out);
            self.temp_key = SimTempKey::loaded(digest::nonce(&rand_out, data, raw_mode), false);
            Ok(rand_out.to_vec())
        } else {
            let value = data.try_into().map_err(parse_error)?;
            self.temp_key = SimTempKey::loaded(value, true);
            Ok(Vec::new())
        }
    }

    fn gen_dig(&mut self, raw_zone: u8, key_id: u16, data: &[u8]) -> Outcome {
        let zone = params::gen_dig_zone(raw_zone).map_err(parse_error)?;
        if !data.is_empty() {
            return Err(DeviceStatus::ParseError);
        }
        let stored = match zone {
            Zone::Data => self.slots[slot_index(key_id)?],
            Zone::Config => block_of(&self.config, key_id)?,
            Zone::Otp => block_of(&self.otp, key_id)?,
        };
        if !self.temp_key.valid {
            return Err(DeviceStatus::ExecutionError);
        }

        self.temp_key.value = digest::gen_dig(&stored, raw_zone, key_id, &self.temp_key.value);
        self.temp_key.data_slot = (zone == Zone::Data).then_some(key_id as u8);
        Ok(Vec::new())
    }

    fn mac(&mut self, raw_mode: u8, key_id: u16, data: &[u8]) -> Outcome {
        let mode = params::mac_mode(raw_mode).map_err(parse_error)?;
        let slot = slot_index(key_id)?;
        let challenge: Block = if mode.contains(MacMode::BLOCK2_TEMPKEY) {
            if !data.is_empty() {
                return Err(DeviceStatus::ParseError);
            }
            [0; 32]
        } else {
            data.try_into().map_err(parse_error)?
        };

        let temp_key = if mode.uses_temp_key() {
            self.consume_temp_key(mode.contains(MacMode::SOURCE_FLAG_MATCH))?
        } else {
            [0; 32]
        };
        let block1 = if mode.contains(MacMode::BLOCK1_TEMPKEY) { temp_key } else { self.slots[slot] };
        let block2 = if mode.contains(MacMode::BLOCK2_TEMPKEY) { temp_key } else { challenge };
        let sn = mode.contains(MacMode::INCLUDE_SN).then(|| self.serial_number());

        let otp = &self.otp[..mode.otp_len()];
        Ok(digest::mac(&block1, &block2, raw_mode, key_id, otp, sn.as_ref()).to_vec())
    }

    fn hmac(&mut self, raw_mode: u8, key_id: u16, data: &[u8]) -> Outcome {
        let mode = params::hmac_mode(raw_mode).map_err(parse_error)?;
        let slot = slot_index(key_id)?;
        if !data.is_empty() {
            return Err(DeviceStatus::ParseError);
        }

        let temp_key = self.consume_temp_key(mode.contains(MacMode::SOURCE_FLAG_MATCH))?;
        let sn = mode.contains(MacMode::INCLUDE_SN).then(|| self.serial_number());

        let otp = &self.otp[..mode.otp_len()];
        Ok(digest::hmac(&self.slots[slot], &temp_key, raw_mode, key_id, otp, sn.as_ref()).to_vec())
    }

    fn check_mac(&mut self, raw_mode: u8, key_id: u16, data: &[u8]) -> Outcome {
        let mode = params::check_mac_mode(raw_mode).map_err(parse_error)?;
        let slot = slot_index(key_id)?;
        if data.len() != 32 + 32 + 13 {
            return Err(DeviceStatus::ParseError);
        }
        let (challenge, rest) = data.split_at(32);
        let (response, other) = rest.split_at(32);
        let challenge: Block = challenge.try_into().map_err(parse_error)?;
        let other: [u8; 13] = other.try_into().map_err(parse_error)?;

        let temp_key = if mode.uses_temp_key() {
            self.consume_temp_key(mode.contains(CheckMacMode::SOURCE_FLAG_MATCH))?
        } else {
            [0; 32]
        };
        let block1 =
            if mode.contains(CheckMacMode::BLOCK1_TEMPKEY) { temp_key } else { self.slots[slot] };
        let block2 = if mode.contains(CheckMacMode::BLOCK2_TEMPKEY) { temp_key } else { challenge };
        let mut otp = [0u8; 8];
        if mode.contains(CheckMacMode::INCLUDE_OTP_64) {
            otp.copy_from_slice(&self.otp[..8]);
        }

        if digest::check_mac(&block1, &block2, &other, &otp).as_slice() == response {
            Ok(Vec::new())
        } else {
            Err(DeviceStatus::CheckMacMiscompare)
        }
    }

    fn derive_key(&mut self, raw_mode: u8, target: u16, data: &[u8]) -> Outcome {
        let mode = params::derive_key_mode(raw_mode).map_err(parse_error)?;
        let slot = slot_index(target)?;
        if !data.is_empty() && data.len() != 32 {
            return Err(DeviceStatus::ParseError);
        }

        let temp_key = self.consume_temp_key(mode.contains(DeriveKeyMode::SOURCE_FLAG_MATCH))?;
        if self.data_locked()
            && let Some(write_key) = self.policies[slot].write_key
        {
            let expected = digest::derive_key_mac(&self.slots[usize::from(write_key)], raw_mode, target);
            if data != expected.as_slice() {
                return Err(DeviceStatus::ExecutionError);
            }
        }

        self.slots[slot] = digest::derive_key(&self.slots[slot], raw_mode, target, &temp_key);
        Ok(Vec::new())
    }

    fn read(&mut self, raw_param: u8, address: u16) -> Outcome {
        let param = ZoneParam::from_u8(raw_param).ok_or(DeviceStatus::ParseError)?;
        let len = param.byte_count();

        match param.zone {
            Zone::Config => Ok(window(&self.config, address, len)?.to_vec()),
            Zone::Otp => Ok(window(&self.otp, address, len)?.to_vec()),
            Zone::Data => {
                if !self.data_locked() {
                    return Err(DeviceStatus::ExecutionError);
                }
                let (slot, offset) = data_location(address, len)?;
                let policy = self.policies[slot];

                if let Some(read_key) = policy.read_key {
                    if len != 32 {
                        return Err(DeviceStatus::ExecutionError);
                    }
                    let pad = self.consume_bound_temp_key(read_key)?;
                    return Ok(xor(&self.slots[slot], &pad).to_vec());
                }
                if policy.secret {
                    return Err(DeviceStatus::ExecutionError);
                }
                Ok(self.slots[slot][offset..offset + len].to_vec())
            },
        }
    }

    fn write(&mut self, raw_param: u8, address: u16, data: &[u8]) -> Outcome {
        let param = ZoneParam::from_u8(raw_param).ok_or(DeviceStatus::ParseError)?;
        let len = param.byte_count();
        if data.len() != len && data.len() != len + 32 {
            return Err(DeviceStatus::ParseError);
        }
        let (value, mac) = data.split_at(len);

        match param.zone {
            Zone::Config => {
                if self.config_locked() || len != 4 || !WRITABLE_CONFIG_WORDS.contains(&address) {
                    return Err(DeviceStatus::ExecutionError);
                }
                window_mut(&mut self.config, address, len)?.copy_from_slice(value);
            },
            Zone::Otp => {
                if self.data_locked() {
                    return Err(DeviceStatus::ExecutionError);
                }
                window_mut(&mut self.otp, address, len)?.copy_from_slice(value);
            },
            Zone::Data => {
                let (slot, offset) = data_location(address, len)?;
                let policy = self.policies[slot];

                if !self.data_locked() {
                    self.slots[slot][offset..offset + len].copy_from_slice(value);
                } else if let Some(write_key) = policy.write_key {
                    let (Ok(ciphertext), Ok(mac)) =
                        (<&Block>::try_from(value), <&Block>::try_from(mac))
                    else {
                        return Err(DeviceStatus::ExecutionError);
                    };
                    let pad = self.consume_bound_temp_key(write_key)?;
                    let plaintext = xor(ciphertext, &pad);
                    if digest::write_mac(&pad, raw_param, address, &plaintext) != *mac {
                        return Err(DeviceStatus::ExecutionError);
                    }
                    self.slots[slot] = plaintext;
                } else if policy.secret {
                    return Err(DeviceStatus::ExecutionError);
                } else {
                    self.slots[slot][offset..offset + len].copy_from_slice(value);
                }
            },
        }
        Ok(Vec::new())
    }

    fn lock(&mut self, raw_mode: u8, summary_crc: u16) -> Outcome {
        let mode = LockMode::from_bits(raw_mode).ok_or(DeviceStatus::ParseError)?;

        let (contents, lock_byte) = if mode.contains(LockMode::DATA_ZONE) {
            if !self.config_locked() || self.data_locked() {
                return Err(DeviceStatus::ExecutionError);
            }
            let mut contents = self.slots.concat();
            contents.extend_from_slice(&self.otp);
            (contents, LOCK_VALUE)
        } else {
            if self.config_locked() {
                return Err(DeviceStatus::ExecutionError);
            }
            (self.config.to_vec(), LOCK_CONFIG)
        };

        if !mode.contains(LockMode::NO_CRC) && crc16(&contents) != summary_crc {
            return Err(DeviceStatus::ExecutionError);
        }
        self.config[lock_byte] = LOCKED;
        tracing::debug!(data_zone = mode.contains(LockMode::DATA_ZONE), "simulated zone locked");
        Ok(Vec::new())
    }

    /// Take TempKey for a command that hashes it. Cleared whatever the outcome.
    fn consume_temp_key(&mut self, source_flag_match: bool) -> Result<Block, DeviceStatus> {
        let temp_key = std::mem::take(&mut self.temp_key);
        if !temp_key.valid || temp_key.from_input != source_flag_match {
            return Err(DeviceStatus::ExecutionError);
        }
        Ok(temp_key.value)
    }

    /// Take TempKey as an encryption pad for a slot keyed by `key`.
    fn consume_bound_temp_key(&mut self, key: u8) -> Result<Block, DeviceStatus> {
        let temp_key = std::mem::take(&mut self.temp_key);
        if !temp_key.valid || temp_key.from_input || temp_key.data_slot != Some(key) {
            return Err(DeviceStatus::ExecutionError);
        }
        Ok(temp_key.value)
    }
}

fn slot_index(key_id: u16) -> Result<usize, DeviceStatus> {
    params::slot_id(key_id).map(usize::from).map_err(parse_error)
}

/// 32-byte block `index` of a zone, as GenDig reads it.
fn block_of(zone: &[u8], index: u16) -> Result<Block, DeviceStatus> {
    let start = usize::from(index) * 32;
    zone.get(start..start + 32)
        .and_then(|block| block.try_into().ok())
        .ok_or(DeviceStatus::ParseError)
}

/// Byte range addressed by a Read or Write of `len` bytes at word `address`.
fn byte_range(zone_len: usize, address: u16, len: usize) -> Result<Range<usize>, DeviceStatus> {
    let start = usize::from(address) * 4;
    if start % len != 0 || start + len > zone_len {
        return Err(DeviceStatus::ParseError);
    }
    Ok(start..start + len)
}

fn window(zone: &[u8], address: u16, len: usize) -> Result<&[u8], DeviceStatus> {
    Ok(&zone[byte_range(zone.len(), address, len)?])
}

fn window_mut(zone: &mut [u8], address: u16, len: usize) -> Result<&mut [u8], DeviceStatus> {
    let range = byte_range(zone.len(), address, len)?;
    Ok(&mut zone[range])
}

/// Slot and byte offset of a data zone access.
fn data_location(address: u16, len: usize) -> Result<(usize, usize), DeviceStatus> {
    let range = byte_range(SLOT_COUNT * 32, address, len)?;
    Ok((range.start / 32, range.start % 32))
}

fn xor(data: &Block, pad: &Block) -> Block {
    std::array::from_fn(|i| data[i] ^ pad[i])
}
