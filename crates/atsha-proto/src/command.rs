//! Command value objects and their wire packets.
//!
//! A [`Command`] is an owned, caller-held description of one device
//! operation. Nothing here is shared between calls: two connections can
//! build and send commands concurrently without coordination.

use bytes::Bytes;

use crate::{
    CheckMacMode, DeriveKeyMode, KEY_SIZE, LockMode, MacMode, NUM_IN_SIZE, NonceMode,
    OTHER_DATA_SIZE, Opcode, Zone, ZoneParam,
    crc::{crc16, crc16_bytes},
    errors::{ProtocolError, Result},
};

/// Count, opcode, param1, param2 and CRC.
pub const COMMAND_OVERHEAD: usize = 7;

/// Largest command packet the device accepts (CheckMac).
pub const COMMAND_SIZE_MAX: usize = 84;

/// Count byte plus CRC around a response payload.
pub const RESPONSE_OVERHEAD: usize = 3;

/// Response to a command that only reports status.
pub const STATUS_RESPONSE_SIZE: usize = 4;

/// Response carrying a 32-byte payload.
pub const BLOCK_RESPONSE_SIZE: usize = KEY_SIZE + RESPONSE_OVERHEAD;

/// Largest response the device produces.
pub const RESPONSE_SIZE_MAX: usize = BLOCK_RESPONSE_SIZE;

/// One device command: opcode, two parameters, up to three data segments
/// and the response budget the caller reserves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: Opcode,
    param1: u8,
    param2: u16,
    data: [Bytes; 3],
    rx_size: usize,
}

impl Command {
    fn new(opcode: Opcode, param1: u8, param2: u16, rx_size: usize) -> Self {
        Self { opcode, param1, param2, data: [Bytes::new(), Bytes::new(), Bytes::new()], rx_size }
    }

    fn with_data(mut self, index: usize, data: &[u8]) -> Self {
        self.data[index] = Bytes::copy_from_slice(data);
        self
    }

    /// Nonce. `num_in` is the 20-byte host input for random modes or the
    /// 32-byte value for pass-through.
    #[must_use]
    pub fn nonce(mode: NonceMode, num_in: &[u8]) -> Self {
        let rx_size =
            if mode.is_random() { BLOCK_RESPONSE_SIZE } else { STATUS_RESPONSE_SIZE };
        Self::new(Opcode::Nonce, mode.to_u8(), 0, rx_size).with_data(0, num_in)
    }

    /// GenDig over the value stored at `key_id` in `zone`.
    #[must_use]
    pub fn gen_dig(zone: Zone, key_id: u16) -> Self {
        Self::new(Opcode::GenDig, zone.to_u8(), key_id, STATUS_RESPONSE_SIZE)
    }

    /// MAC with an optional 32-byte challenge (omitted when block 2 is
    /// TempKey).
    #[must_use]
    pub fn mac(mode: MacMode, key_id: u16, challenge: Option<&[u8; KEY_SIZE]>) -> Self {
        let command = Self::new(Opcode::Mac, mode.bits(), key_id, BLOCK_RESPONSE_SIZE);
        match challenge {
            Some(challenge) => command.with_data(0, challenge),
            None => command,
        }
    }

    /// HMAC keyed by slot `key_id`.
    #[must_use]
    pub fn hmac(mode: MacMode, key_id: u16) -> Self {
        Self::new(Opcode::Hmac, mode.bits(), key_id, BLOCK_RESPONSE_SIZE)
    }

    /// CheckMac of a client response against slot `key_id`.
    #[must_use]
    pub fn check_mac(
        mode: CheckMacMode,
        key_id: u16,
        client_challenge: &[u8; KEY_SIZE],
        client_response: &[u8; KEY_SIZE],
        other_data: &[u8; OTHER_DATA_SIZE],
    ) -> Self {
        Self::new(Opcode::CheckMac, mode.bits(), key_id, STATUS_RESPONSE_SIZE)
            .with_data(0, client_challenge)
            .with_data(1, client_response)
            .with_data(2, other_data)
    }

    /// DeriveKey into `target_key_id`, with the input MAC the slot may
    /// demand.
    #[must_use]
    pub fn derive_key(
        mode: DeriveKeyMode,
        target_key_id: u16,
        mac: Option<&[u8; KEY_SIZE]>,
    ) -> Self {
        let command =
            Self::new(Opcode::DeriveKey, mode.bits(), target_key_id, STATUS_RESPONSE_SIZE);
        match mac {
            Some(mac) => command.with_data(0, mac),
            None => command,
        }
    }

    /// Read 4 or 32 bytes at word `address`.
    #[must_use]
    pub fn read(param: ZoneParam, address: u16) -> Self {
        Self::new(Opcode::Read, param.to_u8(), address, param.byte_count() + RESPONSE_OVERHEAD)
    }

    /// Write `value` at word `address`, followed by the input MAC when the
    /// write is encrypted.
    #[must_use]
    pub fn write(param: ZoneParam, address: u16, value: &[u8], mac: Option<&[u8; KEY_SIZE]>) -> Self {
        let command = Self::new(Opcode::Write, param.to_u8(), address, STATUS_RESPONSE_SIZE)
            .with_data(0, value);
        match mac {
            Some(mac) => command.with_data(1, mac),
            None => command,
        }
    }

    /// Lock a zone; `summary_crc` is ignored when `mode` has `NO_CRC`.
    #[must_use]
    pub fn lock(mode: LockMode, summary_crc: u16) -> Self {
        Self::new(Opcode::Lock, mode.bits(), summary_crc, STATUS_RESPONSE_SIZE)
    }

    /// Random; `update_seed` refreshes the RNG seed in EEPROM.
    #[must_use]
    pub fn random(update_seed: bool) -> Self {
        Self::new(Opcode::Random, u8::from(!update_seed), 0, BLOCK_RESPONSE_SIZE)
    }

    /// DevRev.
    #[must_use]
    pub fn dev_rev() -> Self {
        Self::new(Opcode::DevRev, 0, 0, 4 + RESPONSE_OVERHEAD)
    }

    /// Operation code.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// First parameter (mode or zone).
    #[must_use]
    pub fn param1(&self) -> u8 {
        self.param1
    }

    /// Second parameter (key id or address).
    #[must_use]
    pub fn param2(&self) -> u16 {
        self.param2
    }

    /// Non-empty data segments in transmission order.
    pub fn data(&self) -> impl Iterator<Item = &[u8]> {
        self.data.iter().filter(|segment| !segment.is_empty()).map(Bytes::as_ref)
    }

    /// Total data length across segments.
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.data.iter().map(Bytes::len).sum()
    }

    /// Bytes reserved for the response packet.
    #[must_use]
    pub fn rx_size(&self) -> usize {
        self.rx_size
    }

    /// Length of the command packet.
    #[must_use]
    pub fn tx_size(&self) -> usize {
        COMMAND_OVERHEAD + self.data_len()
    }

    /// Serialize to `count ‖ opcode ‖ param1 ‖ param2 ‖ data… ‖ crc`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CommandTooLarge` if the packet exceeds
    ///   [`COMMAND_SIZE_MAX`]
    pub fn to_packet(&self) -> Result<Vec<u8>> {
        let size = self.tx_size();
        if size > COMMAND_SIZE_MAX {
            return Err(ProtocolError::CommandTooLarge { size, max: COMMAND_SIZE_MAX });
        }

        let mut packet = Vec::with_capacity(size);
        packet.push(size as u8);
        packet.push(self.opcode.to_u8());
        packet.push(self.param1);
        packet.extend_from_slice(&self.param2.to_le_bytes());
        for segment in self.data() {
            packet.extend_from_slice(segment);
        }
        let crc = crc16_bytes(&packet);
        packet.extend_from_slice(&crc);

        debug_assert_eq!(packet.len(), size);
        Ok(packet)
    }

    /// Parse a command packet, as the device does on receipt.
    ///
    /// All data lands in the first segment; the response budget is set to
    /// [`RESPONSE_SIZE_MAX`].
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PacketTooShort` below [`COMMAND_OVERHEAD`] bytes
    /// - `ProtocolError::CountMismatch` if the count byte exceeds the packet
    /// - `ProtocolError::CrcMismatch` if the trailing CRC is wrong
    /// - `ProtocolError::UnknownOpcode` for an opcode outside the set
    pub fn from_packet(packet: &[u8]) -> Result<Self> {
        if packet.len() < COMMAND_OVERHEAD {
            return Err(ProtocolError::PacketTooShort {
                actual: packet.len(),
                min: COMMAND_OVERHEAD,
            });
        }

        let count = packet[0];
        let len = usize::from(count);
        if len < COMMAND_OVERHEAD || len > packet.len() {
            return Err(ProtocolError::CountMismatch { count, available: packet.len() });
        }

        let body = &packet[..len - 2];
        let received = u16::from_le_bytes([packet[len - 2], packet[len - 1]]);
        let computed = crc16(body);
        if received != computed {
            return Err(ProtocolError::CrcMismatch { received, computed });
        }

        let opcode = Opcode::try_from(body[1])?;
        let param2 = u16::from_le_bytes([body[3], body[4]]);
        Ok(Self::new(opcode, body[2], param2, RESPONSE_SIZE_MAX).with_data(0, &body[5..]))
    }
}

/// Length of the Nonce data segment in `mode`.
#[must_use]
pub fn nonce_input_len(mode: NonceMode) -> usize {
    if mode.is_random() { NUM_IN_SIZE } else { KEY_SIZE }
}
