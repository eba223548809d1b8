//! Memory zones and the zone/address parameters of Read and Write.

use crate::KEY_ID_MAX;

/// Bit of a Read/Write Param1 selecting a 32-byte block instead of 4 bytes.
pub const BLOCK_32_FLAG: u8 = 0x80;

/// Bits a Write Param1 may carry.
pub const WRITE_ZONE_MASK: u8 = 0xC3;

/// Bits a Read Param1 may carry.
pub const READ_ZONE_MASK: u8 = 0x83;

/// Memory regions of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Zone {
    /// Configuration zone (88 bytes)
    Config = 0x00,
    /// One-time-programmable zone
    Otp = 0x01,
    /// Data zone holding the sixteen 32-byte slots
    Data = 0x02,
}

impl Zone {
    /// Raw zone code.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Zone for a raw code. `None` if out of range.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Config),
            0x01 => Some(Self::Otp),
            0x02 => Some(Self::Data),
            _ => None,
        }
    }
}

/// Param1 of a Read or Write: zone plus transfer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneParam {
    /// Target zone
    pub zone: Zone,
    /// Transfer 32 bytes instead of 4
    pub block_32: bool,
}

impl ZoneParam {
    /// 32-byte access to `zone`.
    #[must_use]
    pub fn block(zone: Zone) -> Self {
        Self { zone, block_32: true }
    }

    /// 4-byte access to `zone`.
    #[must_use]
    pub fn word(zone: Zone) -> Self {
        Self { zone, block_32: false }
    }

    /// Encoded Param1 byte.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        let width = if self.block_32 { BLOCK_32_FLAG } else { 0 };
        self.zone.to_u8() | width
    }

    /// Decode a Param1 byte, ignoring bits outside [`WRITE_ZONE_MASK`].
    ///
    /// `None` if the zone bits are out of range.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        let zone = Zone::from_u8(value & 0x03)?;
        Some(Self { zone, block_32: value & BLOCK_32_FLAG != 0 })
    }

    /// Number of bytes transferred.
    #[must_use]
    pub fn byte_count(self) -> usize {
        if self.block_32 { 32 } else { 4 }
    }
}

/// Word address of the first block of a data slot.
///
/// `None` if `slot` is not an addressable key slot.
#[must_use]
pub fn slot_address(slot: u16) -> Option<u16> {
    (slot <= KEY_ID_MAX).then_some(slot * 8)
}
