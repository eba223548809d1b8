//! Mode parameters (Param1) of the digest-producing commands.
//!
//! The mode byte is hashed into the device's internal messages, so host and
//! device must agree on it bit for bit. Bit sets are modelled with
//! `bitflags`; `from_bits` rejects any bit the command does not define.

use bitflags::bitflags;

/// Mode of the Nonce command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NonceMode {
    /// Random nonce, device RNG seed updated from EEPROM
    SeedUpdate = 0x00,
    /// Random nonce, RNG seed left untouched
    NoSeedUpdate = 0x01,
    /// Load a 32-byte host value directly into TempKey
    PassThrough = 0x03,
}

impl NonceMode {
    /// Raw mode byte.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Mode for a raw byte. `None` for 0x02 and anything above 0x03.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::SeedUpdate),
            0x01 => Some(Self::NoSeedUpdate),
            0x03 => Some(Self::PassThrough),
            _ => None,
        }
    }

    /// Whether the device mixes its RNG output into TempKey in this mode.
    #[must_use]
    pub fn is_random(self) -> bool {
        !matches!(self, Self::PassThrough)
    }
}

bitflags! {
    /// Mode of the MAC and HMAC commands.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MacMode: u8 {
        /// Second 32-byte block is TempKey instead of the challenge
        const BLOCK2_TEMPKEY = 0x01;
        /// First 32-byte block is TempKey instead of the slot key
        const BLOCK1_TEMPKEY = 0x02;
        /// Must be set exactly when TempKey came from a pass-through nonce
        const SOURCE_FLAG_MATCH = 0x04;
        /// Fold in OTP[0..11]; takes precedence over `INCLUDE_OTP_64`
        const INCLUDE_OTP_88 = 0x10;
        /// Fold in OTP[0..8]
        const INCLUDE_OTP_64 = 0x20;
        /// Fold in serial number bytes 2..8
        const INCLUDE_SN = 0x40;
    }
}

impl MacMode {
    /// Bits accepted by the HMAC command, which always hashes TempKey in
    /// the second block.
    pub const HMAC_ALLOWED: Self = Self::SOURCE_FLAG_MATCH
        .union(Self::INCLUDE_OTP_88)
        .union(Self::INCLUDE_OTP_64)
        .union(Self::INCLUDE_SN);

    /// Whether either message block is taken from TempKey.
    #[must_use]
    pub fn uses_temp_key(self) -> bool {
        self.intersects(Self::BLOCK1_TEMPKEY | Self::BLOCK2_TEMPKEY)
    }

    /// Number of OTP bytes the mode folds into the message.
    #[must_use]
    pub fn otp_len(self) -> usize {
        if self.contains(Self::INCLUDE_OTP_88) {
            crate::OTP_88_SIZE
        } else if self.contains(Self::INCLUDE_OTP_64) {
            crate::OTP_64_SIZE
        } else {
            0
        }
    }
}

bitflags! {
    /// Mode of the CheckMac command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CheckMacMode: u8 {
        /// Second 32-byte block is TempKey instead of the client challenge
        const BLOCK2_TEMPKEY = 0x01;
        /// First 32-byte block is TempKey instead of the slot key
        const BLOCK1_TEMPKEY = 0x02;
        /// Must be set exactly when TempKey came from a pass-through nonce
        const SOURCE_FLAG_MATCH = 0x04;
        /// Fold in OTP[0..8] on the device side
        const INCLUDE_OTP_64 = 0x20;
    }
}

impl CheckMacMode {
    /// Whether either message block is taken from TempKey.
    #[must_use]
    pub fn uses_temp_key(self) -> bool {
        self.intersects(Self::BLOCK1_TEMPKEY | Self::BLOCK2_TEMPKEY)
    }
}

bitflags! {
    /// Param1 of the DeriveKey command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeriveKeyMode: u8 {
        /// Must be set exactly when TempKey came from a pass-through nonce
        const SOURCE_FLAG_MATCH = 0x04;
    }
}

bitflags! {
    /// Param1 of the Lock command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LockMode: u8 {
        /// Lock the data and OTP zones instead of the configuration zone
        const DATA_ZONE = 0x01;
        /// Skip the CRC summary check of the locked zone
        const NO_CRC = 0x80;
    }
}
