//! Device command opcodes.

use crate::errors::ProtocolError;

/// Operation codes understood by the device.
///
/// The opcode byte is both the second byte of every command packet and a
/// field of most internally hashed messages, so the numeric values are part
/// of the digest contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Put the device into idle without losing TempKey
    Pause = 0x01,
    /// Read a 4- or 32-byte block from a zone
    Read = 0x02,
    /// Compute a MAC over a key and a challenge or TempKey
    Mac = 0x08,
    /// Compute an HMAC over a key and TempKey
    Hmac = 0x11,
    /// Write a 4- or 32-byte block to a zone
    Write = 0x12,
    /// Combine a stored value with TempKey
    GenDig = 0x15,
    /// Seed TempKey from a random or pass-through value
    Nonce = 0x16,
    /// Lock the configuration or data zone
    Lock = 0x17,
    /// Return 32 random bytes
    Random = 0x1B,
    /// Derive a slot key from TempKey
    DeriveKey = 0x1C,
    /// Update one of the extra configuration bytes
    UpdateExtra = 0x20,
    /// Verify a MAC computed by another party
    CheckMac = 0x28,
    /// Return the device revision
    DevRev = 0x30,
}

impl Opcode {
    /// Raw opcode byte.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Opcode for a raw byte. `None` if unrecognized.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Pause),
            0x02 => Some(Self::Read),
            0x08 => Some(Self::Mac),
            0x11 => Some(Self::Hmac),
            0x12 => Some(Self::Write),
            0x15 => Some(Self::GenDig),
            0x16 => Some(Self::Nonce),
            0x17 => Some(Self::Lock),
            0x1B => Some(Self::Random),
            0x1C => Some(Self::DeriveKey),
            0x20 => Some(Self::UpdateExtra),
            0x28 => Some(Self::CheckMac),
            0x30 => Some(Self::DevRev),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(ProtocolError::UnknownOpcode(value))
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        opcode.to_u8()
    }
}
