//! SHA-204 protocol definitions
//!
//! Everything the host needs to agree on with the authentication element at
//! the byte level: opcodes, zone and mode parameter encodings, the fixed
//! message sizes of the device's internal digest computations, the CRC-16
//! used to protect packets, and the [`Command`] / [`Response`] value objects
//! exchanged with the transport.
//!
//! # Packet Layout
//!
//! ```text
//! command:  count ‖ opcode ‖ param1 ‖ param2 (LE) ‖ data… ‖ crc (LE)
//! response: count ‖ data… ‖ crc (LE)
//! ```
//!
//! `count` covers the whole packet including itself and the CRC. A response
//! carrying only a status byte is exactly four bytes long.
//!
//! This crate performs no I/O and holds no key material.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod command;
pub mod crc;
pub mod errors;
pub mod modes;
pub mod opcode;
pub mod response;
pub mod zone;

pub use command::Command;
pub use crc::{crc16, crc16_bytes, crc16_chain};
pub use errors::{ProtocolError, Result};
pub use modes::{CheckMacMode, DeriveKeyMode, LockMode, MacMode, NonceMode};
pub use opcode::Opcode;
pub use response::{DeviceStatus, Response};
pub use zone::{Zone, ZoneParam};

/// Size of a key, TempKey value, digest or 32-byte zone block.
pub const KEY_SIZE: usize = 32;

/// Size of the host-chosen NumIn of a random Nonce.
pub const NUM_IN_SIZE: usize = 20;

/// Size of the device serial number.
pub const SERIAL_NUMBER_SIZE: usize = 9;

/// Bytes of OTP folded into MAC/HMAC when 88 OTP bits are requested.
pub const OTP_88_SIZE: usize = 11;

/// Bytes of OTP folded into MAC/HMAC when 64 OTP bits are requested.
pub const OTP_64_SIZE: usize = 8;

/// Size of the OtherData field of a CheckMac command.
pub const OTHER_DATA_SIZE: usize = 13;

/// Highest addressable key slot.
pub const KEY_ID_MAX: u16 = 15;

/// Serial number byte 8, fixed for every device.
pub const SN_8: u8 = 0xEE;

/// Serial number byte 0, fixed for every device.
pub const SN_0: u8 = 0x01;

/// Serial number byte 1, fixed for every device.
pub const SN_1: u8 = 0x23;

/// Lengths of the messages the device hashes internally.
///
/// A host computation that assembles a message of any other length cannot
/// produce a matching digest.
pub mod msg_size {
    /// Nonce in a random mode.
    pub const NONCE: usize = 55;
    /// GenDig.
    pub const GEN_DIG: usize = 96;
    /// MAC.
    pub const MAC: usize = 88;
    /// Inner pass of HMAC.
    pub const HMAC_INNER: usize = 152;
    /// Outer pass of HMAC.
    pub const HMAC_OUTER: usize = 96;
    /// DeriveKey.
    pub const DERIVE_KEY: usize = 96;
    /// Input MAC of DeriveKey.
    pub const DERIVE_KEY_MAC: usize = 39;
    /// Input MAC of an encrypted Write.
    pub const ENCRYPT_MAC: usize = 96;
    /// CheckMac client response.
    pub const CHECK_MAC: usize = 88;
}
