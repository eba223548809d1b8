//! Packet-level errors.

use thiserror::Error;

/// Result alias for packet operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while building or parsing packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than the smallest valid packet
    #[error("packet too short: {actual} bytes, need at least {min}")]
    PacketTooShort {
        /// Bytes available
        actual: usize,
        /// Minimum packet size
        min: usize,
    },

    /// Count byte disagrees with the bytes received
    #[error("count byte {count} does not fit {available} received bytes")]
    CountMismatch {
        /// Value of the count byte
        count: u8,
        /// Bytes actually available
        available: usize,
    },

    /// Trailing CRC does not match the packet contents
    #[error("crc mismatch: packet carries {received:#06x}, computed {computed:#06x}")]
    CrcMismatch {
        /// CRC carried by the packet
        received: u16,
        /// CRC computed over the packet
        computed: u16,
    },

    /// Command does not fit the device's input buffer
    #[error("command packet of {size} bytes exceeds the {max} byte limit")]
    CommandTooLarge {
        /// Packet size
        size: usize,
        /// Device limit
        max: usize,
    },

    /// Opcode byte not part of the command set
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
}
