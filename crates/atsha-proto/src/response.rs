//! Response packets.

use bytes::Bytes;

use crate::{
    command::{RESPONSE_OVERHEAD, STATUS_RESPONSE_SIZE},
    crc::{crc16, crc16_bytes},
    errors::{ProtocolError, Result},
};

/// Status codes a device reports in a four-byte response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceStatus {
    /// Command executed
    Success = 0x00,
    /// CheckMac or Verify miscompare
    CheckMacMiscompare = 0x01,
    /// Command was malformed
    ParseError = 0x03,
    /// Command could not be executed in the current device state
    ExecutionError = 0x0F,
    /// Device has just woken up
    WakeReceived = 0x11,
    /// Device received a corrupted packet
    CommunicationError = 0xFF,
}

impl DeviceStatus {
    /// Status for a raw byte. `None` if unrecognized.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Success),
            0x01 => Some(Self::CheckMacMiscompare),
            0x03 => Some(Self::ParseError),
            0x0F => Some(Self::ExecutionError),
            0x11 => Some(Self::WakeReceived),
            0xFF => Some(Self::CommunicationError),
            _ => None,
        }
    }

    /// Raw status byte.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// A CRC-checked response packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    packet: Bytes,
}

impl Response {
    /// Parse and verify a received packet.
    ///
    /// Bytes past the count are ignored, so a caller may pass its whole
    /// receive buffer.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PacketTooShort` below four bytes
    /// - `ProtocolError::CountMismatch` if the count byte is below four or
    ///   beyond the buffer
    /// - `ProtocolError::CrcMismatch` if the trailing CRC is wrong
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < STATUS_RESPONSE_SIZE {
            return Err(ProtocolError::PacketTooShort {
                actual: buffer.len(),
                min: STATUS_RESPONSE_SIZE,
            });
        }

        let count = buffer[0];
        let len = usize::from(count);
        if len < STATUS_RESPONSE_SIZE || len > buffer.len() {
            return Err(ProtocolError::CountMismatch { count, available: buffer.len() });
        }

        let received = u16::from_le_bytes([buffer[len - 2], buffer[len - 1]]);
        let computed = crc16(&buffer[..len - 2]);
        if received != computed {
            return Err(ProtocolError::CrcMismatch { received, computed });
        }

        Ok(Self { packet: Bytes::copy_from_slice(&buffer[..len]) })
    }

    /// Frame `data` as a response packet.
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        let mut packet = Vec::with_capacity(data.len() + RESPONSE_OVERHEAD);
        packet.push((data.len() + RESPONSE_OVERHEAD) as u8);
        packet.extend_from_slice(data);
        let crc = crc16_bytes(&packet);
        packet.extend_from_slice(&crc);
        Self { packet: Bytes::from(packet) }
    }

    /// Frame a four-byte status response.
    #[must_use]
    pub fn from_status(status: DeviceStatus) -> Self {
        Self::from_data(&[status.to_u8()])
    }

    /// Payload between the count byte and the CRC.
    ///
    /// Byte 1 of the packet is byte 0 here.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.packet[1..self.packet.len() - 2]
    }

    /// Status byte, if this is a four-byte status packet.
    #[must_use]
    pub fn status(&self) -> Option<u8> {
        (self.packet.len() == STATUS_RESPONSE_SIZE).then(|| self.packet[1])
    }

    /// Whether the packet reports anything but success.
    ///
    /// Longer packets carry a result and count as success.
    #[must_use]
    pub fn is_error_status(&self) -> bool {
        self.status().is_some_and(|status| status != DeviceStatus::Success.to_u8())
    }

    /// The full packet as received.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.packet
    }
}
