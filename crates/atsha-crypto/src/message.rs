//! Fixed-layout digest input builder.
//!
//! Every primitive hashes a message whose field order and length must match
//! the device exactly. `Message` appends fields in order and checks the
//! final length against the expected size before hashing.

use atsha_proto::{KEY_SIZE, Opcode, SN_0, SN_1, SN_8};
use hmac::Mac;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Message under construction. Zeroized on drop since it carries keys.
pub(crate) struct Message {
    bytes: Zeroizing<Vec<u8>>,
}

impl Message {
    pub(crate) fn with_capacity(size: usize) -> Self {
        Self { bytes: Zeroizing::new(Vec::with_capacity(size)) }
    }

    pub(crate) fn bytes(mut self, field: &[u8]) -> Self {
        self.bytes.extend_from_slice(field);
        self
    }

    pub(crate) fn byte(mut self, field: u8) -> Self {
        self.bytes.push(field);
        self
    }

    pub(crate) fn opcode(self, opcode: Opcode) -> Self {
        self.byte(opcode.to_u8())
    }

    pub(crate) fn u16_le(self, field: u16) -> Self {
        self.bytes(&field.to_le_bytes())
    }

    pub(crate) fn zeros(mut self, count: usize) -> Self {
        let len = self.bytes.len();
        self.bytes.resize(len + count, 0);
        self
    }

    /// `SN[8]` then `SN[0..2]`, the serial bytes fixed for every device.
    pub(crate) fn fixed_serial(self) -> Self {
        self.byte(SN_8).byte(SN_0).byte(SN_1)
    }

    /// Either `field` or the same number of zero bytes.
    pub(crate) fn bytes_or_zeros(self, field: Option<&[u8]>, len: usize) -> Self {
        match field {
            Some(field) => self.bytes(&field[..len]),
            None => self.zeros(len),
        }
    }

    /// SHA-256 over the assembled message.
    ///
    /// `expected_len` is the documented message size; a mismatch is a layout
    /// bug in this crate and is caught by the debug assertion.
    pub(crate) fn digest(self, expected_len: usize) -> [u8; KEY_SIZE] {
        debug_assert_eq!(self.bytes.len(), expected_len, "digest message layout");
        Sha256::digest(self.bytes.as_slice()).into()
    }

    /// Feed the assembled message into a keyed MAC instead of hashing it.
    pub(crate) fn feed(self, mac: &mut impl Mac, expected_len: usize) {
        debug_assert_eq!(self.bytes.len(), expected_len, "digest message layout");
        mac.update(self.bytes.as_slice());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// OTP and serial-number tail shared by MAC and HMAC.
///
/// `otp(11) ‖ SN[8] ‖ SN[4..8] ‖ SN[0..2] ‖ SN[2..4]`, where OTP bytes not
/// selected by the mode and serial bytes not included are zero.
pub(crate) fn otp_and_serial(
    message: Message,
    otp: Option<&[u8]>,
    otp_len: usize,
    sn: Option<&[u8; atsha_proto::SERIAL_NUMBER_SIZE]>,
) -> Message {
    let message = match otp {
        Some(otp) if otp_len > 0 => message.bytes(&otp[..otp_len]),
        _ => message,
    };
    let message = message.zeros(atsha_proto::OTP_88_SIZE - otp_len).byte(SN_8);
    let message = message.bytes_or_zeros(sn.map(|sn| &sn[4..8]), 4).byte(SN_0).byte(SN_1);
    message.bytes_or_zeros(sn.map(|sn| &sn[2..4]), 2)
}
