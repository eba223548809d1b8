//! CRC-16 protecting command and response packets.
//!
//! Polynomial 0x8005 with a zero initial value. Each data byte is consumed
//! least-significant bit first and compared against the register's top bit.
//! The register is transmitted little-endian.

const POLYNOMIAL: u16 = 0x8005;

/// CRC of `data` continuing from `seed`.
///
/// A fresh computation uses `seed = 0`. Chaining is exact:
/// `crc16_chain(b, crc16_chain(a, 0)) == crc16_chain(a ‖ b, 0)`.
#[must_use]
pub fn crc16_chain(data: &[u8], seed: u16) -> u16 {
    let mut crc = seed;
    for byte in data {
        for shift in 0..8 {
            let data_bit = (byte >> shift) & 1;
            let crc_bit = (crc >> 15) as u8;
            crc <<= 1;
            if data_bit != crc_bit {
                crc ^= POLYNOMIAL;
            }
        }
    }
    crc
}

/// CRC of `data` from a zero seed.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    crc16_chain(data, 0)
}

/// CRC of `data` in wire order.
#[must_use]
pub fn crc16_bytes(data: &[u8]) -> [u8; 2] {
    crc16(data).to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_with_zero_seed_is_zero() {
        assert_eq!(crc16(&[]), 0x0000);
    }

    #[test]
    fn empty_input_returns_seed_unchanged() {
        assert_eq!(crc16_chain(&[], 0xBEEF), 0xBEEF);
    }

    #[test]
    fn devrev_command_matches_known_packet() {
        // DevRev on the wire: 07 30 00 00 00 03 5D
        assert_eq!(crc16_bytes(&[0x07, 0x30, 0x00, 0x00, 0x00]), [0x03, 0x5D]);
    }

    #[test]
    fn check_string_vector() {
        assert_eq!(crc16(b"123456789"), 0xBCDD);
    }

    #[test]
    fn chaining_equals_concatenation() {
        let head = b"authentication ";
        let tail = b"element";
        let whole: Vec<u8> = head.iter().chain(tail.iter()).copied().collect();

        assert_eq!(crc16_chain(tail, crc16(head)), crc16(&whole));
    }
}
