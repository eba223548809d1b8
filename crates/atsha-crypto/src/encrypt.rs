//! Confidential zone data: XOR with a data-zone-bound TempKey.

use atsha_proto::{KEY_SIZE, Opcode, msg_size, zone::WRITE_ZONE_MASK};

use crate::{Result, SessionError, message::Message, temp_key::TempKey};

fn xor_in_place(data: &mut [u8; KEY_SIZE], key: &[u8; KEY_SIZE]) {
    for (byte, k) in data.iter_mut().zip(key) {
        *byte ^= k;
    }
}

/// Encrypt 32 bytes for an encrypted Write and optionally compute the
/// Write input MAC.
///
/// `zone` is the Write command's Param1 and `address` its Param2. The MAC,
/// computed over the plaintext before encryption, is
///
/// ```text
/// SHA-256(tempkey(32) ‖ 0x12 ‖ zone ‖ address(LE) ‖ 0xEE ‖ 0x01 0x23 ‖ 0(25) ‖ plaintext(32))
/// ```
///
/// TempKey must come from GenDig over the data zone after a random nonce.
/// Whether that GenDig used the slot's write key is not checked. TempKey is
/// consumed; `data` is only modified on success.
pub fn encrypt(
    temp_key: &mut TempKey,
    zone: u8,
    address: u16,
    data: &mut [u8; KEY_SIZE],
    with_mac: bool,
) -> Result<Option<[u8; KEY_SIZE]>> {
    if zone & !WRITE_ZONE_MASK != 0 {
        return Err(SessionError::invalid("zone has bits outside the write zone mask"));
    }

    temp_key.consume(|temp_key| {
        temp_key.ensure_usable()?;
        temp_key.ensure_data_zone_random()?;

        let mac = with_mac.then(|| {
            Message::with_capacity(msg_size::ENCRYPT_MAC)
                .bytes(temp_key.value())
                .opcode(Opcode::Write)
                .byte(zone)
                .u16_le(address)
                .fixed_serial()
                .zeros(25)
                .bytes(data.as_slice())
                .digest(msg_size::ENCRYPT_MAC)
        });
        xor_in_place(data, temp_key.value());
        Ok(mac)
    })
}

/// Decrypt 32 bytes returned by an encrypted Read.
///
/// Same TempKey requirements as [`encrypt`]. TempKey is consumed; `data` is
/// only modified on success.
pub fn decrypt(temp_key: &mut TempKey, data: &mut [u8; KEY_SIZE]) -> Result<()> {
    temp_key.consume(|temp_key| {
        temp_key.ensure_usable()?;
        temp_key.ensure_data_zone_random()?;
        xor_in_place(data, temp_key.value());
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StateViolation, TempKeySource};

    fn bound_temp_key() -> TempKey {
        TempKey::loaded([0x0F; 32], TempKeySource::Random).bound_to_data_slot(2)
    }

    #[test]
    fn encrypt_xors_with_temp_key() {
        let mut temp_key = bound_temp_key();
        let mut data = [0xF0; 32];

        let mac = encrypt(&mut temp_key, 0x82, 0x0040, &mut data, false).unwrap();

        assert_eq!(mac, None);
        assert_eq!(data, [0xFF; 32]);
        assert!(!temp_key.is_valid());
    }

    #[test]
    fn zone_outside_write_mask_is_invalid() {
        let mut temp_key = bound_temp_key();
        let mut data = [0; 32];

        assert!(matches!(
            encrypt(&mut temp_key, 0x04, 0, &mut data, true),
            Err(SessionError::InvalidParameter { .. })
        ));
        assert!(temp_key.is_valid());
    }

    #[test]
    fn plain_nonce_cannot_encrypt_or_decrypt() {
        let mut data = [0x5A; 32];

        let mut temp_key = TempKey::loaded([0x0F; 32], TempKeySource::Random);
        assert_eq!(
            encrypt(&mut temp_key, 0x82, 0, &mut data, true),
            Err(SessionError::StateInvalid(StateViolation::NotFromDataZone))
        );

        let mut temp_key = TempKey::loaded([0x0F; 32], TempKeySource::Random);
        assert_eq!(
            decrypt(&mut temp_key, &mut data),
            Err(SessionError::StateInvalid(StateViolation::NotFromDataZone))
        );
        assert_eq!(data, [0x5A; 32]);
    }

    #[test]
    fn pass_through_source_cannot_decrypt() {
        let mut temp_key = TempKey::loaded([0x0F; 32], TempKeySource::Input).bound_to_data_slot(2);
        let mut data = [0; 32];

        assert_eq!(
            decrypt(&mut temp_key, &mut data),
            Err(SessionError::StateInvalid(StateViolation::SourceNotRandom))
        );
    }

    #[test]
    fn mac_covers_plaintext_not_ciphertext() {
        let mut a = bound_temp_key();
        let mut b = bound_temp_key();
        let mut first = [0x01; 32];
        let mut second = [0x02; 32];

        let mac_a = encrypt(&mut a, 0x82, 0x10, &mut first, true).unwrap();
        let mac_b = encrypt(&mut b, 0x82, 0x10, &mut second, true).unwrap();
        assert_ne!(mac_a, mac_b);
    }
}
