//! DeriveKey and its input MAC.

use atsha_proto::{DeriveKeyMode, KEY_ID_MAX, KEY_SIZE, Opcode, msg_size};

use crate::{Result, SessionError, message::Message, temp_key::TempKey};

fn check_target(target_key_id: u16) -> Result<()> {
    if target_key_id > KEY_ID_MAX {
        return Err(SessionError::invalid("target key id is not a slot"));
    }
    Ok(())
}

fn derivation_header(
    capacity: usize,
    mode: DeriveKeyMode,
    target_key_id: u16,
    parent_key: &[u8; KEY_SIZE],
) -> Message {
    Message::with_capacity(capacity)
        .bytes(parent_key)
        .opcode(Opcode::DeriveKey)
        .byte(mode.bits())
        .u16_le(target_key_id)
        .fixed_serial()
}

/// Compute the key the device's DeriveKey command writes into the target
/// slot.
///
/// ```text
/// SHA-256(parent(32) ‖ 0x1C ‖ mode ‖ target(LE) ‖ 0xEE ‖ 0x01 0x23 ‖ 0(25) ‖ tempkey(32))
/// ```
///
/// For a roll, `parent_key` is the target slot's current value; for a
/// create, it is the parent slot's value. TempKey is consumed.
pub fn derive_key(
    temp_key: &mut TempKey,
    mode: DeriveKeyMode,
    target_key_id: u16,
    parent_key: &[u8; KEY_SIZE],
) -> Result<[u8; KEY_SIZE]> {
    check_target(target_key_id)?;

    temp_key.consume(|temp_key| {
        temp_key.ensure_usable()?;
        temp_key.ensure_source(mode.contains(DeriveKeyMode::SOURCE_FLAG_MATCH))?;

        Ok(derivation_header(msg_size::DERIVE_KEY, mode, target_key_id, parent_key)
            .zeros(25)
            .bytes(temp_key.value())
            .digest(msg_size::DERIVE_KEY))
    })
}

/// Compute the input MAC a DeriveKey command carries when the target slot
/// demands one. Stateless.
///
/// `SHA-256(parent(32) ‖ 0x1C ‖ mode ‖ target(LE) ‖ 0xEE ‖ 0x01 0x23)`
pub fn derive_key_mac(
    mode: DeriveKeyMode,
    target_key_id: u16,
    parent_key: &[u8; KEY_SIZE],
) -> Result<[u8; KEY_SIZE]> {
    check_target(target_key_id)?;
    Ok(derivation_header(msg_size::DERIVE_KEY_MAC, mode, target_key_id, parent_key)
        .digest(msg_size::DERIVE_KEY_MAC))
}

#[cfg(test)]
mod tests {
    use sha2::{Digest, Sha256};

    use super::*;
    use crate::{StateViolation, TempKeySource};

    #[test]
    fn derive_key_mac_hashes_39_bytes() {
        let mac = derive_key_mac(DeriveKeyMode::empty(), 3, &[0x11; 32]).unwrap();

        let mut message = vec![0x11; 32];
        message.extend_from_slice(&[0x1C, 0x00, 0x03, 0x00, 0xEE, 0x01, 0x23]);
        let expected: [u8; 32] = Sha256::digest(&message).into();
        assert_eq!(mac, expected);
    }

    #[test]
    fn target_above_slot_range_is_invalid() {
        let mut temp_key = TempKey::loaded([0; 32], TempKeySource::Random);

        assert!(matches!(
            derive_key(&mut temp_key, DeriveKeyMode::empty(), 16, &[0; 32]),
            Err(SessionError::InvalidParameter { .. })
        ));
        assert!(temp_key.is_valid());
        assert!(derive_key_mac(DeriveKeyMode::empty(), 16, &[0; 32]).is_err());
    }

    #[test]
    fn random_bit_must_match_source() {
        let mut temp_key = TempKey::loaded([0; 32], TempKeySource::Random);

        assert!(matches!(
            derive_key(&mut temp_key, DeriveKeyMode::SOURCE_FLAG_MATCH, 1, &[0; 32]),
            Err(SessionError::StateInvalid(StateViolation::SourceMismatch { .. }))
        ));
        assert!(!temp_key.is_valid());
    }

    #[test]
    fn derived_key_depends_on_temp_key() {
        let mut a = TempKey::loaded([0; 32], TempKeySource::Random);
        let mut b = TempKey::loaded([1; 32], TempKeySource::Random);

        let key_a = derive_key(&mut a, DeriveKeyMode::empty(), 1, &[0x22; 32]).unwrap();
        let key_b = derive_key(&mut b, DeriveKeyMode::empty(), 1, &[0x22; 32]).unwrap();
        assert_ne!(key_a, key_b);
    }
}
