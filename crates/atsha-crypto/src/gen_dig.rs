//! GenDig: bind TempKey to a stored value.

use atsha_proto::{KEY_ID_MAX, KEY_SIZE, Opcode, Zone, msg_size};

use crate::{Result, message::Message, temp_key::TempKey};

/// Mirror the device's GenDig command.
///
/// `stored_value` is the 32 bytes the device reads from `zone` at `key_id`,
/// which the host must already know. The new TempKey value is
///
/// ```text
/// SHA-256(stored(32) ‖ 0x15 ‖ zone ‖ key_id(LE) ‖ 0xEE ‖ 0x01 0x23 ‖ 0(25) ‖ tempkey(32))
/// ```
///
/// TempKey stays valid and keeps its source flag. It is bound to `key_id`
/// only when `zone` is the data zone and `key_id` names a slot.
pub fn gen_dig(
    temp_key: &mut TempKey,
    zone: Zone,
    key_id: u16,
    stored_value: &[u8; KEY_SIZE],
) -> Result<()> {
    temp_key.ensure_usable()?;

    let value = Message::with_capacity(msg_size::GEN_DIG)
        .bytes(stored_value)
        .opcode(Opcode::GenDig)
        .byte(zone.to_u8())
        .u16_le(key_id)
        .fixed_serial()
        .zeros(25)
        .bytes(temp_key.value())
        .digest(msg_size::GEN_DIG);

    let data_slot = (zone == Zone::Data && key_id <= KEY_ID_MAX).then_some(key_id as u8);
    temp_key.refresh(value, data_slot);
    Ok(())
}
