//! Nonce: the only way to load a fresh TempKey.

use atsha_proto::{KEY_SIZE, NonceMode, Opcode, command::nonce_input_len, msg_size};

use crate::{
    Result, SessionError,
    message::Message,
    temp_key::{TempKey, TempKeySource},
};

/// Mirror the device's Nonce command into `temp_key`.
///
/// In the random modes `num_in` is the 20-byte host input and `rand_out` the
/// 32 bytes the device returned; the new value is
/// `SHA-256(rand_out ‖ num_in ‖ 0x16 ‖ mode ‖ 0x00)`. In pass-through mode
/// `num_in` is the 32-byte value itself and `rand_out` is ignored.
///
/// Clears every provenance flag and marks TempKey valid. Does not require a
/// valid TempKey beforehand.
pub fn nonce(
    temp_key: &mut TempKey,
    mode: NonceMode,
    num_in: &[u8],
    rand_out: Option<&[u8; KEY_SIZE]>,
) -> Result<()> {
    if num_in.len() != nonce_input_len(mode) {
        return Err(SessionError::invalid("num_in length does not match nonce mode"));
    }

    if !mode.is_random() {
        let mut value = [0u8; KEY_SIZE];
        value.copy_from_slice(num_in);
        temp_key.load(value, TempKeySource::Input);
        return Ok(());
    }

    let Some(rand_out) = rand_out else {
        return Err(SessionError::invalid("random nonce requires device rand_out"));
    };

    let value = Message::with_capacity(msg_size::NONCE)
        .bytes(rand_out)
        .bytes(num_in)
        .opcode(Opcode::Nonce)
        .byte(mode.to_u8())
        .byte(0x00)
        .digest(msg_size::NONCE);
    temp_key.load(value, TempKeySource::Random);
    Ok(())
}
