//! MAC and HMAC: digests proving knowledge of a slot key.

use atsha_proto::{KEY_SIZE, MacMode, Opcode, SERIAL_NUMBER_SIZE, msg_size};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{
    Result, SessionError,
    message::{Message, otp_and_serial},
    temp_key::TempKey,
};

/// Inputs of a MAC computation.
///
/// Buffers the mode does not select may be left `None`.
#[derive(Clone, Copy)]
pub struct MacRequest<'a> {
    /// Mode byte sent with the MAC command
    pub mode: MacMode,
    /// Slot whose key the device uses
    pub key_id: u16,
    /// Slot key, required unless block 1 comes from TempKey
    pub key: Option<&'a [u8; KEY_SIZE]>,
    /// Challenge, required unless block 2 comes from TempKey
    pub challenge: Option<&'a [u8; KEY_SIZE]>,
    /// OTP bytes, at least as many as the mode folds in
    pub otp: Option<&'a [u8]>,
    /// Device serial number, required with `INCLUDE_SN`
    pub sn: Option<&'a [u8; SERIAL_NUMBER_SIZE]>,
}

/// Inputs of an HMAC computation. Block 2 is always TempKey.
#[derive(Clone, Copy)]
pub struct HmacRequest<'a> {
    /// Mode byte sent with the HMAC command
    pub mode: MacMode,
    /// Slot whose key the device uses
    pub key_id: u16,
    /// Slot key
    pub key: &'a [u8; KEY_SIZE],
    /// OTP bytes, at least as many as the mode folds in
    pub otp: Option<&'a [u8]>,
    /// Device serial number, required with `INCLUDE_SN`
    pub sn: Option<&'a [u8; SERIAL_NUMBER_SIZE]>,
}

fn check_optional_fields(
    mode: MacMode,
    otp: Option<&[u8]>,
    sn: Option<&[u8; SERIAL_NUMBER_SIZE]>,
) -> Result<()> {
    let otp_len = mode.otp_len();
    if otp_len > 0 && otp.is_none_or(|otp| otp.len() < otp_len) {
        return Err(SessionError::invalid("mode includes OTP bytes that were not supplied"));
    }
    if mode.contains(MacMode::INCLUDE_SN) && sn.is_none() {
        return Err(SessionError::invalid("mode includes the serial number but none was supplied"));
    }
    Ok(())
}

/// Compute the 32-byte response of the device's MAC command.
///
/// ```text
/// block1(32) ‖ block2(32) ‖ 0x08 ‖ mode ‖ key_id(LE) ‖ otp(11) ‖ 0xEE ‖
/// sn[4..8] ‖ 0x01 0x23 ‖ sn[2..4]
/// ```
///
/// When the mode takes either block from TempKey, `temp_key` must be
/// supplied, usable, and loaded from the source the `SOURCE_FLAG_MATCH` bit
/// declares. It is consumed in that case, including when the state check
/// fails. A mode that does not use TempKey leaves it untouched.
pub fn mac(request: &MacRequest<'_>, temp_key: Option<&mut TempKey>) -> Result<[u8; KEY_SIZE]> {
    let mode = request.mode;
    if !mode.contains(MacMode::BLOCK1_TEMPKEY) && request.key.is_none() {
        return Err(SessionError::invalid("mode hashes the slot key but none was supplied"));
    }
    if !mode.contains(MacMode::BLOCK2_TEMPKEY) && request.challenge.is_none() {
        return Err(SessionError::invalid("mode hashes a challenge but none was supplied"));
    }
    check_optional_fields(mode, request.otp, request.sn)?;

    if !mode.uses_temp_key() {
        return Ok(mac_digest(request, None));
    }
    let Some(temp_key) = temp_key else {
        return Err(SessionError::invalid("mode hashes TempKey but none was supplied"));
    };

    temp_key.consume(|temp_key| {
        temp_key.ensure_usable()?;
        temp_key.ensure_source(mode.contains(MacMode::SOURCE_FLAG_MATCH))?;
        Ok(mac_digest(request, Some(temp_key.value())))
    })
}

fn mac_digest(request: &MacRequest<'_>, temp_key: Option<&[u8; KEY_SIZE]>) -> [u8; KEY_SIZE] {
    let mode = request.mode;
    let block = |from_temp_key: bool, input: Option<&[u8; KEY_SIZE]>| {
        let source = if from_temp_key { temp_key } else { input };
        source.copied().unwrap_or([0; KEY_SIZE])
    };
    let block1 = zeroize::Zeroizing::new(block(mode.contains(MacMode::BLOCK1_TEMPKEY), request.key));
    let block2 = block(mode.contains(MacMode::BLOCK2_TEMPKEY), request.challenge);

    let message = Message::with_capacity(msg_size::MAC)
        .bytes(block1.as_slice())
        .bytes(&block2)
        .opcode(Opcode::Mac)
        .byte(mode.bits())
        .u16_le(request.key_id);
    otp_and_serial(message, request.otp, mode.otp_len(), request.sn).digest(msg_size::MAC)
}

/// Compute the 32-byte response of the device's HMAC command.
///
/// HMAC-SHA256 keyed with the slot key over
///
/// ```text
/// 0(32) ‖ tempkey(32) ‖ 0x11 ‖ mode ‖ key_id(LE) ‖ otp(11) ‖ 0xEE ‖
/// sn[4..8] ‖ 0x01 0x23 ‖ sn[2..4]
/// ```
///
/// TempKey is always consumed once the request passes validation.
pub fn hmac(request: &HmacRequest<'_>, temp_key: &mut TempKey) -> Result<[u8; KEY_SIZE]> {
    let mode = request.mode;
    if !MacMode::HMAC_ALLOWED.contains(mode) {
        return Err(SessionError::invalid("mode bits not accepted by HMAC"));
    }
    check_optional_fields(mode, request.otp, request.sn)?;

    temp_key.consume(|temp_key| {
        temp_key.ensure_usable()?;
        temp_key.ensure_source(mode.contains(MacMode::SOURCE_FLAG_MATCH))?;

        let text = Message::with_capacity(msg_size::HMAC_INNER - 64)
            .zeros(KEY_SIZE)
            .bytes(temp_key.value())
            .opcode(Opcode::Hmac)
            .byte(mode.bits())
            .u16_le(request.key_id);
        let text = otp_and_serial(text, request.otp, mode.otp_len(), request.sn);

        let mut engine = Hmac::<Sha256>::new_from_slice(request.key)
            .map_err(|_| SessionError::invalid("hmac key"))?;
        text.feed(&mut engine, msg_size::HMAC_INNER - 64);
        Ok(engine.finalize().into_bytes().into())
    })
}
