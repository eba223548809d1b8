//! CheckMac: the host proves knowledge of a key to the device.

use atsha_proto::{CheckMacMode, KEY_SIZE, OTHER_DATA_SIZE, OTP_64_SIZE, SN_0, SN_1, SN_8, msg_size};

use crate::{Result, SessionError, message::Message, temp_key::TempKey};

/// Inputs of a CheckMac client response.
#[derive(Clone, Copy)]
pub struct CheckMacRequest<'a> {
    /// Mode byte sent with the CheckMac command
    pub mode: CheckMacMode,
    /// Secret the device compares against, used as block 1 unless TempKey is
    pub key: &'a [u8; KEY_SIZE],
    /// Client challenge, required unless block 2 comes from TempKey
    pub client_challenge: Option<&'a [u8; KEY_SIZE]>,
    /// OtherData field sent with the command
    pub other_data: &'a [u8; OTHER_DATA_SIZE],
    /// OTP[0..8], required with `INCLUDE_OTP_64`
    pub otp: Option<&'a [u8]>,
}

/// Compute the client response the device's CheckMac command verifies.
///
/// ```text
/// block1(32) ‖ block2(32) ‖ od[0..4] ‖ otp_or_zeros(8) ‖ od[4..7] ‖ 0xEE ‖
/// od[7..11] ‖ 0x01 0x23 ‖ od[11..13]
/// ```
///
/// TempKey handling matches [`mac`](crate::mac): required, checked and
/// consumed exactly when the mode takes a block from it.
pub fn check_mac_response(
    request: &CheckMacRequest<'_>,
    temp_key: Option<&mut TempKey>,
) -> Result<[u8; KEY_SIZE]> {
    let mode = request.mode;
    if !mode.contains(CheckMacMode::BLOCK2_TEMPKEY) && request.client_challenge.is_none() {
        return Err(SessionError::invalid("mode hashes a client challenge but none was supplied"));
    }
    if mode.contains(CheckMacMode::INCLUDE_OTP_64)
        && request.otp.is_none_or(|otp| otp.len() < OTP_64_SIZE)
    {
        return Err(SessionError::invalid("mode includes OTP bytes that were not supplied"));
    }

    if !mode.uses_temp_key() {
        return Ok(response_digest(request, None));
    }
    let Some(temp_key) = temp_key else {
        return Err(SessionError::invalid("mode hashes TempKey but none was supplied"));
    };

    temp_key.consume(|temp_key| {
        temp_key.ensure_usable()?;
        temp_key.ensure_source(mode.contains(CheckMacMode::SOURCE_FLAG_MATCH))?;
        Ok(response_digest(request, Some(temp_key.value())))
    })
}

fn response_digest(request: &CheckMacRequest<'_>, temp_key: Option<&[u8; KEY_SIZE]>) -> [u8; KEY_SIZE] {
    let mode = request.mode;
    let zero = [0u8; KEY_SIZE];
    let block1 = match temp_key {
        Some(value) if mode.contains(CheckMacMode::BLOCK1_TEMPKEY) => value,
        _ => request.key,
    };
    let block2 = match temp_key {
        Some(value) if mode.contains(CheckMacMode::BLOCK2_TEMPKEY) => value,
        _ => request.client_challenge.unwrap_or(&zero),
    };
    let otp = request.otp.filter(|_| mode.contains(CheckMacMode::INCLUDE_OTP_64));
    let od = request.other_data;

    Message::with_capacity(msg_size::CHECK_MAC)
        .bytes(block1)
        .bytes(block2)
        .bytes(&od[0..4])
        .bytes_or_zeros(otp, OTP_64_SIZE)
        .bytes(&od[4..7])
        .byte(SN_8)
        .bytes(&od[7..11])
        .byte(SN_0)
        .byte(SN_1)
        .bytes(&od[11..13])
        .digest(msg_size::CHECK_MAC)
}
