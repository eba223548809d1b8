//! Raw parameter bytes to typed modes.
//!
//! The primitives take typed modes, so an undefined mode cannot reach them.
//! Callers holding raw Param1/Param2 values (a decoded command packet, a
//! configuration file) go through these checks first.

use atsha_proto::{CheckMacMode, DeriveKeyMode, KEY_ID_MAX, MacMode, NonceMode, Zone};

use crate::{Result, SessionError};

/// Nonce mode for a raw byte.
pub fn nonce_mode(raw: u8) -> Result<NonceMode> {
    NonceMode::from_u8(raw).ok_or(SessionError::invalid("undefined nonce mode"))
}

/// GenDig zone for a raw byte.
pub fn gen_dig_zone(raw: u8) -> Result<Zone> {
    Zone::from_u8(raw).ok_or(SessionError::invalid("undefined GenDig zone"))
}

/// MAC mode for a raw byte.
pub fn mac_mode(raw: u8) -> Result<MacMode> {
    MacMode::from_bits(raw).ok_or(SessionError::invalid("undefined MAC mode bits"))
}

/// HMAC mode for a raw byte. Block-select bits are not accepted.
pub fn hmac_mode(raw: u8) -> Result<MacMode> {
    MacMode::from_bits(raw)
        .filter(|mode| MacMode::HMAC_ALLOWED.contains(*mode))
        .ok_or(SessionError::invalid("undefined HMAC mode bits"))
}

/// CheckMac mode for a raw byte.
pub fn check_mac_mode(raw: u8) -> Result<CheckMacMode> {
    CheckMacMode::from_bits(raw).ok_or(SessionError::invalid("undefined CheckMac mode bits"))
}

/// DeriveKey Param1 for a raw byte.
pub fn derive_key_mode(raw: u8) -> Result<DeriveKeyMode> {
    DeriveKeyMode::from_bits(raw).ok_or(SessionError::invalid("undefined DeriveKey mode bits"))
}

/// Slot id, 0 through 15.
pub fn slot_id(raw: u16) -> Result<u16> {
    if raw > KEY_ID_MAX {
        return Err(SessionError::invalid("slot id out of range"));
    }
    Ok(raw)
}
