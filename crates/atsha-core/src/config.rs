//! Nonce inputs per run kind.

use atsha_proto::NUM_IN_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The 20-byte NumIn sequence `0x00..=0x13`.
pub const DEFAULT_NUM_IN: [u8; NUM_IN_SIZE] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13,
];

/// Host inputs mixed into each run's device nonce.
///
/// The same NumIn across different run kinds is allowed by the device but
/// makes their nonces easier to correlate; set `distinct_num_in` to have
/// [`SessionConfig::validate`] refuse it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Challenge-response authentication (MAC or HMAC)
    pub auth_num_in: [u8; NUM_IN_SIZE],
    /// Confidential slot read
    pub read_num_in: [u8; NUM_IN_SIZE],
    /// Confidential slot write
    pub write_num_in: [u8; NUM_IN_SIZE],
    /// CheckMac proof
    pub check_mac_num_in: [u8; NUM_IN_SIZE],
    /// Key roll via DeriveKey
    pub derive_num_in: [u8; NUM_IN_SIZE],
    /// Reject configurations that share a NumIn between run kinds
    pub distinct_num_in: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_num_in: DEFAULT_NUM_IN,
            read_num_in: DEFAULT_NUM_IN,
            write_num_in: DEFAULT_NUM_IN,
            check_mac_num_in: DEFAULT_NUM_IN,
            derive_num_in: DEFAULT_NUM_IN,
            distinct_num_in: false,
        }
    }
}

impl SessionConfig {
    /// Check the configuration before use.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidParameter` if `distinct_num_in` is set and two run
    ///   kinds share a NumIn
    pub fn validate(&self) -> Result<()> {
        if !self.distinct_num_in {
            return Ok(());
        }

        let inputs = [
            &self.auth_num_in,
            &self.read_num_in,
            &self.write_num_in,
            &self.check_mac_num_in,
            &self.derive_num_in,
        ];
        for (i, a) in inputs.iter().enumerate() {
            if inputs[i + 1..].contains(a) {
                return Err(Error::InvalidParameter { reason: "num_in reused across run kinds" });
            }
        }
        Ok(())
    }
}
