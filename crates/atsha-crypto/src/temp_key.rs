//! Host mirror of the device's TempKey register.

use std::fmt;

use atsha_proto::KEY_SIZE;
use zeroize::Zeroize;

use crate::{Result, StateViolation};

/// How the current TempKey value was loaded.
///
/// Mirrors the device's SourceFlag bit: 0 for a random nonce, 1 for a
/// pass-through value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TempKeySource {
    /// Derived from a Nonce in a random mode
    Random,
    /// Loaded verbatim by a pass-through Nonce
    Input,
}

impl TempKeySource {
    /// Source that a mode's source-flag-match bit declares.
    #[must_use]
    pub fn from_match_bit(set: bool) -> Self {
        if set { Self::Input } else { Self::Random }
    }
}

/// The 32-byte session register plus its validity and provenance flags.
///
/// Each protocol run owns one `TempKey`; it is never shared between runs.
/// The value is zeroized on drop and redacted from `Debug` output.
#[derive(Clone)]
pub struct TempKey {
    value: [u8; KEY_SIZE],
    valid: bool,
    source: TempKeySource,
    generated_from_data_zone: bool,
    key_id: u8,
    check_flag: bool,
}

impl TempKey {
    /// Empty register: zero value, not valid.
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: [0; KEY_SIZE],
            valid: false,
            source: TempKeySource::Random,
            generated_from_data_zone: false,
            key_id: 0,
            check_flag: false,
        }
    }

    /// Valid register holding `value`, as a Nonce with `source` would
    /// leave it.
    ///
    /// Lets a caller re-create a known state, for instance to decrypt with
    /// the same value an earlier encrypt consumed.
    #[must_use]
    pub fn loaded(value: [u8; KEY_SIZE], source: TempKeySource) -> Self {
        let mut temp_key = Self::new();
        temp_key.load(value, source);
        temp_key
    }

    /// Mark the value as produced by GenDig over data slot `key_id`.
    ///
    /// Only the low four bits of `key_id` are kept.
    #[must_use]
    pub fn bound_to_data_slot(mut self, key_id: u8) -> Self {
        self.generated_from_data_zone = true;
        self.key_id = key_id & 0x0F;
        self
    }

    /// Current 32-byte value.
    #[must_use]
    pub fn value(&self) -> &[u8; KEY_SIZE] {
        &self.value
    }

    /// Whether the value is usable by a consuming primitive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// How the value was loaded.
    #[must_use]
    pub fn source(&self) -> TempKeySource {
        self.source
    }

    /// Whether the value descends from a random nonce.
    #[must_use]
    pub fn source_is_random(&self) -> bool {
        self.source == TempKeySource::Random
    }

    /// Whether the last producer was GenDig over the data zone.
    #[must_use]
    pub fn generated_from_data_zone(&self) -> bool {
        self.generated_from_data_zone
    }

    /// Slot bound by the last data-zone GenDig. `None` otherwise.
    #[must_use]
    pub fn bound_key_id(&self) -> Option<u8> {
        self.generated_from_data_zone.then_some(self.key_id)
    }

    /// Reserved gate; consumers refuse to run while it is set.
    #[must_use]
    pub fn check_flag(&self) -> bool {
        self.check_flag
    }

    /// Set or clear the check flag.
    pub fn set_check_flag(&mut self, set: bool) {
        self.check_flag = set;
    }

    /// Drop the value without running a primitive.
    pub fn invalidate(&mut self) {
        self.value.zeroize();
        self.valid = false;
        self.generated_from_data_zone = false;
        self.key_id = 0;
    }

    /// Nonce semantics: new value, all provenance reset.
    pub(crate) fn load(&mut self, value: [u8; KEY_SIZE], source: TempKeySource) {
        self.value = value;
        self.valid = true;
        self.source = source;
        self.generated_from_data_zone = false;
        self.key_id = 0;
        self.check_flag = false;
    }

    /// GenDig semantics: new value, source kept, data-zone binding updated.
    pub(crate) fn refresh(&mut self, value: [u8; KEY_SIZE], data_slot: Option<u8>) {
        self.value = value;
        self.valid = true;
        match data_slot {
            Some(key_id) => {
                self.generated_from_data_zone = true;
                self.key_id = key_id & 0x0F;
            },
            None => {
                self.generated_from_data_zone = false;
                self.key_id = 0;
            },
        }
    }

    /// Check flag clear and value valid.
    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if self.check_flag {
            return Err(StateViolation::CheckFlagSet.into());
        }
        if !self.valid {
            return Err(StateViolation::NotValid.into());
        }
        Ok(())
    }

    /// Source flag agrees with a mode's source-flag-match bit.
    pub(crate) fn ensure_source(&self, match_bit: bool) -> Result<()> {
        let expected = TempKeySource::from_match_bit(match_bit);
        if self.source != expected {
            return Err(StateViolation::SourceMismatch { expected, actual: self.source }.into());
        }
        Ok(())
    }

    /// Produced by GenDig over the data zone from a random nonce.
    pub(crate) fn ensure_data_zone_random(&self) -> Result<()> {
        if !self.generated_from_data_zone {
            return Err(StateViolation::NotFromDataZone.into());
        }
        if self.source != TempKeySource::Random {
            return Err(StateViolation::SourceNotRandom.into());
        }
        Ok(())
    }

    /// Run a consuming computation and clear `valid` however it ends.
    pub(crate) fn consume<T>(&mut self, compute: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let result = compute(self);
        self.valid = false;
        result
    }
}

impl Default for TempKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TempKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempKey")
            .field("value", &"<redacted>")
            .field("valid", &self.valid)
            .field("source", &self.source)
            .field("generated_from_data_zone", &self.generated_from_data_zone)
            .field("key_id", &self.key_id)
            .field("check_flag", &self.check_flag)
            .finish()
    }
}

// Implement Drop to zeroize key material
impl Drop for TempKey {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}
