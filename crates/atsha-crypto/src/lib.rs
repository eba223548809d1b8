//! SHA-204 Session Primitives
//!
//! The device never reveals key material. To verify its answers, or to
//! exchange data with a protected slot, the host recomputes the device's
//! internal digests bit for bit from its own copy of the secrets. This crate
//! holds those computations and the host's mirror of the device's transient
//! TempKey register. All functions are pure: device randomness is passed in
//! by the caller and nothing here performs I/O.
//!
//! # TempKey Lifecycle
//!
//! ```text
//!              nonce (random or pass-through)
//!                        │
//!                        ▼
//!          ┌──── TempKey (valid, source flag) ◄────┐
//!          │             │                         │
//!          │             ▼                         │
//!          │   gen_dig(zone, key_id, stored) ──────┘ (produces)
//!          │
//!          ▼ (consumes, clears valid)
//!   mac │ hmac │ check_mac_response │ derive_key │ encrypt │ decrypt
//! ```
//!
//! Producers refresh the value and set `valid`. Consumers require `valid`
//! with the check flag clear, and clear `valid` when they return, so every
//! TempKey value is used at most once.
//!
//! # Security
//!
//! Precondition checks are the only thing standing between a sequencing bug
//! and a silently wrong digest:
//! - Source flag: modes that assume an unpredictable TempKey reject one
//!   loaded by pass-through, and vice versa
//! - Provenance: encrypt/decrypt require a TempKey produced by GenDig over
//!   the data zone from a random nonce
//! - Disposal: TempKey values and assembled messages are zeroized on drop

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod check_mac;
mod derive_key;
mod encrypt;
mod error;
mod gen_dig;
mod mac;
mod message;
mod nonce;
pub mod params;
mod temp_key;

pub use check_mac::{CheckMacRequest, check_mac_response};
pub use derive_key::{derive_key, derive_key_mac};
pub use encrypt::{decrypt, encrypt};
pub use error::{SessionError, StateViolation};
pub use gen_dig::gen_dig;
pub use mac::{HmacRequest, MacRequest, hmac, mac};
pub use nonce::nonce;
pub use temp_key::{TempKey, TempKeySource};

/// Result alias for session primitives.
pub type Result<T> = std::result::Result<T, SessionError>;
