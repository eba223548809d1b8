//! SHA-204 Host Session
//!
//! Drives a SHA-204 authentication element through the command sequences
//! that let a host trust it: challenge-response authentication, CheckMac
//! proofs, key rolls, and confidential slot reads and writes. Every digest
//! the device produces is recomputed on the host with [`atsha_crypto`].
//!
//! # Architecture
//!
//! ```text
//!  protocol runs (Authentication, ConfidentialRead, ...)
//!         │ device commands            │ host mirror
//!         ▼                            ▼
//!  Device<E: CommandExecutor>     atsha_crypto::TempKey
//!         │
//!         ▼
//!  Marshaler<L: Link>  ── packets (count ‖ opcode ‖ params ‖ data ‖ crc) ──> bus
//! ```
//!
//! The bus itself (I2C, single-wire, a simulator) stays outside: implement
//! [`Link`] for raw bytes, or [`CommandExecutor`] to take over framing too.
//!
//! # Components
//!
//! - [`Device`]: one method per device command, payloads as arrays
//! - [`protocol`]: the multi-step runs, each a single-use state machine
//! - [`SessionConfig`]: NumIn values per run kind
//! - [`Error`]: invalid parameter, state invalid, transport, verification

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod device;
pub mod error;
pub mod protocol;
pub mod transport;

pub use config::{DEFAULT_NUM_IN, SessionConfig};
pub use device::Device;
pub use error::{Error, Result, TransportError};
pub use protocol::{
    AuthMethod, AuthState, Authentication, CheckMacProof, CheckMacState, ConfidentialRead,
    ConfidentialWrite, KeyRoll, KeyRollState, ReadState, WriteState,
};
pub use transport::{CommandExecutor, Link, Marshaler};
