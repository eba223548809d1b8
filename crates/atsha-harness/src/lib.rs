//! Deterministic simulation harness for SHA-204 host testing.
//!
//! A software device and byte-level links that let the host stack run end
//! to end without hardware:
//!
//! ```text
//!  Device<Marshaler<FaultyLink<SimLink>>>
//!                        │         │
//!                        │         └─ parses packets, checks CRC, drives SimDevice
//!                        └─ drops or corrupts responses on a schedule
//! ```
//!
//! [`SimDevice`] computes every digest with its own code rather than
//! `atsha-crypto`, so a passing scenario means two independent
//! implementations agree. Device randomness comes from a seeded ChaCha RNG
//! and every run is reproducible from its seed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod digest;
pub mod faulty_link;
pub mod sim_device;
pub mod sim_link;

pub use faulty_link::{Fault, FaultyLink};
pub use sim_device::{CONFIG_SIZE, DEFAULT_SERIAL, SimDevice, SlotPolicy};
pub use sim_link::SimLink;
