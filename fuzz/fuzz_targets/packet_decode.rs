//! Fuzz target for response and command packet parsing
//!
//! Arbitrary bytes go through both parsers. Neither may panic; every
//! malformed packet must come back as a `ProtocolError`.
//!
//! # Invariants
//!
//! - A parsed response re-frames to the same packet
//! - A parsed command re-serializes to the same packet

#![no_main]

use atsha_proto::{Command, Response};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(response) = Response::parse(data) {
        let reframed = Response::from_data(response.data());
        assert_eq!(reframed.as_bytes(), response.as_bytes());
    }

    if let Ok(command) = Command::from_packet(data) {
        let len = usize::from(data[0]);
        if let Ok(packet) = command.to_packet() {
            assert_eq!(packet.as_slice(), &data[..len]);
        }
    }
});
