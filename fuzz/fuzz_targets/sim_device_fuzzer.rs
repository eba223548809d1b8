//! Fuzz target for the simulated device's command decoding
//!
//! Feeds sequences of CRC-valid packets with arbitrary opcodes, parameters
//! and data to a `SimDevice`.
//!
//! # Invariants
//!
//! - The device never panics, whatever the command order
//! - Every command yields a well-formed, CRC-valid response packet
//! - HMAC and DeriveKey leave TempKey valid only when they fail to parse

#![no_main]

use arbitrary::Arbitrary;
use atsha_harness::SimDevice;
use atsha_proto::{Command, Response, crc16_bytes};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct RawCommand {
    opcode: u8,
    param1: u8,
    param2: u16,
    data: Vec<u8>,
}

impl RawCommand {
    fn packet(&self) -> Vec<u8> {
        let data = &self.data[..self.data.len().min(77)];
        let mut packet = vec![(data.len() + 7) as u8, self.opcode, self.param1];
        packet.extend_from_slice(&self.param2.to_le_bytes());
        packet.extend_from_slice(data);
        let crc = crc16_bytes(&packet);
        packet.extend_from_slice(&crc);
        packet
    }
}

#[derive(Debug, Arbitrary)]
struct Session {
    seed: u64,
    locked: bool,
    commands: Vec<RawCommand>,
}

fuzz_target!(|session: Session| {
    let mut device = SimDevice::new(session.seed);
    if session.locked {
        device = device.locked();
    }

    for raw in session.commands.iter().take(64) {
        let Ok(command) = Command::from_packet(&raw.packet()) else {
            continue;
        };
        let response = device.respond(&command);
        assert!(Response::parse(response.as_bytes()).is_ok());

        let refused = response.status().is_some_and(|status| status != 0x00);
        let hashes_temp_key = matches!(raw.opcode, 0x11 | 0x1C);
        if refused && hashes_temp_key && device.temp_key().is_some() {
            assert_eq!(response.status(), Some(0x03));
        }
    }
});
