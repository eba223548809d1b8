//! Protocol runs against a replaying executor.

use std::collections::VecDeque;

use atsha_core::{
    AuthMethod, AuthState, Authentication, CommandExecutor, Device, Error, KeyRoll, SessionConfig,
    TransportError,
};
use atsha_crypto::{MacRequest, TempKey, mac, nonce};
use atsha_proto::{Command, MacMode, NonceMode, Opcode, Response};
use proptest::prelude::*;

/// Answers commands from a fixed list and records them.
#[derive(Default)]
struct Replay {
    replies: VecDeque<Result<Response, TransportError>>,
    sent: Vec<Opcode>,
}

impl Replay {
    fn with(replies: impl IntoIterator<Item = Result<Vec<u8>, TransportError>>) -> Self {
        let replies = replies
            .into_iter()
            .map(|reply| reply.map(|data| Response::from_data(&data)))
            .collect();
        Self { replies, sent: Vec::new() }
    }
}

impl CommandExecutor for Replay {
    fn execute(&mut self, command: &Command) -> Result<Response, TransportError> {
        self.sent.push(command.opcode());
        self.replies.pop_front().unwrap_or_else(|| Err(TransportError::link("no reply")))
    }
}

fn host_mac(rand_out: &[u8; 32], key_id: u16, secret: &[u8; 32]) -> [u8; 32] {
    let mut temp_key = TempKey::new();
    let num_in = SessionConfig::default().auth_num_in;
    nonce(&mut temp_key, NonceMode::NoSeedUpdate, &num_in, Some(rand_out)).unwrap();
    let request = MacRequest {
        mode: MacMode::BLOCK2_TEMPKEY,
        key_id,
        key: Some(secret),
        challenge: None,
        otp: None,
        sn: None,
    };
    mac(&request, Some(&mut temp_key)).unwrap()
}

#[test]
fn scenario_a_authenticates_against_fixture_digest() {
    let mut digest = vec![0u8; 32];
    hex::decode_to_slice(
        "90fd19b4fc14b8a6bc9bee2a7244b43490635f968b9a30af52135b99cc12206b",
        &mut digest,
    )
    .unwrap();
    let mut device = Device::new(Replay::with([Ok(vec![0xAA; 32]), Ok(digest)]));
    let mut auth =
        Authentication::new(AuthMethod::Mac, 5, &[0x55; 32], &SessionConfig::default()).unwrap();

    auth.run(&mut device).unwrap();

    assert_eq!(auth.state(), AuthState::Verified);
}

#[test]
fn corrupt_response_packet_surfaces_as_transport_error() {
    let mut device = Device::new(Replay::with([Err(TransportError::Packet(
        atsha_proto::ProtocolError::CrcMismatch { received: 1, computed: 2 },
    ))]));
    let mut roll = KeyRoll::new(3, &[0; 32], &SessionConfig::default()).unwrap();

    let err = roll.run(&mut device).unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(device.executor().sent, [Opcode::Nonce]);
}

#[test]
fn authentication_accepts_exactly_the_host_digest() {
    proptest!(|(
        rand_out in any::<[u8; 32]>(),
        secret in any::<[u8; 32]>(),
        key_id in 0u16..16,
        flip in proptest::option::of((0usize..32, 0u8..8)),
    )| {
        // PROPERTY: a device digest verifies iff it equals the host digest
        let mut digest = host_mac(&rand_out, key_id, &secret);
        if let Some((byte, bit)) = flip {
            digest[byte] ^= 1 << bit;
        }
        let mut device = Device::new(Replay::with([Ok(rand_out.to_vec()), Ok(digest.to_vec())]));
        let mut auth =
            Authentication::new(AuthMethod::Mac, key_id, &secret, &SessionConfig::default())
                .unwrap();

        let result = auth.run(&mut device);

        if flip.is_some() {
            prop_assert_eq!(result, Err(Error::VerificationFailed { run: "authenticate" }));
            prop_assert_eq!(auth.state(), AuthState::Failed);
        } else {
            prop_assert!(result.is_ok());
        }
    });
}

#[test]
fn device_errors_stop_the_run_where_they_occur() {
    proptest!(|(status in 1u8..=0xFF, fail_first in any::<bool>())| {
        // PROPERTY: no command follows a device error
        let replies = if fail_first {
            vec![Ok(vec![status])]
        } else {
            vec![Ok(vec![0x11; 32]), Ok(vec![status])]
        };
        let mut device = Device::new(Replay::with(replies));
        let mut auth =
            Authentication::new(AuthMethod::Hmac, 1, &[0; 32], &SessionConfig::default()).unwrap();

        let result = auth.run(&mut device);

        prop_assert_eq!(result, Err(Error::Transport(TransportError::Device { status })));
        let (sent, aborted_in) =
            if fail_first { (1, AuthState::NonceSent) } else { (2, AuthState::ChallengeIssued) };
        prop_assert_eq!(device.executor().sent.len(), sent);
        prop_assert_eq!(auth.aborted_in(), Some(aborted_in));
    });
}

#[test]
fn config_survives_cbor() {
    proptest!(|(num_in in any::<[u8; 20]>(), distinct in any::<bool>())| {
        // PROPERTY: configuration encodes and decodes losslessly
        let config =
            SessionConfig { read_num_in: num_in, distinct_num_in: distinct, ..SessionConfig::default() };
        let mut encoded = Vec::new();
        ciborium::into_writer(&config, &mut encoded).unwrap();
        let decoded: SessionConfig = ciborium::from_reader(encoded.as_slice()).unwrap();
        prop_assert_eq!(decoded, config);
    });
}
