//! Fixed digest vectors.
//!
//! Each expected value was computed independently with a stock SHA-256 over
//! the documented message layout. A mismatch means a field is out of place.

use atsha_crypto::{
    CheckMacRequest, HmacRequest, MacRequest, TempKey, TempKeySource, check_mac_response, decrypt,
    derive_key, derive_key_mac, encrypt, gen_dig, hmac, mac, nonce,
};
use atsha_proto::{CheckMacMode, DeriveKeyMode, MacMode, NonceMode, Zone};

const SECRET: [u8; 32] = [0x55; 32];
const DEVICE_RANDOM: [u8; 32] = [0xAA; 32];

fn num_in() -> [u8; 20] {
    std::array::from_fn(|i| i as u8)
}

fn hex32(s: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    hex::decode_to_slice(s, &mut out).unwrap();
    out
}

/// TempKey after `Nonce(no_seed_update, 0x00..0x13, 0xAA × 32)`.
fn scenario_a_temp_key() -> TempKey {
    let mut temp_key = TempKey::new();
    nonce(&mut temp_key, NonceMode::NoSeedUpdate, &num_in(), Some(&DEVICE_RANDOM)).unwrap();
    temp_key
}

#[test]
fn scenario_a_nonce() {
    let temp_key = scenario_a_temp_key();
    assert_eq!(
        temp_key.value(),
        &hex32("7681262f72ac1bc822e16d41b3e82e4955e68e29f45f20ec5872df844e27a8fa")
    );
}

#[test]
fn scenario_a_mac() {
    let mut temp_key = scenario_a_temp_key();
    let request = MacRequest {
        mode: MacMode::BLOCK2_TEMPKEY,
        key_id: 5,
        key: Some(&SECRET),
        challenge: None,
        otp: None,
        sn: None,
    };

    let response = mac(&request, Some(&mut temp_key)).unwrap();

    assert_eq!(
        response,
        hex32("90fd19b4fc14b8a6bc9bee2a7244b43490635f968b9a30af52135b99cc12206b")
    );
}

/// All-zero key and challenge, mode 0, key id 0: only the opcode and the
/// fixed serial bytes are non-zero.
#[test]
fn all_zero_mac() {
    let zero = [0u8; 32];
    let request = MacRequest {
        mode: MacMode::empty(),
        key_id: 0,
        key: Some(&zero),
        challenge: Some(&zero),
        otp: None,
        sn: None,
    };

    assert_eq!(
        mac(&request, None).unwrap(),
        hex32("8409c2a73181835116eee1ad5f594bec63b85ee6d78a3fee265e90ad15b7d00a")
    );
}

#[test]
fn scenario_a_hmac() {
    let mut temp_key = scenario_a_temp_key();
    let request = HmacRequest { mode: MacMode::empty(), key_id: 5, key: &SECRET, otp: None, sn: None };

    assert_eq!(
        hmac(&request, &mut temp_key).unwrap(),
        hex32("8472dfa92a4ec0b24844c84ecbcb9212b6ce04dd98c27fe1d9a50b383ade48b8")
    );
}

#[test]
fn gen_dig_then_encrypt() {
    let mut temp_key = TempKey::new();
    nonce(&mut temp_key, NonceMode::SeedUpdate, &num_in(), Some(&DEVICE_RANDOM)).unwrap();
    assert_eq!(
        temp_key.value(),
        &hex32("676e511a8b26b284acdb7ba6f2a4f78c247aaa0e42f1f70b12fc20e64d4cab27")
    );

    gen_dig(&mut temp_key, Zone::Data, 4, &SECRET).unwrap();
    let session = hex32("4e8b450d16cd34725ce967bd3f2b7a4192b879a8f13068daf245b4a5de61a468");
    assert_eq!(temp_key.value(), &session);
    assert_eq!(temp_key.bound_key_id(), Some(4));

    let plaintext: [u8; 32] = std::array::from_fn(|i| 0x20 + i as u8);
    let mut data = plaintext;
    let write_mac = encrypt(&mut temp_key, 0x82, 0x0040, &mut data, true).unwrap();

    assert_eq!(
        write_mac,
        Some(hex32("3b75cd7e52cc6673c3f14bec3f3f2ceab54f95681d45f493ff0219b08b0097f9"))
    );
    assert_eq!(data, hex32("6eaa672e32e8125574c04d961306546ea2894b9bc5055eedca7c8e9ee25c9a57"));

    // Encrypt consumed the TempKey; decrypting needs a fresh copy of the
    // same bound value.
    let mut mirror = TempKey::loaded(session, TempKeySource::Random).bound_to_data_slot(4);
    decrypt(&mut mirror, &mut data).unwrap();
    assert_eq!(data, plaintext);
}

#[test]
fn derive_key_roll() {
    let mut temp_key = scenario_a_temp_key();

    assert_eq!(
        derive_key(&mut temp_key, DeriveKeyMode::empty(), 5, &SECRET).unwrap(),
        hex32("e8ea147876094e31354ff56060d3b374cb4f80c8314588fd50a3e916e85d042e")
    );
    assert_eq!(
        derive_key_mac(DeriveKeyMode::empty(), 5, &SECRET).unwrap(),
        hex32("7c2ac4d35a39d32665528ea0aa955d3c8c39f19fe52101e469866c07fb6bb215")
    );
}

#[test]
fn check_mac_with_temp_key_challenge() {
    let mut temp_key = scenario_a_temp_key();
    let other_data = [0x08, 0x01, 0x05, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    let request = CheckMacRequest {
        mode: CheckMacMode::BLOCK2_TEMPKEY,
        key: &SECRET,
        client_challenge: None,
        other_data: &other_data,
        otp: None,
    };

    assert_eq!(
        check_mac_response(&request, Some(&mut temp_key)).unwrap(),
        hex32("90fd19b4fc14b8a6bc9bee2a7244b43490635f968b9a30af52135b99cc12206b")
    );
}
