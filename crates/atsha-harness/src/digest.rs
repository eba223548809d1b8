//! Digests the device computes internally.
//!
//! Written without `atsha-crypto`, streaming fields straight into the
//! hasher, so end-to-end runs cross-check the host primitives.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

pub(crate) type Block = [u8; 32];

const SN_8: u8 = 0xEE;
const SN_0_1: [u8; 2] = [0x01, 0x23];

fn sha256(fields: &[&[u8]]) -> Block {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field);
    }
    hasher.finalize().into()
}

/// `opcode ‖ mode ‖ key_id ‖ otp(11) ‖ SN8 ‖ sn[4..8] ‖ SN0_1 ‖ sn[2..4]`
fn mac_tail(opcode: u8, mode: u8, key_id: u16, otp: &[u8], sn: Option<&[u8; 9]>) -> Vec<u8> {
    let mut otp_field = [0u8; 11];
    otp_field[..otp.len()].copy_from_slice(otp);
    let sn = sn.copied().unwrap_or_default();

    let mut tail = Vec::with_capacity(24);
    tail.extend_from_slice(&[opcode, mode]);
    tail.extend_from_slice(&key_id.to_le_bytes());
    tail.extend_from_slice(&otp_field);
    tail.push(SN_8);
    tail.extend_from_slice(&sn[4..8]);
    tail.extend_from_slice(&SN_0_1);
    tail.extend_from_slice(&sn[2..4]);
    tail
}

pub(crate) fn nonce(rand_out: &Block, num_in: &[u8], mode: u8) -> Block {
    sha256(&[rand_out, num_in, &[0x16, mode, 0x00]])
}

pub(crate) fn gen_dig(stored: &Block, zone: u8, key_id: u16, temp_key: &Block) -> Block {
    let header = [0x15, zone, key_id.to_le_bytes()[0], key_id.to_le_bytes()[1], SN_8];
    sha256(&[stored, &header, &SN_0_1, &[0u8; 25], temp_key])
}

pub(crate) fn mac(
    block1: &Block,
    block2: &Block,
    mode: u8,
    key_id: u16,
    otp: &[u8],
    sn: Option<&[u8; 9]>,
) -> Block {
    sha256(&[block1, block2, &mac_tail(0x08, mode, key_id, otp, sn)])
}

pub(crate) fn hmac(
    key: &Block,
    temp_key: &Block,
    mode: u8,
    key_id: u16,
    otp: &[u8],
    sn: Option<&[u8; 9]>,
) -> Block {
    let Ok(mut engine) = Hmac::<Sha256>::new_from_slice(key) else {
        unreachable!("HMAC accepts keys of any length");
    };
    engine.update(&[0u8; 32]);
    engine.update(temp_key);
    engine.update(&mac_tail(0x11, mode, key_id, otp, sn));
    engine.finalize().into_bytes().into()
}

pub(crate) fn check_mac(block1: &Block, block2: &Block, other: &[u8; 13], otp: &[u8; 8]) -> Block {
    sha256(&[
        block1,
        block2,
        &other[0..4],
        otp,
        &other[4..7],
        &[SN_8],
        &other[7..11],
        &SN_0_1,
        &other[11..13],
    ])
}

fn derive_header(mode: u8, target: u16) -> [u8; 7] {
    let [lo, hi] = target.to_le_bytes();
    [0x1C, mode, lo, hi, SN_8, SN_0_1[0], SN_0_1[1]]
}

pub(crate) fn derive_key(parent: &Block, mode: u8, target: u16, temp_key: &Block) -> Block {
    sha256(&[parent, &derive_header(mode, target), &[0u8; 25], temp_key])
}

pub(crate) fn derive_key_mac(parent: &Block, mode: u8, target: u16) -> Block {
    sha256(&[parent, &derive_header(mode, target)])
}

pub(crate) fn write_mac(temp_key: &Block, zone: u8, address: u16, plaintext: &Block) -> Block {
    let [lo, hi] = address.to_le_bytes();
    sha256(&[temp_key, &[0x12, zone, lo, hi, SN_8], &SN_0_1, &[0u8; 25], plaintext])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex32(s: &str) -> Block {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out).unwrap();
        out
    }

    fn scenario_a() -> Block {
        let num_in: [u8; 20] = std::array::from_fn(|i| i as u8);
        nonce(&[0xAA; 32], &num_in, 0x01)
    }

    #[test]
    fn nonce_matches_fixture() {
        assert_eq!(
            scenario_a(),
            hex32("7681262f72ac1bc822e16d41b3e82e4955e68e29f45f20ec5872df844e27a8fa")
        );
    }

    #[test]
    fn mac_and_check_mac_agree_on_fixture() {
        let expected = hex32("90fd19b4fc14b8a6bc9bee2a7244b43490635f968b9a30af52135b99cc12206b");
        let temp_key = scenario_a();

        assert_eq!(mac(&[0x55; 32], &temp_key, 0x01, 5, &[], None), expected);

        let other = [0x08, 0x01, 0x05, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(check_mac(&[0x55; 32], &temp_key, &other, &[0; 8]), expected);
    }

    #[test]
    fn hmac_matches_fixture() {
        assert_eq!(
            hmac(&[0x55; 32], &scenario_a(), 0x00, 5, &[], None),
            hex32("8472dfa92a4ec0b24844c84ecbcb9212b6ce04dd98c27fe1d9a50b383ade48b8")
        );
    }

    #[test]
    fn derive_key_matches_fixture() {
        assert_eq!(
            derive_key(&[0x55; 32], 0x00, 5, &scenario_a()),
            hex32("e8ea147876094e31354ff56060d3b374cb4f80c8314588fd50a3e916e85d042e")
        );
        assert_eq!(
            derive_key_mac(&[0x55; 32], 0x00, 5),
            hex32("7c2ac4d35a39d32665528ea0aa955d3c8c39f19fe52101e469866c07fb6bb215")
        );
    }

    #[test]
    fn gen_dig_and_write_mac_match_fixture() {
        let num_in: [u8; 20] = std::array::from_fn(|i| i as u8);
        let seeded = nonce(&[0xAA; 32], &num_in, 0x00);
        let session = gen_dig(&[0x55; 32], 0x02, 4, &seeded);
        assert_eq!(
            session,
            hex32("4e8b450d16cd34725ce967bd3f2b7a4192b879a8f13068daf245b4a5de61a468")
        );

        let plaintext: Block = std::array::from_fn(|i| 0x20 + i as u8);
        assert_eq!(
            write_mac(&session, 0x82, 0x0040, &plaintext),
            hex32("3b75cd7e52cc6673c3f14bec3f3f2ceab54f95681d45f493ff0219b08b0097f9")
        );
    }
}
