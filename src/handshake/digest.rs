//! HMAC-SHA256 digest primitives shared by both handshake roles.

use crate::utils::{hmac_sha256, hmac_sha256_matches};
use crate::{Error, Result};

/// Handshake packet size (C1/S1/C2/S2)
pub const HANDSHAKE_SIZE: usize = 1536;

pub const DIGEST_LENGTH: usize = 32;

/// Digest offsets are reduced modulo this before being rebased
const DIGEST_OFFSET_MODULUS: usize = 728;

/// Offset-search bases inside C1/S1, in the order they are tried
pub const DIGEST_BASES: [usize; 2] = [8, 772];

pub const CLIENT_FULL_KEY: [u8; 62] = [
    b'G', b'e', b'n', b'u', b'i', b'n', b'e', b' ', b'A', b'd', b'o', b'b', b'e', b' ',
    b'F', b'l', b'a', b's', b'h', b' ', b'P', b'l', b'a', b'y', b'e', b'r', b' ',
    b'0', b'0', b'1',
    0xF0, 0xEE, 0xC2, 0x4A, 0x80, 0x68, 0xBE, 0xE8, 0x2E, 0x00, 0xD0, 0xD1,
    0x02, 0x9E, 0x7E, 0x57, 0x6E, 0xEC, 0x5D, 0x2D, 0x29, 0x80, 0x6F, 0xAB,
    0x93, 0xB8, 0xE6, 0x36, 0xCF, 0xEB, 0x31, 0xAE,
];

pub const SERVER_FULL_KEY: [u8; 68] = [
    b'G', b'e', b'n', b'u', b'i', b'n', b'e', b' ', b'A', b'd', b'o', b'b', b'e', b' ',
    b'F', b'l', b'a', b's', b'h', b' ', b'M', b'e', b'd', b'i', b'a', b' ',
    b'S', b'e', b'r', b'v', b'e', b'r', b' ',
    b'0', b'0', b'1',
    0xF0, 0xEE, 0xC2, 0x4A, 0x80, 0x68, 0xBE, 0xE8, 0x2E, 0x00, 0xD0, 0xD1,
    0x02, 0x9E, 0x7E, 0x57, 0x6E, 0xEC, 0x5D, 0x2D, 0x29, 0x80, 0x6F, 0xAB,
    0x93, 0xB8, 0xE6, 0x36, 0xCF, 0xEB, 0x31, 0xAE,
];

/// The textual prefix of the client key, used for the first round
pub fn client_partial_key() -> &'static [u8] {
    &CLIENT_FULL_KEY[..30]
}

/// The textual prefix of the server key, used for the first round
pub fn server_partial_key() -> &'static [u8] {
    &SERVER_FULL_KEY[..36]
}

/// Where the digest sits for a given search base: the sum of the four bytes
/// at `base`, reduced and rebased past them.
pub fn digest_offset(packet: &[u8], base: usize) -> usize {
    let sum: usize = packet[base..base + 4].iter().map(|b| *b as usize).sum();
    (sum % DIGEST_OFFSET_MODULUS) + base + 4
}

/// Digest of `packet` with the 32-byte slot at `gap` left out.
/// Without a gap the whole packet is hashed.
pub fn make_digest(key: &[u8], packet: &[u8], gap: Option<usize>) -> Result<[u8; DIGEST_LENGTH]> {
    match gap {
        Some(gap) => {
            check_slot(packet, gap)?;
            hmac_sha256(key, &[&packet[..gap], &packet[gap + DIGEST_LENGTH..]])
        }
        None => hmac_sha256(key, &[packet]),
    }
}

/// Does the slot at `gap` hold the digest of the rest of `packet`?
pub fn digest_matches(key: &[u8], packet: &[u8], gap: usize) -> Result<bool> {
    check_slot(packet, gap)?;
    hmac_sha256_matches(
        key,
        &[&packet[..gap], &packet[gap + DIGEST_LENGTH..]],
        &packet[gap..gap + DIGEST_LENGTH],
    )
}

/// Locate a valid digest in a C1/S1 packet, trying each search base in turn
pub fn find_digest(packet: &[u8], key: &[u8]) -> Result<Option<usize>> {
    if packet.len() != HANDSHAKE_SIZE {
        return Err(Error::handshake(format!(
            "handshake packet is {} bytes, expected {}",
            packet.len(),
            HANDSHAKE_SIZE
        )));
    }
    for base in DIGEST_BASES {
        let gap = digest_offset(packet, base);
        if digest_matches(key, packet, gap)? {
            return Ok(Some(gap));
        }
    }
    Ok(None)
}

/// Verify the peer's C1/S1 and derive the key its C2/S2 reply must be signed with.
///
/// Returns the peer's embedded digest and the derived key.
pub fn verify_challenge(
    packet: &[u8],
    peer_partial_key: &[u8],
    own_full_key: &[u8],
) -> Result<([u8; DIGEST_LENGTH], [u8; DIGEST_LENGTH])> {
    let gap = find_digest(packet, peer_partial_key)?
        .ok_or_else(|| Error::digest_mismatch("no valid digest at either offset"))?;

    let mut peer_digest = [0u8; DIGEST_LENGTH];
    peer_digest.copy_from_slice(&packet[gap..gap + DIGEST_LENGTH]);
    let reply_key = make_digest(own_full_key, &peer_digest, None)?;
    Ok((peer_digest, reply_key))
}

fn check_slot(packet: &[u8], gap: usize) -> Result<()> {
    if gap + DIGEST_LENGTH > packet.len() {
        return Err(Error::handshake(format!(
            "digest slot at {} overruns {}-byte packet",
            gap,
            packet.len()
        )));
    }
    Ok(())
}
