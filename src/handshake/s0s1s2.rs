use crate::handshake::c0c1::Challenge;
use crate::handshake::digest::{digest_matches, make_digest, DIGEST_LENGTH, HANDSHAKE_SIZE};
use crate::utils::fill_random;
use crate::{Error, Result};

/// Offset of the digest in C2/S2: the last 32 bytes
pub const RESPONSE_DIGEST_OFFSET: usize = HANDSHAKE_SIZE - DIGEST_LENGTH;

/// Random 1536-byte response (C2/S2) with a trailing digest.
///
/// The digest is keyed with the HMAC of the peer's challenge digest, so
/// only a party that saw that challenge can produce it.
#[derive(Debug, Clone)]
pub struct Response {
    pub packet: Vec<u8>,
}

impl Response {
    /// Build a response signed with `key`
    pub fn create(key: &[u8]) -> Result<Self> {
        let mut packet = vec![0u8; HANDSHAKE_SIZE];
        fill_random(&mut packet);

        let digest = make_digest(key, &packet, Some(RESPONSE_DIGEST_OFFSET))?;
        packet[RESPONSE_DIGEST_OFFSET..].copy_from_slice(&digest);
        Ok(Response { packet })
    }

    /// Parse C2/S2 from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != HANDSHAKE_SIZE {
            return Err(Error::handshake(format!(
                "response is {} bytes, expected {}",
                data.len(),
                HANDSHAKE_SIZE
            )));
        }
        Ok(Response {
            packet: data.to_vec(),
        })
    }

    /// Key a peer response is expected to carry, given the digest of the
    /// challenge we sent and the peer's full key
    pub fn expected_key(own_challenge_digest: &[u8], peer_full_key: &[u8]) -> Result<[u8; DIGEST_LENGTH]> {
        make_digest(peer_full_key, own_challenge_digest, None)
    }

    pub fn verify(&self, key: &[u8]) -> Result<()> {
        if digest_matches(key, &self.packet, RESPONSE_DIGEST_OFFSET)? {
            Ok(())
        } else {
            Err(Error::digest_mismatch("response digest does not match our challenge"))
        }
    }

    pub fn encode(&self) -> &[u8] {
        &self.packet
    }
}

/// Server reply: S0+S1 followed by S2
#[derive(Debug, Clone)]
pub struct S0S1S2 {
    pub s0s1: Challenge,
    pub s2: Response,
}

impl S0S1S2 {
    /// Answer a verified client challenge.
    ///
    /// `reply_key` is the key derived while verifying C1. Returns the reply and
    /// the digest embedded in S1, which the client's C2 is keyed on.
    pub fn generate(server_partial_key: &[u8], reply_key: &[u8]) -> Result<(Self, [u8; DIGEST_LENGTH])> {
        let (s0s1, s1_digest) = Challenge::create(server_partial_key)?;
        let s2 = Response::create(reply_key)?;
        Ok((S0S1S2 { s0s1, s2 }, s1_digest))
    }

    /// Encode to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut result = self.s0s1.encode();
        result.extend_from_slice(self.s2.encode());
        result
    }

    /// Parse S0+S1+S2 from bytes (for client side)
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != 1 + HANDSHAKE_SIZE * 2 {
            return Err(Error::handshake(format!(
                "S0+S1+S2 is {} bytes, expected {}",
                data.len(),
                1 + HANDSHAKE_SIZE * 2
            )));
        }
        let s0s1 = Challenge::parse(&data[..1 + HANDSHAKE_SIZE])?;
        let s2 = Response::parse(&data[1 + HANDSHAKE_SIZE..])?;
        Ok(S0S1S2 { s0s1, s2 })
    }
}
