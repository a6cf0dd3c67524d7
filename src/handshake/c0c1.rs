use crate::handshake::digest::{
    digest_offset, make_digest, verify_challenge, DIGEST_BASES, DIGEST_LENGTH, HANDSHAKE_SIZE,
};
use crate::utils::fill_random;
use crate::{Error, Result};

/// RTMP version
pub const RTMP_VERSION: u8 = 3;

/// Bytes 4..8 of every C1/S1 we generate
pub const CHALLENGE_VERSION: [u8; 4] = [0x09, 0x00, 0x7C, 0x02];

/// Version byte plus a 1536-byte digest-carrying challenge.
///
/// The client sends it as C0+C1, the server as S0+S1; the layout is the same.
#[derive(Debug, Clone)]
pub struct Challenge {
    /// RTMP version (C0/S0)
    pub version: u8,

    /// C1/S1
    pub packet: Vec<u8>,
}

impl Challenge {
    /// Build a fresh challenge signed with `partial_key`.
    ///
    /// Returns the challenge and the digest embedded in it.
    pub fn create(partial_key: &[u8]) -> Result<(Self, [u8; DIGEST_LENGTH])> {
        let mut packet = vec![0u8; HANDSHAKE_SIZE];
        packet[4..8].copy_from_slice(&CHALLENGE_VERSION);
        fill_random(&mut packet[8..]);

        let gap = digest_offset(&packet, DIGEST_BASES[0]);
        let digest = make_digest(partial_key, &packet, Some(gap))?;
        packet[gap..gap + DIGEST_LENGTH].copy_from_slice(&digest);

        Ok((
            Challenge {
                version: RTMP_VERSION,
                packet,
            },
            digest,
        ))
    }

    /// Parse C0+C1 / S0+S1 from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != 1 + HANDSHAKE_SIZE {
            return Err(Error::handshake(format!(
                "challenge is {} bytes, expected {}",
                data.len(),
                1 + HANDSHAKE_SIZE
            )));
        }

        let version = data[0];
        if version != RTMP_VERSION {
            return Err(Error::handshake(format!(
                "Unsupported RTMP version: {}, expected {}",
                version, RTMP_VERSION
            )));
        }

        Ok(Challenge {
            version,
            packet: data[1..].to_vec(),
        })
    }

    /// Check the embedded digest against the peer's partial key.
    ///
    /// Returns the peer digest and the key our reply must be signed with.
    pub fn verify(
        &self,
        peer_partial_key: &[u8],
        own_full_key: &[u8],
    ) -> Result<([u8; DIGEST_LENGTH], [u8; DIGEST_LENGTH])> {
        verify_challenge(&self.packet, peer_partial_key, own_full_key)
    }

    /// Encode to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(1 + HANDSHAKE_SIZE);
        result.push(self.version);
        result.extend_from_slice(&self.packet);
        result
    }
}
