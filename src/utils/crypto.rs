use crate::{Error, Result};
use hmac::{Hmac, KeyInit, Mac};
use rand::{Rng, rng};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Fill a buffer with cryptographically secure random bytes
pub fn fill_random(buf: &mut [u8]) {
    rng().fill_bytes(buf);
}

fn keyed_mac(key: &[u8]) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(key)
        .map_err(|e| Error::handshake(format!("Invalid HMAC key: {}", e)))
}

/// HMAC-SHA256 over the concatenation of `spans`.
pub fn hmac_sha256(key: &[u8], spans: &[&[u8]]) -> Result<[u8; 32]> {
    let mut mac = keyed_mac(key)?;
    for span in spans {
        mac.update(span);
    }

    let mut output = [0u8; 32];
    output.copy_from_slice(&mac.finalize().into_bytes());
    Ok(output)
}

/// Constant-time check that `expected` is the HMAC-SHA256 of `spans`.
pub fn hmac_sha256_matches(key: &[u8], spans: &[&[u8]], expected: &[u8]) -> Result<bool> {
    let mut mac = keyed_mac(key)?;
    for span in spans {
        mac.update(span);
    }
    Ok(mac.verify_slice(expected).is_ok())
}
