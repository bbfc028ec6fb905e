//! Challenge token generation and decoding.

use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{CryptoError, CryptoResult};

/// Challenge length in raw bytes.
pub const CHALLENGE_BYTES: usize = 32;

/// Generate a fresh challenge token: base64 of 32 random bytes.
#[must_use]
pub fn generate_challenge_token() -> String {
    use base64::Engine;
    let mut bytes = [0u8; CHALLENGE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode a challenge token back to the raw bytes the agent signs.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidBase64Encoding`] on malformed input.
pub fn decode_challenge(token: &str) -> CryptoResult<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(token)
        .map_err(|_| CryptoError::InvalidBase64Encoding)
}
