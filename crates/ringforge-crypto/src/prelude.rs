//! Convenient re-exports.

pub use crate::apikey::{hash_api_key, hashes_equal, RawApiKey};
pub use crate::challenge::{decode_challenge, generate_challenge_token};
pub use crate::error::{CryptoError, CryptoResult};
pub use crate::keys::{KeyPair, PublicKey, Signature};
