//! RingForge Crypto - Key material for the RingForge coordination hub.
//!
//! This crate provides:
//! - API key generation and SHA-256 hashing with constant-time comparison
//! - Ed25519 public keys and signature verification for challenge auth
//! - Key pairs (signing side) for tests and operator tooling
//! - Random challenge token generation

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod apikey;
mod challenge;
mod error;
mod keys;

pub use apikey::{hash_api_key, hashes_equal, RawApiKey, API_KEY_PREFIX_LEN};
pub use challenge::{decode_challenge, generate_challenge_token, CHALLENGE_BYTES};
pub use error::{CryptoError, CryptoResult};
pub use keys::{KeyPair, PublicKey, Signature};
