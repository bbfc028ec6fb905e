//! Crypto error types.

use thiserror::Error;

/// Errors from cryptographic operations.
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// Key material has the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },

    /// Signature material has the wrong length.
    #[error("invalid signature length: expected {expected} bytes, got {actual}")]
    InvalidSignatureLength {
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },

    /// Input was not valid base64.
    #[error("invalid base64 encoding")]
    InvalidBase64Encoding,

    /// Input was not valid hex.
    #[error("invalid hex encoding")]
    InvalidHexEncoding,

    /// Signature did not verify against the key and message.
    #[error("signature verification failed")]
    SignatureVerificationFailed,
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
