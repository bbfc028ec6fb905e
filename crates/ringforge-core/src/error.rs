//! The shared error taxonomy crossing component boundaries.
//!
//! Every client-visible failure is expressed as a tagged reason from a closed
//! set; the socket layer serializes it as `{error, reason, message?}`. No
//! component surfaces panics or untyped errors across its boundary.

use thiserror::Error;

/// Errors produced by hub components.
#[derive(Debug, Clone, Error)]
pub enum HubError {
    // Authentication
    /// Opaque credential failure. Covers unknown, revoked and expired API
    /// keys without distinguishing them to the caller.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No challenge is pending for the agent.
    #[error("no pending challenge")]
    NoPendingChallenge,

    /// The pending challenge exceeded its TTL.
    #[error("challenge expired")]
    ChallengeExpired,

    /// The supplied token does not match the pending challenge.
    #[error("challenge mismatch")]
    ChallengeMismatch,

    /// Signature decoding or verification failed.
    #[error("invalid signature")]
    InvalidSignature,

    /// The agent has no Ed25519 public key bound.
    #[error("no public key bound for agent")]
    NoPublicKey,

    // Authorization
    /// The key and the agent belong to different tenants.
    #[error("cross-tenant access denied")]
    CrossTenant,

    /// The caller is not allowed to perform the operation.
    #[error("forbidden")]
    Forbidden,

    // Lookup
    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    // Validation
    /// Invalid task status transition.
    #[error("invalid task status transition: {0}")]
    InvalidStatus(String),

    /// Presence state outside the allowed enum.
    #[error("invalid presence state: {0}")]
    InvalidState(String),

    /// Activity kind outside the closed set.
    #[error("invalid activity kind: {0}")]
    InvalidKind(String),

    /// Supplied public key does not decode to 32 bytes.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Malformed action payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    // Capacity
    /// No connected agent satisfies the task's capability requirements.
    #[error("no capable agent")]
    NoCapableAgent,

    /// The caller exceeded its action rate.
    #[error("rate limited")]
    RateLimited,

    /// The event bus refused the publish due to backlog.
    #[error("bus backpressure")]
    Backpressure,

    // Availability
    /// A downstream collaborator is unavailable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A deadline elapsed while waiting on a downstream call.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The downstream bus or store connection is gone.
    #[error("not connected")]
    NotConnected,

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// The wire reason tag for this error, from the closed reason set.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid",
            Self::NoPendingChallenge => "no_pending_challenge",
            Self::ChallengeExpired => "challenge_expired",
            Self::ChallengeMismatch => "challenge_mismatch",
            Self::InvalidSignature => "invalid_signature",
            Self::NoPublicKey => "no_public_key",
            Self::CrossTenant => "cross_tenant",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidStatus(_) => "invalid_status",
            Self::InvalidState(_) => "invalid_state",
            Self::InvalidKind(_) => "invalid_kind",
            Self::InvalidPublicKey => "invalid_public_key",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::NoCapableAgent => "no_capable_agent",
            Self::RateLimited => "rate_limited",
            Self::Backpressure => "backpressure",
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::NotConnected => "not_connected",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether this error should close the socket instead of being replied
    /// inline. Authentication failures give the client no hint.
    #[must_use]
    pub fn closes_connection(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::NoPendingChallenge
                | Self::ChallengeExpired
                | Self::ChallengeMismatch
                | Self::InvalidSignature
                | Self::NoPublicKey
                | Self::CrossTenant
        )
    }
}

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;
