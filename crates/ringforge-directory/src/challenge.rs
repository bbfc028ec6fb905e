//! The short-TTL challenge table.
//!
//! At most one pending challenge per agent; `issue` replaces. A lookup past
//! the TTL reports expired rather than found, and the sweeper evicts stale
//! entries so the table stays bounded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use ringforge_core::{AgentId, HubError, HubResult};
use ringforge_crypto::generate_challenge_token;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default challenge TTL.
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(30);

/// Default sweep interval.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct ChallengeEntry {
    token: String,
    issued_at: Instant,
}

/// Concurrent map of pending challenges. Concurrent `issue` calls for one
/// agent resolve last-write-wins.
pub struct ChallengeStore {
    entries: DashMap<AgentId, ChallengeEntry>,
    ttl: Duration,
}

impl ChallengeStore {
    /// Create a store with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CHALLENGE_TTL)
    }

    /// Create a store with a specific TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Issue a fresh challenge for an agent, replacing any prior entry.
    /// Returns the base64 token the agent must sign (after decoding).
    #[must_use]
    pub fn issue(&self, agent_id: &AgentId) -> String {
        let token = generate_challenge_token();
        self.entries.insert(
            agent_id.clone(),
            ChallengeEntry {
                token: token.clone(),
                issued_at: Instant::now(),
            },
        );
        token
    }

    /// Verify a presented token against the pending challenge, consuming it
    /// on success. A verify succeeds at most once per issue.
    ///
    /// # Errors
    ///
    /// [`HubError::NoPendingChallenge`] when nothing is pending,
    /// [`HubError::ChallengeExpired`] past the TTL (even on a token match),
    /// [`HubError::ChallengeMismatch`] otherwise.
    pub fn verify(&self, agent_id: &AgentId, token: &str) -> HubResult<()> {
        let Some(entry) = self.entries.get(agent_id) else {
            return Err(HubError::NoPendingChallenge);
        };
        if entry.issued_at.elapsed() >= self.ttl {
            drop(entry);
            self.entries.remove(agent_id);
            return Err(HubError::ChallengeExpired);
        }
        if entry.token != token {
            return Err(HubError::ChallengeMismatch);
        }
        drop(entry);
        self.entries.remove(agent_id);
        Ok(())
    }

    /// The pending token for an agent, when one is live.
    ///
    /// # Errors
    ///
    /// [`HubError::NoPendingChallenge`] when nothing is pending,
    /// [`HubError::ChallengeExpired`] past the TTL.
    pub fn pending(&self, agent_id: &AgentId) -> HubResult<String> {
        let Some(entry) = self.entries.get(agent_id) else {
            return Err(HubError::NoPendingChallenge);
        };
        if entry.issued_at.elapsed() >= self.ttl {
            drop(entry);
            self.entries.remove(agent_id);
            return Err(HubError::ChallengeExpired);
        }
        Ok(entry.token.clone())
    }

    /// The pending token without expiry handling; test and inspection hook.
    #[must_use]
    pub fn peek(&self, agent_id: &AgentId) -> Option<String> {
        self.entries.get(agent_id).map(|entry| entry.token.clone())
    }

    /// Drop any pending challenge for an agent. Key rotation calls this so a
    /// prior key cannot complete an in-flight challenge.
    pub fn revoke(&self, agent_id: &AgentId) {
        self.entries.remove(agent_id);
    }

    /// Evict expired entries; returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.issued_at.elapsed() < ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Run the sweep on an interval until the handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = store.sweep();
                if evicted > 0 {
                    debug!(evicted, "challenge sweep");
                }
            }
        })
    }
}

impl Default for ChallengeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> AgentId {
        AgentId::generate()
    }

    #[test]
    fn test_verify_consumes_once() {
        let store = ChallengeStore::new();
        let id = agent();
        let token = store.issue(&id);

        assert!(store.verify(&id, &token).is_ok());
        // Second verify of the same token finds nothing pending.
        assert!(matches!(
            store.verify(&id, &token),
            Err(HubError::NoPendingChallenge)
        ));
    }

    #[test]
    fn test_mismatch_does_not_consume() {
        let store = ChallengeStore::new();
        let id = agent();
        let token = store.issue(&id);

        assert!(matches!(
            store.verify(&id, "wrong"),
            Err(HubError::ChallengeMismatch)
        ));
        // The real token still verifies.
        assert!(store.verify(&id, &token).is_ok());
    }

    #[test]
    fn test_issue_replaces_prior() {
        let store = ChallengeStore::new();
        let id = agent();
        let first = store.issue(&id);
        let second = store.issue(&id);
        assert_ne!(first, second);

        assert!(matches!(
            store.verify(&id, &first),
            Err(HubError::ChallengeMismatch)
        ));
        assert!(store.verify(&id, &second).is_ok());
    }

    #[test]
    fn test_expired_never_verifies_even_on_match() {
        let store = ChallengeStore::with_ttl(Duration::from_millis(0));
        let id = agent();
        let token = store.issue(&id);
        assert!(matches!(
            store.verify(&id, &token),
            Err(HubError::ChallengeExpired)
        ));
        // The expired entry was dropped on lookup.
        assert!(store.peek(&id).is_none());
    }

    #[test]
    fn test_sweep_evicts_expired_only() {
        let store = ChallengeStore::with_ttl(Duration::from_secs(60));
        let live = agent();
        store.issue(&live);
        assert_eq!(store.sweep(), 0);
        assert!(store.peek(&live).is_some());

        let expiring = ChallengeStore::with_ttl(Duration::from_millis(0));
        let stale = agent();
        expiring.issue(&stale);
        assert_eq!(expiring.sweep(), 1);
        assert!(expiring.peek(&stale).is_none());
    }

    #[test]
    fn test_revoke_clears_pending() {
        let store = ChallengeStore::new();
        let id = agent();
        let token = store.issue(&id);
        store.revoke(&id);
        assert!(matches!(
            store.verify(&id, &token),
            Err(HubError::NoPendingChallenge)
        ));
    }

    #[test]
    fn test_pending_reports_expiry() {
        let store = ChallengeStore::with_ttl(Duration::from_millis(0));
        let id = agent();
        store.issue(&id);
        assert!(matches!(store.pending(&id), Err(HubError::ChallengeExpired)));
        assert!(matches!(
            store.pending(&id),
            Err(HubError::NoPendingChallenge)
        ));
    }
}
