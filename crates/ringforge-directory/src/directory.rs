//! The agent directory service.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use ringforge_core::{AgentId, AgentRecord, ApiKeyRecord, HubError, HubResult};
use ringforge_crypto::{decode_challenge, hash_api_key, PublicKey, Signature};
use tracing::{debug, warn};

use crate::challenge::ChallengeStore;
use crate::stores::DirectoryStore;

/// Bound on upsert retries under a registration race.
const REGISTER_RETRY_LIMIT: usize = 3;

/// Agent metadata supplied at registration.
#[derive(Debug, Clone, Default)]
pub struct RegisterMeta {
    /// Display name; non-empty names upsert on `(name, fleet)`.
    pub name: Option<String>,
    /// Framework tag.
    pub framework: Option<String>,
    /// Capability tags.
    pub capabilities: BTreeSet<String>,
    /// Base64 Ed25519 public key to bind.
    pub public_key: Option<String>,
    /// Squad grouping.
    pub squad_id: Option<String>,
}

/// Owns API key validation, agent upserts and Ed25519 key binding.
pub struct AgentDirectory {
    store: Arc<dyn DirectoryStore>,
    challenges: Arc<ChallengeStore>,
}

impl AgentDirectory {
    /// Create the service over a schema-layer store and the challenge table.
    #[must_use]
    pub fn new(store: Arc<dyn DirectoryStore>, challenges: Arc<ChallengeStore>) -> Self {
        Self { store, challenges }
    }

    /// The challenge table.
    #[must_use]
    pub fn challenges(&self) -> &Arc<ChallengeStore> {
        &self.challenges
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DirectoryStore> {
        &self.store
    }

    /// Validate a raw API key. Every failure collapses to the opaque
    /// `invalid` condition; callers never learn whether the key was unknown,
    /// revoked or expired.
    ///
    /// # Errors
    ///
    /// [`HubError::InvalidCredentials`] on any failure.
    pub async fn validate_key(&self, raw_key: &str) -> HubResult<ApiKeyRecord> {
        let key_hash = hash_api_key(raw_key);
        let record = self
            .store
            .find_api_key(&key_hash)
            .await
            .map_err(|_| HubError::InvalidCredentials)?
            .ok_or(HubError::InvalidCredentials)?;
        if record.is_valid(Utc::now()) {
            Ok(record)
        } else {
            Err(HubError::InvalidCredentials)
        }
    }

    /// Register an agent under a validated key, or reconnect when the name is
    /// already taken in the fleet. A race between two concurrent first
    /// connections for one name converges to one row; the loser retries the
    /// lookup and lands on the reconnect path.
    ///
    /// # Errors
    ///
    /// [`HubError::Forbidden`] for keys without a fleet scope,
    /// [`HubError::InvalidPublicKey`] when a supplied key is not 32 bytes.
    pub async fn register_or_reconnect(
        &self,
        key: &ApiKeyRecord,
        meta: RegisterMeta,
    ) -> HubResult<AgentRecord> {
        let fleet_id = key.fleet_id.ok_or(HubError::Forbidden)?;
        let public_key = Self::decode_public_key(meta.public_key.as_deref())?;

        let name = meta.name.clone().filter(|n| !n.is_empty());
        let Some(name) = name else {
            // Unnamed agents always insert.
            let mut record = AgentRecord::new(key.tenant_id, fleet_id);
            record.framework = meta.framework;
            record.capabilities = meta.capabilities;
            record.public_key = public_key;
            record.squad_id = meta.squad_id;
            self.store.try_insert_agent(record.clone()).await?;
            debug!(agent_id = %record.agent_id, "registered unnamed agent");
            return Ok(record);
        };

        for _ in 0..REGISTER_RETRY_LIMIT {
            if let Some(mut existing) = self.store.find_agent_by_name(&fleet_id, &name).await? {
                // Name collision upgrades to reconnect.
                existing.framework = meta.framework.clone().or(existing.framework);
                if !meta.capabilities.is_empty() {
                    existing.capabilities = meta.capabilities.clone();
                }
                if let Some(pk) = public_key {
                    self.bind_public_key(&mut existing, pk);
                }
                existing.total_connections = existing.total_connections.saturating_add(1);
                existing.last_seen_at = Utc::now();
                self.store.update_agent(existing.clone()).await?;
                debug!(agent_id = %existing.agent_id, name, "agent reconnected");
                return Ok(existing);
            }

            let mut record = AgentRecord::new(key.tenant_id, fleet_id);
            record.name = Some(name.clone());
            record.framework = meta.framework.clone();
            record.capabilities = meta.capabilities.clone();
            record.public_key = public_key;
            record.squad_id = meta.squad_id.clone();
            if self.store.try_insert_agent(record.clone()).await? {
                debug!(agent_id = %record.agent_id, name, "registered agent");
                return Ok(record);
            }
            // Lost the insert race; re-read and take the reconnect path.
        }
        Err(HubError::Internal("registration race did not converge".to_owned()))
    }

    /// Reconnect a known agent with a validated key.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] for unknown agents, [`HubError::CrossTenant`]
    /// when the key belongs to a different tenant.
    pub async fn reconnect_with_key(
        &self,
        key: &ApiKeyRecord,
        agent_id: &AgentId,
    ) -> HubResult<AgentRecord> {
        let mut agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("agent {agent_id}")))?;
        if agent.tenant_id != key.tenant_id {
            warn!(agent_id = %agent_id, "key reconnect across tenants refused");
            return Err(HubError::CrossTenant);
        }
        agent.last_seen_at = Utc::now();
        self.store.update_agent(agent.clone()).await?;
        Ok(agent)
    }

    /// Reconnect via challenge proof: verify the Ed25519 signature over the
    /// pending challenge bytes, consume the challenge, touch the agent.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`], [`HubError::NoPublicKey`],
    /// [`HubError::NoPendingChallenge`], [`HubError::ChallengeExpired`], or
    /// [`HubError::InvalidSignature`].
    pub async fn reconnect_with_challenge(
        &self,
        agent_id: &AgentId,
        signature_b64: &str,
    ) -> HubResult<AgentRecord> {
        let mut agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("agent {agent_id}")))?;
        let Some(pk_bytes) = agent.public_key else {
            return Err(HubError::NoPublicKey);
        };

        let token = self.challenges.pending(agent_id)?;
        let challenge_bytes =
            decode_challenge(&token).map_err(|_| HubError::InvalidSignature)?;
        let signature =
            Signature::from_base64(signature_b64).map_err(|_| HubError::InvalidSignature)?;
        PublicKey::from_bytes(pk_bytes)
            .verify(&challenge_bytes, &signature)
            .map_err(|_| HubError::InvalidSignature)?;

        self.challenges.revoke(agent_id);
        agent.last_seen_at = Utc::now();
        self.store.update_agent(agent.clone()).await?;
        Ok(agent)
    }

    /// Rotate an agent's bound public key. Any pending challenge is revoked
    /// in the same step so the prior key cannot complete it.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] for unknown agents,
    /// [`HubError::InvalidPublicKey`] for malformed keys.
    pub async fn rotate_public_key(
        &self,
        agent_id: &AgentId,
        public_key_b64: &str,
    ) -> HubResult<()> {
        let pk = Self::decode_public_key(Some(public_key_b64))?
            .ok_or(HubError::InvalidPublicKey)?;
        let mut agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("agent {agent_id}")))?;
        agent.public_key = Some(pk);
        self.store.update_agent(agent).await?;
        self.challenges.revoke(agent_id);
        Ok(())
    }

    /// Touch `last_seen_at`; socket termination calls this.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] for unknown agents.
    pub async fn touch(&self, agent_id: &AgentId) -> HubResult<()> {
        let mut agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("agent {agent_id}")))?;
        agent.last_seen_at = Utc::now();
        self.store.update_agent(agent).await
    }

    /// Bump `total_messages` and `last_seen_at`.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] for unknown agents.
    pub async fn note_message(&self, agent_id: &AgentId) -> HubResult<()> {
        let mut agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("agent {agent_id}")))?;
        agent.total_messages = agent.total_messages.saturating_add(1);
        agent.last_seen_at = Utc::now();
        self.store.update_agent(agent).await
    }

    fn bind_public_key(&self, agent: &mut AgentRecord, pk: [u8; 32]) {
        let rotated = agent.public_key.is_some_and(|old| old != pk);
        agent.public_key = Some(pk);
        if rotated {
            // Rotation invalidates any in-flight challenge for the old key.
            self.challenges.revoke(&agent.agent_id);
        }
    }

    fn decode_public_key(b64: Option<&str>) -> HubResult<Option<[u8; 32]>> {
        match b64 {
            None => Ok(None),
            Some(s) => PublicKey::from_base64(s)
                .map(|pk| Some(*pk.as_bytes()))
                .map_err(|_| HubError::InvalidPublicKey),
        }
    }
}
