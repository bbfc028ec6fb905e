//! The schema-layer interface and its in-memory reference implementation.
//!
//! The relational tables (tenants, fleets, api_keys, agents) live in an
//! external collaborator; the hub reaches them only through this trait.
//! Implementations must make `try_insert_agent` atomic on `(fleet_id, name)`
//! so concurrent first-connections for one name converge to a single row.

use async_trait::async_trait;
use dashmap::DashMap;
use ringforge_core::{AgentId, AgentRecord, ApiKeyRecord, FleetId, FleetRecord, HubError, HubResult};

/// Interface to the relational schema layer.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Find an API key row by its hex hash.
    ///
    /// # Errors
    ///
    /// Returns a [`HubError`] on storage failure.
    async fn find_api_key(&self, key_hash: &str) -> HubResult<Option<ApiKeyRecord>>;

    /// Insert an API key row.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] when the hash is already present
    /// (hashes are unique).
    async fn insert_api_key(&self, record: ApiKeyRecord) -> HubResult<()>;

    /// Fetch a fleet row.
    ///
    /// # Errors
    ///
    /// Returns a [`HubError`] on storage failure.
    async fn get_fleet(&self, fleet_id: &FleetId) -> HubResult<Option<FleetRecord>>;

    /// Insert a fleet row.
    ///
    /// # Errors
    ///
    /// Returns a [`HubError`] on storage failure.
    async fn insert_fleet(&self, record: FleetRecord) -> HubResult<()>;

    /// Fetch an agent row.
    ///
    /// # Errors
    ///
    /// Returns a [`HubError`] on storage failure.
    async fn get_agent(&self, agent_id: &AgentId) -> HubResult<Option<AgentRecord>>;

    /// Find a named agent within a fleet.
    ///
    /// # Errors
    ///
    /// Returns a [`HubError`] on storage failure.
    async fn find_agent_by_name(
        &self,
        fleet_id: &FleetId,
        name: &str,
    ) -> HubResult<Option<AgentRecord>>;

    /// Insert an agent row. For named agents the insert is atomic on
    /// `(fleet_id, name)`: returns `false` without writing when another row
    /// already claimed the name (the caller re-reads and takes the reconnect
    /// path). Unnamed agents always insert.
    ///
    /// # Errors
    ///
    /// Returns a [`HubError`] on storage failure.
    async fn try_insert_agent(&self, record: AgentRecord) -> HubResult<bool>;

    /// Rewrite an agent row.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the row does not exist.
    async fn update_agent(&self, record: AgentRecord) -> HubResult<()>;
}

/// In-memory reference implementation.
#[derive(Default)]
pub struct MemoryDirectoryStore {
    api_keys: DashMap<String, ApiKeyRecord>,
    fleets: DashMap<FleetId, FleetRecord>,
    agents: DashMap<AgentId, AgentRecord>,
    /// `(fleet_id, name)` → agent, the uniqueness index.
    names: DashMap<(FleetId, String), AgentId>,
}

impl MemoryDirectoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    async fn find_api_key(&self, key_hash: &str) -> HubResult<Option<ApiKeyRecord>> {
        Ok(self.api_keys.get(key_hash).map(|r| r.clone()))
    }

    async fn insert_api_key(&self, record: ApiKeyRecord) -> HubResult<()> {
        match self.api_keys.entry(record.key_hash.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(HubError::Internal(
                "api key hash already present".to_owned(),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get_fleet(&self, fleet_id: &FleetId) -> HubResult<Option<FleetRecord>> {
        Ok(self.fleets.get(fleet_id).map(|r| r.clone()))
    }

    async fn insert_fleet(&self, record: FleetRecord) -> HubResult<()> {
        self.fleets.insert(record.fleet_id, record);
        Ok(())
    }

    async fn get_agent(&self, agent_id: &AgentId) -> HubResult<Option<AgentRecord>> {
        Ok(self.agents.get(agent_id).map(|r| r.clone()))
    }

    async fn find_agent_by_name(
        &self,
        fleet_id: &FleetId,
        name: &str,
    ) -> HubResult<Option<AgentRecord>> {
        let Some(agent_id) = self
            .names
            .get(&(*fleet_id, name.to_owned()))
            .map(|r| r.clone())
        else {
            return Ok(None);
        };
        self.get_agent(&agent_id).await
    }

    async fn try_insert_agent(&self, record: AgentRecord) -> HubResult<bool> {
        if let Some(name) = record.display_name().map(ToOwned::to_owned) {
            // Claim the name index first; losing the race means no write.
            match self.names.entry((record.fleet_id, name)) {
                dashmap::mapref::entry::Entry::Occupied(_) => return Ok(false),
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(record.agent_id.clone());
                }
            }
        }
        self.agents.insert(record.agent_id.clone(), record);
        Ok(true)
    }

    async fn update_agent(&self, record: AgentRecord) -> HubResult<()> {
        match self.agents.get_mut(&record.agent_id) {
            Some(mut row) => {
                *row = record;
                Ok(())
            }
            None => Err(HubError::NotFound(format!("agent {}", record.agent_id))),
        }
    }
}
