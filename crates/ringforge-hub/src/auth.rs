//! Connect-parameter parsing and the three authentication modes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use ringforge_audit::{AuditAction, AuditEntry, AuditOutcome};
use ringforge_core::{AgentId, AgentRecord, HubError, HubResult};
use ringforge_directory::RegisterMeta;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::state::HubState;

/// The `agent` JSON blob on a registration connect.
#[derive(Debug, Clone, Default, Deserialize)]
struct AgentParams {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    framework: Option<String>,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    public_key: Option<String>,
    #[serde(default)]
    squad_id: Option<String>,
}

/// One of the three accepted connect shapes, chosen by field presence.
#[derive(Debug, Clone)]
pub enum ConnectRequest {
    /// `{api_key, agent:{...}}`
    Registration {
        /// The raw API key.
        api_key: String,
        /// Registration metadata.
        meta: RegisterMeta,
    },
    /// `{agent_id, api_key}`
    KeyReconnect {
        /// The raw API key.
        api_key: String,
        /// The returning agent.
        agent_id: AgentId,
    },
    /// `{agent_id, challenge_response}`
    ChallengeReconnect {
        /// The returning agent.
        agent_id: AgentId,
        /// Base64 Ed25519 signature over the challenge bytes.
        challenge_response: String,
    },
}

impl ConnectRequest {
    /// Classify query-string connect parameters. Any other shape, including
    /// a bare `agent_id`, is rejected.
    ///
    /// # Errors
    ///
    /// [`HubError::InvalidCredentials`] for unrecognized shapes (the client
    /// gets no more detail than a 401).
    pub fn from_params(params: &HashMap<String, String>) -> HubResult<Self> {
        let api_key = params.get("api_key");
        let agent_id = params.get("agent_id");
        let challenge_response = params.get("challenge_response");

        match (api_key, agent_id, challenge_response) {
            (Some(api_key), None, None) => {
                let agent: AgentParams = match params.get("agent") {
                    Some(raw) => serde_json::from_str(raw)
                        .map_err(|_| HubError::InvalidCredentials)?,
                    None => AgentParams::default(),
                };
                Ok(Self::Registration {
                    api_key: api_key.clone(),
                    meta: RegisterMeta {
                        name: agent.name,
                        framework: agent.framework,
                        capabilities: agent.capabilities.into_iter().collect::<BTreeSet<_>>(),
                        public_key: agent.public_key,
                        squad_id: agent.squad_id,
                    },
                })
            }
            (Some(api_key), Some(agent_id), None) => Ok(Self::KeyReconnect {
                api_key: api_key.clone(),
                agent_id: AgentId::parse(agent_id).map_err(|_| HubError::InvalidCredentials)?,
            }),
            (None, Some(agent_id), Some(challenge_response)) => Ok(Self::ChallengeReconnect {
                agent_id: AgentId::parse(agent_id).map_err(|_| HubError::InvalidCredentials)?,
                challenge_response: challenge_response.clone(),
            }),
            _ => Err(HubError::InvalidCredentials),
        }
    }

    /// The telemetry tag for this mode.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Registration { .. } => "registration",
            Self::KeyReconnect { .. } => "key_reconnect",
            Self::ChallengeReconnect { .. } => "challenge_reconnect",
        }
    }
}

/// Run the selected auth mode. Every outcome emits an auth telemetry event;
/// failures are additionally audited and reported to the client only as a
/// 401 close.
///
/// # Errors
///
/// The mode's tagged failure; the HTTP layer collapses them all to 401.
pub(crate) async fn authenticate(
    state: &Arc<HubState>,
    request: ConnectRequest,
) -> HubResult<(AgentRecord, &'static str)> {
    let method = request.method();
    let result = match &request {
        ConnectRequest::Registration { api_key, meta } => {
            let key = state.directory.validate_key(api_key).await?;
            state.directory.register_or_reconnect(&key, meta.clone()).await
        }
        ConnectRequest::KeyReconnect { api_key, agent_id } => {
            let key = state.directory.validate_key(api_key).await?;
            state.directory.reconnect_with_key(&key, agent_id).await
        }
        ConnectRequest::ChallengeReconnect {
            agent_id,
            challenge_response,
        } => {
            state
                .directory
                .reconnect_with_challenge(agent_id, challenge_response)
                .await
        }
    };

    match &result {
        Ok(agent) => {
            state.publish_auth_telemetry(agent.fleet_id.to_string(), method, true);
            let action = match &request {
                ConnectRequest::Registration { .. } if agent.total_connections == 1 => {
                    AuditAction::AgentRegistered
                }
                ConnectRequest::ChallengeReconnect { .. } => AuditAction::ChallengeVerified,
                _ => AuditAction::AgentReconnected,
            };
            state.audit.record(AuditEntry::new(
                Some(agent.fleet_id),
                Some(agent.agent_id.clone()),
                action,
                AuditOutcome::Success,
                json!({ "method": method }),
            ));
            debug!(agent_id = %agent.agent_id, method, "authenticated");
        }
        Err(e) => {
            state.publish_auth_telemetry("system".to_owned(), method, false);
            state.audit.record(AuditEntry::new(
                None,
                None,
                AuditAction::AuthFailed,
                AuditOutcome::Failure {
                    reason: e.reason().to_owned(),
                },
                json!({ "method": method }),
            ));
        }
    }

    result.map(|agent| (agent, method))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_registration_shape() {
        let p = params(&[
            ("api_key", "rf_live_x"),
            ("agent", r#"{"name":"a1","capabilities":["code"]}"#),
        ]);
        let request = ConnectRequest::from_params(&p).unwrap();
        match request {
            ConnectRequest::Registration { meta, .. } => {
                assert_eq!(meta.name.as_deref(), Some("a1"));
                assert!(meta.capabilities.contains("code"));
            }
            other => panic!("expected registration, got {other:?}"),
        }
    }

    #[test]
    fn test_registration_without_agent_blob() {
        let p = params(&[("api_key", "rf_live_x")]);
        assert!(matches!(
            ConnectRequest::from_params(&p).unwrap(),
            ConnectRequest::Registration { .. }
        ));
    }

    #[test]
    fn test_key_reconnect_shape() {
        let id = AgentId::generate();
        let p = params(&[("api_key", "rf_live_x"), ("agent_id", id.as_str())]);
        assert!(matches!(
            ConnectRequest::from_params(&p).unwrap(),
            ConnectRequest::KeyReconnect { .. }
        ));
    }

    #[test]
    fn test_challenge_reconnect_shape() {
        let id = AgentId::generate();
        let p = params(&[("agent_id", id.as_str()), ("challenge_response", "c2ln")]);
        assert!(matches!(
            ConnectRequest::from_params(&p).unwrap(),
            ConnectRequest::ChallengeReconnect { .. }
        ));
    }

    #[test]
    fn test_bare_agent_id_rejected() {
        let id = AgentId::generate();
        let p = params(&[("agent_id", id.as_str())]);
        assert!(ConnectRequest::from_params(&p).is_err());
    }

    #[test]
    fn test_empty_params_rejected() {
        assert!(ConnectRequest::from_params(&HashMap::new()).is_err());
    }

    #[test]
    fn test_all_three_fields_rejected() {
        let id = AgentId::generate();
        let p = params(&[
            ("api_key", "rf_live_x"),
            ("agent_id", id.as_str()),
            ("challenge_response", "c2ln"),
        ]);
        assert!(ConnectRequest::from_params(&p).is_err());
    }

    #[test]
    fn test_malformed_agent_blob_rejected() {
        let p = params(&[("api_key", "rf_live_x"), ("agent", "{not json")]);
        assert!(ConnectRequest::from_params(&p).is_err());
    }
}
