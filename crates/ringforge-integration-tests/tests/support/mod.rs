//! Shared scenario-test plumbing: an in-process hub and a socket client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use ringforge_audit::{AuditStorage, MemoryAuditStorage};
use ringforge_config::HubConfig;
use ringforge_core::{ApiKeyKind, ApiKeyRecord, FleetId, FleetRecord, TenantId};
use ringforge_crypto::RawApiKey;
use ringforge_directory::{DirectoryStore, MemoryDirectoryStore};
use ringforge_hub::{Hub, HubState};
use ringforge_store::{DocumentStore, MemoryDocumentStore};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long a single expected frame may take to arrive.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(3);

/// A hub bound to an ephemeral port with seeded tenant, fleet and API key.
pub struct TestHub {
    pub hub: Hub,
    pub addr: SocketAddr,
    pub fleet_id: FleetId,
    pub tenant_id: TenantId,
    pub raw_key: String,
    pub directory_store: Arc<MemoryDirectoryStore>,
    pub document_store: Arc<MemoryDocumentStore>,
}

impl TestHub {
    pub async fn start(tune: impl FnOnce(&mut HubConfig)) -> Self {
        let mut config = HubConfig {
            listen_addr: "127.0.0.1:0".to_owned(),
            ..HubConfig::default()
        };
        tune(&mut config);

        let directory_store = Arc::new(MemoryDirectoryStore::new());
        let document_store = Arc::new(MemoryDocumentStore::new());
        let audit_storage = Arc::new(MemoryAuditStorage::new());

        let tenant_id = TenantId::new();
        let fleet_id = FleetId::new();
        directory_store
            .insert_fleet(FleetRecord {
                fleet_id,
                tenant_id,
                name: "test-fleet".to_owned(),
            })
            .await
            .expect("seed fleet");

        let raw = RawApiKey::generate("live");
        directory_store
            .insert_api_key(ApiKeyRecord {
                key_hash: raw.hash(),
                prefix: raw.prefix(),
                kind: ApiKeyKind::Live,
                tenant_id,
                fleet_id: Some(fleet_id),
                expires_at: None,
                revoked_at: None,
            })
            .await
            .expect("seed api key");

        let state = HubState::build_with(
            config,
            Arc::clone(&directory_store) as Arc<dyn DirectoryStore>,
            Arc::clone(&document_store) as Arc<dyn DocumentStore>,
            audit_storage as Arc<dyn AuditStorage>,
        )
        .expect("state graph");
        let hub = Hub::start_with_state(state).await.expect("hub start");
        let addr = hub.addr();

        Self {
            hub,
            addr,
            fleet_id,
            tenant_id,
            raw_key: raw.expose().to_owned(),
            directory_store,
            document_store,
        }
    }

    /// Open a socket with raw query parameters.
    pub async fn connect(&self, query: &str) -> Client {
        let url = format!("ws://{}/ws?{query}", self.addr);
        let (ws, _) = connect_async(url.as_str()).await.expect("ws connect");
        Client { ws }
    }

    /// Open a registration socket for a named agent.
    pub async fn register(&self, name: &str, capabilities: &[&str]) -> Client {
        self.register_with_key(name, capabilities, None).await
    }

    /// Open a registration socket binding an Ed25519 public key.
    pub async fn register_with_key(
        &self,
        name: &str,
        capabilities: &[&str],
        public_key_b64: Option<&str>,
    ) -> Client {
        let mut agent = serde_json::json!({
            "name": name,
            "framework": "x",
            "capabilities": capabilities,
        });
        if let Some(pk) = public_key_b64 {
            agent["public_key"] = Value::String(pk.to_owned());
        }
        let query = format!(
            "api_key={}&agent={}",
            urlencode(&self.raw_key),
            urlencode(&agent.to_string())
        );
        self.connect(&query).await
    }

    /// Reconnect a known agent with the seeded API key.
    pub async fn reconnect(&self, agent_id: &str) -> Client {
        let query = format!(
            "api_key={}&agent_id={}",
            urlencode(&self.raw_key),
            urlencode(agent_id)
        );
        self.connect(&query).await
    }

    /// Look up a named agent's ID in the seeded directory.
    pub async fn agent_id_of(&self, name: &str) -> String {
        self.directory_store
            .find_agent_by_name(&self.fleet_id, name)
            .await
            .expect("directory read")
            .expect("agent registered")
            .agent_id
            .to_string()
    }
}

/// One WebSocket client session.
pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    /// Send an action frame.
    pub async fn send(&mut self, frame: Value) {
        self.ws
            .send(Message::Text(frame.to_string()))
            .await
            .expect("ws send");
    }

    /// Next JSON frame, or `None` when nothing arrives inside the timeout.
    pub async fn try_next(&mut self) -> Option<Value> {
        loop {
            let message =
                match tokio::time::timeout(FRAME_TIMEOUT, self.ws.next()).await {
                    Ok(Some(Ok(message))) => message,
                    _ => return None,
                };
            match message {
                Message::Text(text) => {
                    return serde_json::from_str(&text).ok();
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
    }

    /// Skip frames until a push with the given event name arrives.
    pub async fn wait_event(&mut self, event: &str) -> Value {
        loop {
            let frame = self
                .try_next()
                .await
                .unwrap_or_else(|| panic!("timed out waiting for event {event}"));
            if frame["type"] == "event" && frame["event"] == event {
                return frame;
            }
        }
    }

    /// Skip frames until the reply (result or error) for an action arrives.
    pub async fn wait_reply(&mut self, action: &str) -> Value {
        loop {
            let frame = self
                .try_next()
                .await
                .unwrap_or_else(|| panic!("timed out waiting for reply to {action}"));
            if (frame["type"] == "result" || frame["type"] == "error")
                && frame["action"] == action
            {
                return frame;
            }
        }
    }

    /// Assert that no push with the given event name arrives within the
    /// window.
    pub async fn assert_no_event(&mut self, event: &str, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return;
            }
            match tokio::time::timeout(remaining, self.ws.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    if let Ok(frame) = serde_json::from_str::<Value>(&text) {
                        assert_ne!(
                            frame["event"], event,
                            "unexpected event {event}: {frame}"
                        );
                    }
                }
                Ok(Some(Ok(_))) => {}
                _ => return,
            }
        }
    }

    /// Close the socket and give the hub a beat to untrack.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Percent-encode a query-string value.
pub fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() * 3);
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte));
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
