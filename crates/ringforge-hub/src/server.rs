//! Server lifecycle: bind, serve, drain.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ringforge_config::HubConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::http;
use crate::state::HubState;

/// A running hub: the bound address plus handles to stop it.
pub struct Hub {
    state: Arc<HubState>,
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    serve_handle: JoinHandle<()>,
    background: Vec<JoinHandle<()>>,
}

impl Hub {
    /// Build the component graph, bind the listener and start serving.
    /// A `listen_addr` ending in `:0` binds an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an error when the address cannot be bound or the state graph
    /// fails to build.
    pub async fn start(config: HubConfig) -> anyhow::Result<Self> {
        let state = HubState::build(config)?;
        Self::start_with_state(state).await
    }

    /// Start serving over an already-built state graph.
    ///
    /// # Errors
    ///
    /// Returns an error when the address cannot be bound.
    pub async fn start_with_state(state: Arc<HubState>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&state.config.listen_addr).await?;
        let addr = listener.local_addr()?;
        let background = state.spawn_background();

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let app = http::app(Arc::clone(&state));
        let serve_handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.recv().await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(error = %e, "server terminated");
            }
        });

        info!(%addr, "hub listening");
        Ok(Self {
            state,
            addr,
            shutdown_tx,
            serve_handle,
            background,
        })
    }

    /// The bound address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The shared state, for in-process inspection and seeding.
    #[must_use]
    pub fn state(&self) -> &Arc<HubState> {
        &self.state
    }

    /// Drain and stop: refuse new connections, broadcast `presence:left`
    /// for every local session, give in-flight work the grace interval,
    /// then tear the workers down.
    pub async fn shutdown(self) {
        info!("hub draining");
        let _ = self.shutdown_tx.send(());

        // Departure diffs for every locally tracked session.
        for fleet_id in self.state.presence.fleets() {
            for session_id in self.state.presence.sessions(&fleet_id) {
                self.state.presence.untrack(fleet_id, session_id);
            }
        }

        tokio::time::sleep(Duration::from_millis(self.state.config.drain_grace_ms)).await;

        for handle in self.background {
            handle.abort();
        }
        self.serve_handle.abort();
        info!("hub stopped");
    }
}

/// Run the hub until ctrl-c, then drain.
///
/// # Errors
///
/// Returns an error when startup fails.
pub async fn run(config: HubConfig) -> anyhow::Result<()> {
    let hub = Hub::start(config).await?;
    tokio::signal::ctrl_c().await?;
    hub.shutdown().await;
    Ok(())
}
