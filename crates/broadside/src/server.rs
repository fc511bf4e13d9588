//! `BroadsideServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → engine. One
//! [`Coordinator`] is shared by every connection task.

use std::sync::Arc;
use std::time::Duration;

use broadside_engine::{Coordinator, EngineConfig, ScoreReporter, ShipCatalog};
use broadside_protocol::{Codec, JsonCodec};
use broadside_transport::{Transport, WebSocketTransport};
use tokio::task::JoinHandle;

use crate::handler::handle_connection;
use crate::{Authenticator, BroadsideError};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S: ShipCatalog, R: ScoreReporter, A: Authenticator, C: Codec> {
    pub(crate) coordinator: Arc<Coordinator<S, R>>,
    pub(crate) auth: A,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Broadside server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use broadside::prelude::*;
///
/// # async fn start() -> Result<(), BroadsideError> {
/// let server = BroadsideServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(FleetCatalog::standard(), Arc::new(Scoreboard::new()), TrustedTokenAuth)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct BroadsideServerBuilder {
    bind_addr: String,
    engine_config: EngineConfig,
}

impl BroadsideServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            engine_config: EngineConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the engine configuration (idle eviction).
    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build<S, R, A>(
        self,
        catalog: S,
        reporter: R,
        auth: A,
    ) -> Result<BroadsideServer<S, R, A, JsonCodec>, BroadsideError>
    where
        S: ShipCatalog,
        R: ScoreReporter,
        A: Authenticator,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            coordinator: Arc::new(Coordinator::with_config(
                catalog,
                reporter,
                self.engine_config,
            )),
            auth,
            codec: JsonCodec,
        });

        Ok(BroadsideServer { transport, state })
    }
}

impl Default for BroadsideServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Broadside game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct BroadsideServer<S: ShipCatalog, R: ScoreReporter, A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, R, A, C>>,
}

impl<S, R, A, C> BroadsideServer<S, R, A, C>
where
    S: ShipCatalog,
    R: ScoreReporter,
    A: Authenticator,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> BroadsideServerBuilder {
        BroadsideServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The engine behind this server. Useful for inspecting state from
    /// the embedding process.
    pub fn coordinator(&self) -> Arc<Coordinator<S, R>> {
        Arc::clone(&self.state.coordinator)
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task per connection and, when an idle timeout is
    /// configured, the idle-session reaper. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), BroadsideError> {
        tracing::info!("Broadside server running");

        let config = self.state.coordinator.config().clone();
        let _reaper = config.idle_timeout.map(|max_idle| {
            tracing::info!(?max_idle, interval = ?config.reap_interval, "idle reaper enabled");
            spawn_reaper(Arc::clone(&self.state.coordinator), config.reap_interval)
        });

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically evicts sessions idle beyond the coordinator's configured
/// timeout. The task runs until aborted.
pub fn spawn_reaper<S, R>(coordinator: Arc<Coordinator<S, R>>, every: Duration) -> JoinHandle<()>
where
    S: ShipCatalog,
    R: ScoreReporter,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = coordinator.reap_idle().await;
            if !evicted.is_empty() {
                tracing::info!(count = evicted.len(), "reaped idle sessions");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use broadside_engine::{FleetCatalog, Scoreboard};
    use broadside_protocol::{PlayerId, ShipPlacement};

    use super::*;

    #[tokio::test]
    async fn test_spawn_reaper_evicts_idle_sessions() {
        let config = EngineConfig {
            idle_timeout: Some(Duration::from_millis(20)),
            reap_interval: Duration::from_millis(10),
        };
        let coordinator = Arc::new(Coordinator::with_config(
            FleetCatalog::standard(),
            Arc::new(Scoreboard::new()),
            config,
        ));
        let joined = coordinator
            .join(PlayerId::new("alice"), vec![ShipPlacement::horizontal(1, 0)])
            .await
            .unwrap();

        let reaper = spawn_reaper(Arc::clone(&coordinator), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;
        reaper.abort();

        assert!(coordinator.status(&joined.session_id).await.is_none());
        assert_eq!(coordinator.diagnostics().await.open_slot, None);
    }

    #[tokio::test]
    async fn test_builder_defaults() {
        let builder = BroadsideServerBuilder::default();
        assert_eq!(builder.bind_addr, "127.0.0.1:8080");
        assert_eq!(builder.engine_config.idle_timeout, None);
    }
}
