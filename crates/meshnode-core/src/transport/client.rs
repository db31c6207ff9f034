//! The transport handle the rest of the node talks to

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::connected::ConnectedTransport;
use super::discovery::ServiceStatus;
use super::fallback::FallbackTransport;
use super::ports::OverlayPorts;
use super::TransportConfig;
use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Connected,
    Fallback,
}

/// Per-peer outcome of a bootstrap pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub admitted: Vec<String>,
    /// (peer, reason)
    pub failed: Vec<(String, String)>,
}

/// Overlay client, Connected or Fallback for its whole lifetime.
///
/// Created once at startup and closed once at shutdown. Share it with
/// `Arc<TransportClient>` between the receive task and senders.
#[derive(Debug)]
pub enum TransportClient {
    Connected(ConnectedTransport),
    Fallback(FallbackTransport),
}

impl TransportClient {
    /// Pick the mode from the detected service status.
    ///
    /// An unavailable service is logged once and yields a Fallback client.
    /// A detected service whose socket then refuses the connection is an
    /// error; the caller decides whether to fall back.
    pub async fn new(
        config: TransportConfig,
        status: &ServiceStatus,
        ports: OverlayPorts,
    ) -> Result<Self, TransportError> {
        match status {
            ServiceStatus::Available { socket, .. } => Ok(TransportClient::Connected(
                ConnectedTransport::connect(config, socket, ports).await?,
            )),
            ServiceStatus::Unavailable { reason } => {
                warn!(%reason, "Overlay unavailable, running in fallback mode");
                Ok(Self::fallback(config))
            }
        }
    }

    /// A client that never touches the network
    pub fn fallback(config: TransportConfig) -> Self {
        TransportClient::Fallback(FallbackTransport::new(config))
    }

    pub fn mode(&self) -> TransportMode {
        match self {
            TransportClient::Connected(_) => TransportMode::Connected,
            TransportClient::Fallback(_) => TransportMode::Fallback,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        match self {
            TransportClient::Connected(t) => t.config(),
            TransportClient::Fallback(t) => t.config(),
        }
    }

    /// Identity string this client is tagged with
    pub fn node_id(&self) -> &str {
        &self.config().node_id
    }

    pub async fn dial(&self, address: &str) -> Result<(), TransportError> {
        match self {
            TransportClient::Connected(t) => t.dial(address).await,
            TransportClient::Fallback(t) => t.dial(address).await,
        }
    }

    pub async fn send(&self, address: &str, payload: &[u8]) -> Result<(), TransportError> {
        match self {
            TransportClient::Connected(t) => t.send(address, payload).await,
            TransportClient::Fallback(t) => t.send(address, payload).await,
        }
    }

    /// Run the receive loop until `token` is cancelled.
    ///
    /// Returns `Ok(())` on cancellation, within one poll interval.
    pub async fn receive<F>(&self, token: &CancellationToken, handler: F) -> Result<(), TransportError>
    where
        F: FnMut(&[u8]) -> anyhow::Result<()> + Send,
    {
        match self {
            TransportClient::Connected(t) => t.receive(token, handler).await,
            TransportClient::Fallback(t) => t.receive(token, handler).await,
        }
    }

    /// Best-effort peer registration. Never fails as a whole because one
    /// peer did.
    pub async fn bootstrap(&self, peers: &[String]) -> Result<BootstrapReport, TransportError> {
        match self {
            TransportClient::Connected(t) => t.bootstrap(peers).await,
            TransportClient::Fallback(t) => t.bootstrap(peers).await,
        }
    }

    pub async fn local_address(&self) -> String {
        match self {
            TransportClient::Connected(t) => t.local_address().await,
            TransportClient::Fallback(t) => t.local_address().await,
        }
    }

    /// Idempotent
    pub async fn close(&self) -> Result<(), TransportError> {
        match self {
            TransportClient::Connected(t) => t.close().await,
            TransportClient::Fallback(t) => t.close().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            TransportClient::Connected(t) => t.is_closed(),
            TransportClient::Fallback(t) => t.is_closed(),
        }
    }
}
