//! Fallback transport: the overlay is absent, nothing touches the network
//!
//! Every operation logs what it would have done and succeeds. No file,
//! socket or process is ever opened from here.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::client::BootstrapReport;
use super::TransportConfig;
use crate::error::TransportError;

#[derive(Debug)]
pub struct FallbackTransport {
    config: TransportConfig,
    closed: AtomicBool,
}

impl FallbackTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Pretend to dial after a short fixed delay
    pub async fn dial(&self, address: &str) -> Result<(), TransportError> {
        info!(%address, "[fallback] Dialing");
        tokio::time::sleep(self.config.fallback_dial_delay).await;
        Ok(())
    }

    pub async fn send(&self, address: &str, payload: &[u8]) -> Result<(), TransportError> {
        info!(%address, bytes = payload.len(), "[fallback] Sending");
        Ok(())
    }

    /// Block until cancelled. Nothing ever arrives.
    pub async fn receive<F>(
        &self,
        token: &CancellationToken,
        _handler: F,
    ) -> Result<(), TransportError>
    where
        F: FnMut(&[u8]) -> anyhow::Result<()> + Send,
    {
        info!("[fallback] Listening for incoming messages");
        token.cancelled().await;
        debug!("[fallback] Receive cancelled");
        Ok(())
    }

    pub async fn bootstrap(&self, peers: &[String]) -> Result<BootstrapReport, TransportError> {
        let mut report = BootstrapReport::default();
        for peer in peers.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            info!(%peer, "[fallback] Bootstrapping with peer");
            report.admitted.push(peer.to_string());
        }
        Ok(report)
    }

    /// Synthetic address built from the node id
    pub async fn local_address(&self) -> String {
        let node_id = self.config.node_id.as_str();
        let short = node_id.get(..8).unwrap_or(node_id);
        format!("200:dead:beef:{}::1", short)
    }

    pub async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("[fallback] Closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
