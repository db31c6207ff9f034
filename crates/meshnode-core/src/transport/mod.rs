//! Dual-mode transport to the overlay mesh network
//!
//! ## Overview
//!
//! ```text
//! detect_service() ──► ServiceStatus ──► TransportClient::new()
//!                                         │
//!                     ┌───────────────────┴───────────────────┐
//!                     ▼                                       ▼
//!              Connected (socket I/O)                 Fallback (no I/O)
//!                     │                                       │
//!                     └──────────────► close() ◄──────────────┘
//! ```
//!
//! The mode is fixed at construction. There is no reconnect and no upgrade
//! from Fallback to Connected.
//!
//! Payloads are opaque bytes; encrypt them with [`crate::crypto`] before
//! calling `send`.

mod client;
mod connected;
mod discovery;
mod fallback;
mod ports;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use client::{BootstrapReport, TransportClient, TransportMode};
pub use connected::ConnectedTransport;
pub use discovery::{
    default_socket_candidates, detect_control_socket, find_in_path, find_overlay_binary,
    install_hint, detect_service, ServiceStatus, BINARY_CANDIDATES, OVERLAY_BINARY_NAME,
};
pub use fallback::FallbackTransport;
pub use ports::{parse_self_address, OverlayPorts, PeerAdmission, SelfAddress};

/// Well-known port peers listen on
pub const DEFAULT_DIAL_PORT: u16 = 9001;

/// Transport settings. `Default` fills the well-known values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Identity string the client is tagged with (hex public key)
    pub node_id: String,
    /// Overlay daemon executable, used to locate its control tool
    pub overlay_binary: PathBuf,
    /// Control socket locations, first existing wins
    pub socket_candidates: Vec<PathBuf>,
    pub dial_port: u16,
    pub dial_timeout: Duration,
    /// Read deadline per receive iteration; bounds cancellation latency
    pub poll_interval: Duration,
    /// Simulated dial latency in Fallback mode
    pub fallback_dial_delay: Duration,
    pub read_buffer_size: usize,
}

impl TransportConfig {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Self::default()
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            overlay_binary: PathBuf::from(BINARY_CANDIDATES[0]),
            socket_candidates: default_socket_candidates(),
            dial_port: DEFAULT_DIAL_PORT,
            dial_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            fallback_dial_delay: Duration::from_millis(100),
            read_buffer_size: 4096,
        }
    }
}
