//! Narrow interfaces to the overlay's control plane
//!
//! The transport never shells out itself. Peer admission and self-address
//! lookup go through these traits; the process-exec adapter lives in the
//! CLI.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;

/// Registers a peer with the overlay
#[async_trait]
pub trait PeerAdmission: Send + Sync {
    async fn add_peer(&self, peer: &str) -> Result<(), TransportError>;
}

/// Asks the overlay for this node's own address
#[async_trait]
pub trait SelfAddress: Send + Sync {
    async fn self_address(&self) -> Result<String, TransportError>;
}

/// Both control-plane ports, as handed to a connected transport
#[derive(Clone)]
pub struct OverlayPorts {
    pub admission: Arc<dyn PeerAdmission>,
    pub self_address: Arc<dyn SelfAddress>,
}

impl OverlayPorts {
    /// Use one adapter for both ports
    pub fn new<T>(adapter: Arc<T>) -> Self
    where
        T: PeerAdmission + SelfAddress + 'static,
    {
        Self {
            admission: adapter.clone(),
            self_address: adapter,
        }
    }

    /// Ports that refuse every request
    pub fn unsupported() -> Self {
        Self::new(Arc::new(Unsupported))
    }
}

impl std::fmt::Debug for OverlayPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayPorts").finish_non_exhaustive()
    }
}

struct Unsupported;

#[async_trait]
impl PeerAdmission for Unsupported {
    async fn add_peer(&self, peer: &str) -> Result<(), TransportError> {
        Err(TransportError::Admission {
            target: peer.to_string(),
            reason: "no overlay control adapter configured".to_string(),
        })
    }
}

#[async_trait]
impl SelfAddress for Unsupported {
    async fn self_address(&self) -> Result<String, TransportError> {
        Err(TransportError::Admission {
            target: "getself".to_string(),
            reason: "no overlay control adapter configured".to_string(),
        })
    }
}

/// Pull this node's address out of the overlay control tool's `getself`
/// output.
///
/// JSON output (`-json`, or newer tool versions) is parsed as a document and
/// its `address` field read. Anything else is scanned line by line for the
/// text form (`IPv6 address: 200:...`) or the legacy `ip:` line.
pub fn parse_self_address(output: &str) -> Option<String> {
    let trimmed = output.trim();
    if trimmed.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
        return value
            .get("address")
            .and_then(|address| address.as_str())
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_string);
    }

    trimmed.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_ascii_lowercase();
        if !matches!(key.as_str(), "ip" | "ipv6 address") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_output() {
        let output = "\
Build name:     yggdrasil
Build version:  0.5.5
IPv6 address:   200:1234:5678::1
IPv6 subnet:    300:1234:5678::/64
Public key:     abcd
";
        assert_eq!(
            parse_self_address(output),
            Some("200:1234:5678::1".to_string())
        );
    }

    #[test]
    fn test_parse_json_output() {
        let output = r#"{
  "build_name": "yggdrasil",
  "address": "200:aaaa:bbbb::1",
  "subnet": "300:aaaa:bbbb::/64"
}"#;
        assert_eq!(
            parse_self_address(output),
            Some("200:aaaa:bbbb::1".to_string())
        );
    }

    #[test]
    fn test_parse_compact_json_output() {
        let output = r#"{"build_name":"yggdrasil","address":"200:aaaa:bbbb::1","subnet":"300::/64"}"#;
        assert_eq!(
            parse_self_address(output),
            Some("200:aaaa:bbbb::1".to_string())
        );
    }

    #[test]
    fn test_parse_json_without_address() {
        assert_eq!(parse_self_address(r#"{"subnet": "300::/64"}"#), None);
        assert_eq!(parse_self_address(r#"{"address": 7}"#), None);
        assert_eq!(parse_self_address("{not json"), None);
    }

    #[test]
    fn test_parse_legacy_ip_line() {
        assert_eq!(
            parse_self_address("ip: \"200:dead::2\""),
            Some("200:dead::2".to_string())
        );
    }

    #[test]
    fn test_parse_missing() {
        assert_eq!(parse_self_address("nothing useful here"), None);
        assert_eq!(parse_self_address(""), None);
    }

    #[tokio::test]
    async fn test_unsupported_ports_refuse() {
        let ports = OverlayPorts::unsupported();
        assert!(ports.admission.add_peer("tcp://1.2.3.4:1").await.is_err());
        assert!(ports.self_address.self_address().await.is_err());
    }
}
