//! Overlay control-tool adapter
//!
//! Implements the core's `PeerAdmission` and `SelfAddress` ports by running
//! the overlay's `yggdrasilctl` executable.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use meshnode_core::transport::{parse_self_address, PeerAdmission, SelfAddress};
use meshnode_core::TransportError;
use tokio::process::Command;
use tracing::debug;

const CTL_BINARY_NAME: &str = "yggdrasilctl";

#[derive(Debug, Clone)]
pub struct CtlAdapter {
    ctl_path: PathBuf,
}

impl CtlAdapter {
    /// Adapter for the control tool installed next to `overlay_binary`
    pub fn for_overlay_binary(overlay_binary: &Path) -> Self {
        Self {
            ctl_path: ctl_path_for(overlay_binary),
        }
    }

    pub fn ctl_path(&self) -> &Path {
        &self.ctl_path
    }

    async fn run(&self, args: &[&str]) -> Result<String, TransportError> {
        debug!(ctl = %self.ctl_path.display(), ?args, "Running overlay control tool");

        let output = Command::new(&self.ctl_path).args(args).output().await?;
        if !output.status.success() {
            return Err(TransportError::Admission {
                target: args.join(" "),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl PeerAdmission for CtlAdapter {
    async fn add_peer(&self, peer: &str) -> Result<(), TransportError> {
        let uri = format!("uri={}", peer);
        self.run(&["addpeer", uri.as_str()]).await?;
        Ok(())
    }
}

#[async_trait]
impl SelfAddress for CtlAdapter {
    async fn self_address(&self) -> Result<String, TransportError> {
        let output = self.run(&["getself"]).await?;
        parse_self_address(&output).ok_or_else(|| TransportError::Admission {
            target: "getself".to_string(),
            reason: "no address in output".to_string(),
        })
    }
}

/// `yggdrasilctl` in the same directory as the daemon
fn ctl_path_for(overlay_binary: &Path) -> PathBuf {
    match overlay_binary.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(CTL_BINARY_NAME),
        _ => PathBuf::from(CTL_BINARY_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctl_sits_next_to_daemon() {
        assert_eq!(
            ctl_path_for(Path::new("/usr/local/bin/yggdrasil")),
            PathBuf::from("/usr/local/bin/yggdrasilctl")
        );
        assert_eq!(
            ctl_path_for(Path::new("yggdrasil")),
            PathBuf::from("yggdrasilctl")
        );
    }

    #[tokio::test]
    async fn test_missing_ctl_is_io_error() {
        let adapter = CtlAdapter::for_overlay_binary(Path::new("/nonexistent/dir/yggdrasil"));
        let result = adapter.add_peer("tcp://1.2.3.4:5").await;
        assert!(matches!(result, Err(TransportError::Io(_))));
    }
}
