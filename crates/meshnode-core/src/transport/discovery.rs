//! Detection of the overlay service on the local machine
//!
//! The overlay counts as available when its binary exists and one of the
//! candidate control sockets exists. The first existing socket wins.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the overlay daemon executable
pub const OVERLAY_BINARY_NAME: &str = "yggdrasil";

/// Fixed install locations checked before `PATH`
pub const BINARY_CANDIDATES: [&str; 3] = [
    "/usr/bin/yggdrasil",
    "/usr/local/bin/yggdrasil",
    "/opt/yggdrasil/bin/yggdrasil",
];

/// Control socket locations, in priority order
pub fn default_socket_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("/var/run/yggdrasil.sock"),
        PathBuf::from("/run/yggdrasil.sock"),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".yggdrasil").join("yggdrasil.sock"));
    }
    candidates.push(PathBuf::from("/tmp/yggdrasil.sock"));
    candidates
}

/// First candidate path that exists on disk
pub fn detect_control_socket(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|path| path.exists()).cloned()
}

/// Locate the overlay binary.
///
/// An explicit override is used as-is if it exists. Otherwise the fixed
/// install locations are tried, then `PATH`.
pub fn find_overlay_binary(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return path.is_file().then(|| path.to_path_buf());
    }

    BINARY_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
        .or_else(|| find_in_path(OVERLAY_BINARY_NAME))
}

/// Search `PATH` for an executable name
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Outcome of looking for the overlay service.
///
/// Computed once at startup. The transport never re-checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Available { binary: PathBuf, socket: PathBuf },
    Unavailable { reason: String },
}

impl ServiceStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, ServiceStatus::Available { .. })
    }
}

/// Look for the overlay binary and its control socket
pub fn detect_service(binary: Option<PathBuf>, socket_candidates: &[PathBuf]) -> ServiceStatus {
    let Some(binary) = binary else {
        return ServiceStatus::Unavailable {
            reason: format!("{} binary not found", OVERLAY_BINARY_NAME),
        };
    };

    match detect_control_socket(socket_candidates) {
        Some(socket) => {
            debug!(binary = %binary.display(), socket = %socket.display(), "Overlay service detected");
            ServiceStatus::Available { binary, socket }
        }
        None => ServiceStatus::Unavailable {
            reason: format!(
                "no control socket found (checked {} paths)",
                socket_candidates.len()
            ),
        },
    }
}

/// Installation command for the overlay on this OS
pub fn install_hint() -> &'static str {
    if cfg!(target_os = "linux") {
        if Path::new("/etc/debian_version").exists() {
            "sudo apt update && sudo apt install -y yggdrasil"
        } else if Path::new("/etc/redhat-release").exists() {
            "sudo dnf install -y yggdrasil"
        } else {
            "curl -s https://yggdrasil-network.github.io/install.sh | sudo bash"
        }
    } else if cfg!(target_os = "macos") {
        "brew install yggdrasil"
    } else if cfg!(target_os = "windows") {
        "choco install yggdrasil"
    } else {
        "See https://yggdrasil-network.github.io/install.html"
    }
}
