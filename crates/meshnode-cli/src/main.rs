//! meshnode CLI
//!
//! Thin wrapper around meshnode-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Create an identity
//! meshnode genkey
//!
//! # Show public key and overlay address
//! meshnode show
//!
//! # Export / restore an encrypted backup
//! meshnode backup export -o identity.backup --password "..."
//! meshnode backup import -i identity.backup --password "..."
//!
//! # Run the node, bootstrapping from two peers
//! meshnode run --bootstrap tcp://203.0.113.7:12345,tls://198.51.100.2:443
//!
//! # Send an encrypted message
//! meshnode send <address> "hello" --peer-key <hex>
//! ```

mod ctl;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use meshnode_core::backup::{
    export_encrypted_backup, import_encrypted_backup, load_encrypted_backup, save_encrypted_backup,
};
use meshnode_core::crypto::{decrypt_bytes_from_sender, derive_shared_key, encrypt_for_recipient, KEY_SIZE};
use meshnode_core::identity::{public_key_from_hex, MeshAddress};
use meshnode_core::keystore::{security_warning, KeyStore};
use meshnode_core::transport::{
    find_overlay_binary, install_hint, detect_service, OverlayPorts, ServiceStatus, TransportClient,
    TransportConfig, TransportMode,
};
use meshnode_core::{ConfigError, KeyPair};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ctl::CtlAdapter;

/// meshnode - identity and encrypted messaging over an overlay mesh
#[derive(Parser)]
#[command(name = "meshnode")]
#[command(version)]
#[command(about = "meshnode - identity and encrypted messaging over an overlay mesh")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.meshnode)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new identity keypair
    Genkey {
        /// Replace an existing identity
        #[arg(long)]
        force: bool,
    },

    /// Show identity information
    Show,

    /// Encrypted private key backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Run the node until Ctrl-C
    Run {
        /// Comma-separated bootstrap peers
        #[arg(short, long, value_delimiter = ',')]
        bootstrap: Vec<String>,

        #[command(flatten)]
        overlay: OverlayArgs,

        /// Decrypt incoming messages from this peer (hex public key)
        #[arg(long)]
        peer_key: Option<String>,
    },

    /// Encrypt a message for a peer and send it
    Send {
        /// Peer overlay address
        address: String,

        message: String,

        /// Peer public key (hex)
        #[arg(long)]
        peer_key: String,

        #[command(flatten)]
        overlay: OverlayArgs,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// Write an encrypted backup of the private key
    Export {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, env = "MESHNODE_BACKUP_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Restore the identity from an encrypted backup
    Import {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, env = "MESHNODE_BACKUP_PASSWORD", hide_env_values = true)]
        password: String,

        /// Replace an existing identity
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args)]
struct OverlayArgs {
    /// Path to the overlay daemon binary
    #[arg(long)]
    overlay_binary: Option<PathBuf>,

    /// Skip overlay detection and run in fallback mode
    #[arg(long)]
    no_overlay: bool,
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory (~/.meshnode)
fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".meshnode"))
        .ok_or(ConfigError::MissingDataDir)
}

fn load_identity(store: &KeyStore) -> Result<KeyPair> {
    if !store.exists() {
        bail!(
            "No identity found in {}. Run `meshnode genkey` first.",
            store.data_dir().display()
        );
    }
    store
        .load()
        .with_context(|| format!("Failed to load identity from {}", store.data_dir().display()))
}

fn print_identity(keypair: &KeyPair, store: &KeyStore) {
    println!("Identity:");
    println!("  Public key: {}", keypair.to_hex());
    println!("  Address: {}", keypair.address());
    println!();
    println!("Data directory: {}", store.data_dir().display());
}

/// Check for the overlay and build a client, degrading to fallback on any
/// failure
async fn build_client(node_id: String, overlay: &OverlayArgs) -> TransportClient {
    let mut config = TransportConfig::new(node_id);
    if overlay.no_overlay {
        info!("Overlay disabled, running in fallback mode");
        return TransportClient::fallback(config);
    }

    let status = detect_service(
        find_overlay_binary(overlay.overlay_binary.as_deref()),
        &config.socket_candidates,
    );
    match &status {
        ServiceStatus::Available { binary, .. } => config.overlay_binary = binary.clone(),
        ServiceStatus::Unavailable { .. } => {
            println!("Overlay not detected. Install it with:");
            println!("  {}", install_hint());
        }
    }

    let ports = OverlayPorts::new(Arc::new(CtlAdapter::for_overlay_binary(&config.overlay_binary)));
    match TransportClient::new(config.clone(), &status, ports).await {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Overlay connection failed, running in fallback mode");
            TransportClient::fallback(config)
        }
    }
}

fn mode_label(client: &TransportClient) -> &'static str {
    match client.mode() {
        TransportMode::Connected => "connected",
        TransportMode::Fallback => "fallback (no overlay)",
    }
}

fn peer_shared_key(keypair: &KeyPair, peer_key: &str) -> Result<([u8; 32], [u8; KEY_SIZE])> {
    let peer_public = public_key_from_hex(peer_key).context("Invalid peer key")?;
    let shared = derive_shared_key(keypair, &peer_public).context("Key agreement with peer failed")?;
    Ok((peer_public, shared))
}

async fn run_node(
    keypair: Arc<KeyPair>,
    bootstrap: Vec<String>,
    overlay: OverlayArgs,
    peer_key: Option<String>,
) -> Result<()> {
    let shared_key = match &peer_key {
        Some(hex) => Some(peer_shared_key(&keypair, hex)?.1),
        None => None,
    };

    println!("Starting meshnode...");
    println!();
    println!("Identity:");
    println!("  Node ID: {}", keypair.to_hex());
    println!("  Address: {}", keypair.address());
    println!();

    let client = Arc::new(build_client(keypair.to_hex(), &overlay).await);
    println!("Transport: {}", mode_label(&client));
    println!("Overlay address: {}", client.local_address().await);

    if !bootstrap.is_empty() {
        let report = client.bootstrap(&bootstrap).await?;
        println!(
            "Bootstrap: {} added, {} failed",
            report.admitted.len(),
            report.failed.len()
        );
        for (peer, reason) in &report.failed {
            println!("  {}: {}", peer, reason);
        }
    }

    println!();
    println!("Listening. Press Ctrl+C to stop.");

    let token = CancellationToken::new();
    let mut receiver = {
        let client = client.clone();
        let token = token.clone();
        tokio::spawn(async move {
            client
                .receive(&token, move |data| {
                    print_incoming(data, shared_key.as_ref());
                    Ok(())
                })
                .await
        })
    };

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        outcome = &mut receiver => Some(outcome),
    };

    let outcome = match finished {
        Some(outcome) => outcome,
        None => {
            println!();
            println!("Received shutdown signal...");
            token.cancel();
            receiver.await
        }
    };

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Receive loop stopped"),
        Err(e) => warn!(error = %e, "Receive task failed"),
    }

    client.close().await?;
    println!("Stopped.");
    Ok(())
}

fn print_incoming(data: &[u8], shared_key: Option<&[u8; KEY_SIZE]>) {
    let Some(key) = shared_key else {
        let preview = &data[..data.len().min(16)];
        println!("<- {} bytes ({}...)", data.len(), hex::encode(preview));
        return;
    };

    match decrypt_bytes_from_sender(data, key) {
        Ok(plaintext) => println!("<- {}", String::from_utf8_lossy(&plaintext)),
        Err(e) => warn!(error = %e, bytes = data.len(), "Dropping undecryptable message"),
    }
}

async fn send_message(
    keypair: &KeyPair,
    address: &str,
    message: &str,
    peer_key: &str,
    overlay: OverlayArgs,
) -> Result<()> {
    let (peer_public, shared_key) = peer_shared_key(keypair, peer_key)?;

    // A canonical address must belong to the key we encrypt for
    if let Ok(target) = address.parse::<MeshAddress>() {
        let expected = MeshAddress::derive(&peer_public);
        if target != expected {
            bail!(
                "Address {} does not belong to peer key (expected {})",
                target,
                expected
            );
        }
    }

    let envelope = encrypt_for_recipient(message.as_bytes(), &shared_key)?;
    let payload = envelope.to_bytes();

    let client = build_client(keypair.to_hex(), &overlay).await;
    if let Err(e) = check_dialable(address, client.mode()) {
        client.close().await?;
        return Err(e);
    }

    let result = async {
        client.dial(address).await?;
        client.send(address, &payload).await
    }
    .await;
    client.close().await?;
    result.with_context(|| format!("Failed to send to {}", address))?;

    println!("Sent {} bytes to {} ({})", payload.len(), address, mode_label(&client));
    Ok(())
}

/// The overlay dials by IPv6 address. A canonical address carries no
/// routing information, so it can only name a peer in fallback mode.
fn check_dialable(address: &str, mode: TransportMode) -> Result<()> {
    if mode == TransportMode::Connected && address.parse::<MeshAddress>().is_ok() {
        bail!(
            "Canonical address {} is not dialable over the overlay; pass the peer's overlay IPv6 address instead",
            address
        );
    }
    Ok(())
}

fn ensure_replaceable(store: &KeyStore, force: bool) -> Result<()> {
    if store.exists() && !force {
        bail!(
            "Identity already exists in {}. Use --force to replace it.",
            store.data_dir().display()
        );
    }
    Ok(())
}

fn export_backup(store: &KeyStore, output: &Path, password: &str) -> Result<()> {
    let keypair = load_identity(store)?;
    let blob = export_encrypted_backup(&keypair, password)?;
    save_encrypted_backup(&blob, output)?;

    println!("Backup written to {}", output.display());
    println!("  Address: {}", keypair.address());
    Ok(())
}

fn import_backup(store: &KeyStore, input: &Path, password: &str, force: bool) -> Result<()> {
    ensure_replaceable(store, force)?;

    let blob = load_encrypted_backup(input)?;
    let keypair = import_encrypted_backup(&blob, password).context("Failed to restore backup")?;
    store.save(&keypair)?;

    println!("Identity restored.");
    print_identity(&keypair, store);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let store = KeyStore::new(data_dir);

    match cli.command {
        Commands::Genkey { force } => {
            ensure_replaceable(&store, force)?;
            let keypair = store.generate().context("Failed to generate identity")?;

            println!("{}", security_warning());
            println!();
            println!("New identity generated.");
            print_identity(&keypair, &store);
        }

        Commands::Show => {
            let keypair = load_identity(&store)?;
            print_identity(&keypair, &store);
        }

        Commands::Backup { action } => match action {
            BackupAction::Export { output, password } => {
                export_backup(&store, &output, &password)?;
            }
            BackupAction::Import {
                input,
                password,
                force,
            } => {
                import_backup(&store, &input, &password, force)?;
            }
        },

        Commands::Run {
            bootstrap,
            overlay,
            peer_key,
        } => {
            let keypair = Arc::new(store.load_or_generate().context("Failed to load identity")?);
            run_node(keypair, bootstrap, overlay, peer_key).await?;
        }

        Commands::Send {
            address,
            message,
            peer_key,
            overlay,
        } => {
            let keypair = load_identity(&store)?;
            send_message(&keypair, &address, &message, &peer_key, overlay).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_address_refused_when_connected() {
        let address = KeyPair::from_seed(&[7u8; 32]).address().to_string();

        let err = check_dialable(&address, TransportMode::Connected).unwrap_err();
        assert!(err.to_string().contains("not dialable"));

        assert!(check_dialable(&address, TransportMode::Fallback).is_ok());
    }

    #[test]
    fn test_overlay_addresses_are_dialable() {
        assert!(check_dialable("200:1::1", TransportMode::Connected).is_ok());
        assert!(check_dialable("[200:1::1]:9000", TransportMode::Connected).is_ok());
    }
}
