//! Connected transport: a live socket to the overlay
//!
//! The connection is split into read and write halves, each behind its own
//! lock. Concurrent `send` calls are serialised by the write lock; the
//! receive loop holds the read lock for one poll interval at a time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::BootstrapReport;
use super::ports::OverlayPorts;
use super::TransportConfig;
use crate::error::TransportError;

/// Any bidirectional byte stream (Unix control socket or TCP peer link)
trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Stream for T {}

type BoxedStream = Box<dyn Stream>;

pub struct ConnectedTransport {
    config: TransportConfig,
    socket_path: PathBuf,
    ports: OverlayPorts,
    reader: Mutex<Option<ReadHalf<BoxedStream>>>,
    writer: Mutex<Option<WriteHalf<BoxedStream>>>,
    closed: AtomicBool,
}

impl ConnectedTransport {
    /// Open the overlay's local control socket
    pub async fn connect(
        config: TransportConfig,
        socket_path: &Path,
        ports: OverlayPorts,
    ) -> Result<Self, TransportError> {
        let stream = open_socket(socket_path).await?;
        info!(socket = %socket_path.display(), "Connected to overlay");

        let (reader, writer) = tokio::io::split(stream);
        Ok(Self {
            config,
            socket_path: socket_path.to_path_buf(),
            ports,
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Connect to a peer on the well-known port, replacing the current link
    pub async fn dial(&self, address: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::NotConnected);
        }

        let host = address.trim_start_matches('[').trim_end_matches(']');
        let port = self.config.dial_port;
        debug!(%host, port, "Dialing peer");

        let stream = tokio::time::timeout(self.config.dial_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::DialTimeout {
                address: address.to_string(),
                timeout: self.config.dial_timeout,
            })??;

        let (reader, writer) = tokio::io::split(Box::new(stream) as BoxedStream);
        *self.writer.lock().await = Some(writer);
        *self.reader.lock().await = Some(reader);

        info!(%address, port, "Dialed peer");
        Ok(())
    }

    /// Write an opaque payload to the open connection
    pub async fn send(&self, address: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;

        writer.write_all(payload).await?;
        writer.flush().await?;

        debug!(%address, bytes = payload.len(), "Sent payload");
        Ok(())
    }

    /// Read until cancelled, handing each chunk to `handler`.
    ///
    /// Each iteration waits at most one poll interval for data before
    /// checking the token again. A handler error stops the loop and is
    /// returned. Cancellation returns `Ok(())`.
    pub async fn receive<F>(
        &self,
        token: &CancellationToken,
        mut handler: F,
    ) -> Result<(), TransportError>
    where
        F: FnMut(&[u8]) -> anyhow::Result<()> + Send,
    {
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];

        loop {
            if token.is_cancelled() {
                debug!("Receive cancelled");
                return Ok(());
            }

            let read = {
                let mut guard = self.reader.lock().await;
                let reader = guard.as_mut().ok_or(TransportError::NotConnected)?;

                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Receive cancelled");
                        return Ok(());
                    }
                    read = tokio::time::timeout(self.config.poll_interval, reader.read(&mut buf)) => read,
                }
            };

            match read {
                // Deadline passed with no data
                Err(_) => continue,
                Ok(Ok(0)) => return Err(TransportError::ConnectionClosed),
                Ok(Ok(n)) => {
                    debug!(bytes = n, "Received payload");
                    handler(&buf[..n]).map_err(TransportError::Handler)?;
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Register each peer with the overlay. A failed peer is logged and
    /// skipped.
    pub async fn bootstrap(&self, peers: &[String]) -> Result<BootstrapReport, TransportError> {
        let mut report = BootstrapReport::default();

        for peer in peers.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            match self.ports.admission.add_peer(peer).await {
                Ok(()) => {
                    info!(%peer, "Added bootstrap peer");
                    report.admitted.push(peer.to_string());
                }
                Err(e) => {
                    warn!(%peer, error = %e, "Failed to add bootstrap peer");
                    report.failed.push((peer.to_string(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// This node's overlay address, or the node id if the overlay won't say
    pub async fn local_address(&self) -> String {
        match self.ports.self_address.self_address().await {
            Ok(address) => address,
            Err(e) => {
                warn!(error = %e, "Could not query own overlay address");
                self.config.node_id.clone()
            }
        }
    }

    /// Close the connection. Later calls are no-ops.
    pub async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Shutdown on close failed");
            }
        }
        self.reader.lock().await.take();

        info!("Overlay connection closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ConnectedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectedTransport")
            .field("node_id", &self.config.node_id)
            .field("socket_path", &self.socket_path)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
async fn open_socket(path: &Path) -> Result<BoxedStream, TransportError> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn open_socket(path: &Path) -> Result<BoxedStream, TransportError> {
    Err(TransportError::Unavailable(format!(
        "unix control socket {} not supported on this platform",
        path.display()
    )))
}
