//! Stream transports carrying the customer protocol.
//!
//! Two address forms: `ip:port` for TCP and `@path` for a local Unix
//! socket. Everything past accept is a plain byte stream either way.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tracing::{debug, warn};

/// A byte stream to one customer.
pub trait ClientStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ClientStream for T {}

/// Listening side of the customer protocol.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait for the next customer connection; returns the stream and a
    /// peer description for logging.
    async fn accept(&self) -> io::Result<(Box<dyn ClientStream>, String)>;

    /// Remove any filesystem residue on shutdown.
    fn cleanup(&self) {}
}

struct TcpTransport {
    listener: TcpListener,
}

#[async_trait]
impl Transport for TcpTransport {
    async fn accept(&self) -> io::Result<(Box<dyn ClientStream>, String)> {
        let (stream, peer) = self.listener.accept().await?;
        Ok((Box::new(stream), peer.to_string()))
    }
}

struct UnixTransport {
    listener: UnixListener,
    path: PathBuf,
}

#[async_trait]
impl Transport for UnixTransport {
    async fn accept(&self) -> io::Result<(Box<dyn ClientStream>, String)> {
        let (stream, _) = self.listener.accept().await?;
        Ok((Box::new(stream), "local".to_string()))
    }

    fn cleanup(&self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), %err, "could not remove socket file");
        }
    }
}

/// Bind the listen address from the command line.
pub async fn bind(listen: &str) -> anyhow::Result<Arc<dyn Transport>> {
    if let Some(path) = listen.strip_prefix('@') {
        let path = PathBuf::from(path);
        // A socket file left over from an unclean exit would fail the bind.
        if path.exists() {
            debug!(path = %path.display(), "removing stale socket file");
            let _ = std::fs::remove_file(&path);
        }
        let listener = UnixListener::bind(&path)?;
        Ok(Arc::new(UnixTransport { listener, path }))
    } else {
        let listener = TcpListener::bind(listen).await?;
        Ok(Arc::new(TcpTransport { listener }))
    }
}
