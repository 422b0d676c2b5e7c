//! Connection acceptor
//!
//! One listener is bound per scenario on the tool port; the game client
//! dials it and the accepted stream becomes the relay's peer side.

use crate::audit::AuditSink;
use crate::error::{Error, Result};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};

/// Listener yielding the peer stream for one scenario's connection.
pub struct Acceptor {
  listener: TcpListener,
}

impl Acceptor {
  /// Bind the tool port and announce the wait in the audit log.
  pub async fn bind(port: u16, audit: &dyn AuditSink, category: &str) -> Result<Self> {
    audit.log(category, "General", "Waiting for client to connect.");
    let listener = TcpListener::bind(("127.0.0.1", port))
      .await
      .map_err(|e| Error::connect(format!("failed to bind tool port {}: {}", port, e)))?;
    Ok(Self { listener })
  }

  /// Block until one peer connects and yield its stream.
  pub async fn accept(&self) -> Result<TcpStream> {
    let (stream, peer_addr) = self
      .listener
      .accept()
      .await
      .map_err(|e| Error::connect(format!("accept failed: {}", e)))?;
    tracing::debug!("peer connected from {}", peer_addr);
    Ok(stream)
  }

  /// The bound address, useful when port 0 was requested.
  pub fn local_addr(&self) -> Result<SocketAddr> {
    Ok(self.listener.local_addr()?)
  }
}
