//! Unix socket accept loop

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{UnixListener, UnixStream};
use tracing::{error, info, warn};

use crate::server::{
    protocol::{self, ProtocolError, Request, Response},
    routes::ChatService,
};

/// Bind the socket and serve requests until the task is cancelled.
///
/// A stale socket file from a previous run is removed before binding.
pub async fn serve(service: Arc<ChatService>, socket_path: &Path) -> Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path).with_context(|| {
            format!("failed to remove stale socket {}", socket_path.display())
        })?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind {}", socket_path.display()))?;
    info!("Listening on {}", socket_path.display());

    loop {
        let (stream, _) = listener.accept().await.context("accept failed")?;
        let service = service.clone();
        tokio::spawn(async move {
            match handle_connection(service, stream).await {
                Ok(()) | Err(ProtocolError::ConnectionClosed) => {}
                Err(e) => error!("Connection error: {}", e),
            }
        });
    }
}

/// Serve frames on one connection until the peer hangs up. A frame that
/// fails to parse gets a 400 envelope and a reply too large for one
/// frame gets a 500 envelope; the connection stays open either way.
async fn handle_connection(
    service: Arc<ChatService>,
    mut stream: UnixStream,
) -> Result<(), ProtocolError> {
    loop {
        let bytes = protocol::read_message(&mut stream).await?;
        let response = match protocol::decode::<Request>(&bytes) {
            Ok(request) => service.dispatch(request).await,
            Err(e) => Response::error(400, format!("Malformed request: {}", e)),
        };
        match protocol::write_response(&mut stream, &response, protocol::WRITE_TIMEOUT).await {
            Ok(()) => {}
            Err(ProtocolError::MessageTooLarge(size)) => {
                warn!("Reply of {} bytes exceeds the frame cap", size);
                let fallback = Response::error(500, "Response exceeds maximum message size.");
                protocol::write_response(&mut stream, &fallback, protocol::WRITE_TIMEOUT).await?;
            }
            Err(e) => return Err(e),
        }
    }
}
