use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info};

use crate::config::Config;
use crate::server::{self, ChatService};

/// Listen for requests on a Unix socket
#[derive(Args, Default)]
pub struct ServeCommand {
    /// Socket path to bind. Overrides the configured path
    #[arg(short = 's', long = "socket")]
    pub socket: Option<PathBuf>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        debug!("Executing serve command");

        config.validate()?;

        let mut config = config.clone();
        if let Some(socket) = &self.socket {
            config.socket_path = socket.clone();
        }
        let socket_path = config.socket_path.clone();

        let service = Arc::new(ChatService::new(&config)?);

        tokio::select! {
            result = server::serve(service, &socket_path) => result?,
            _ = shutdown_signal() => {}
        }

        // Leave no stale socket behind
        let _ = std::fs::remove_file(&socket_path);
        Ok(())
    }
}

async fn shutdown_signal() {
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("Failed to install SIGINT handler: {}", e);
            return std::future::pending().await;
        }
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("Failed to install SIGTERM handler: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
    }
}
