use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use super::ask::AskCommand;
use super::serve::ServeCommand;
use crate::config::Config;

/// Genie - session-scoped chat over biological databases
#[derive(Parser)]
#[command(
    name = "genie",
    version,
    about = "Answers biological database questions with executable gget code",
    long_about = r#"Genie keeps a conversation per session, asks a chat-completion model
for gget commands, runs the returned code, and hands back the captured output.

Examples:
  genie                                   # Serve on the default Unix socket
  genie serve --socket /tmp/genie.sock    # Serve on a specific socket
  genie ask -b ensembl "genes related to BRCA1""#
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Listen for requests on a Unix socket
    Serve(ServeCommand),
    /// Ask a single question in a throwaway session
    Ask(AskCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = Config::init().await?;
        debug!("Configuration initialized");

        match self.command {
            Some(Commands::Serve(serve_cmd)) => serve_cmd.execute(&config).await,
            Some(Commands::Ask(ask_cmd)) => ask_cmd.execute(&config).await,
            None => ServeCommand::default().execute(&config).await,
        }
    }
}
