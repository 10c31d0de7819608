use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod config;
mod exec;
mod llm;
mod server;
mod session;

use cli::Cli;

#[tokio::main]
async fn main() {
    // A missing .env file is fine; keys can come from the real environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.debug) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("fatal: {}", panic_info);
        std::process::exit(1);
    }));

    if let Err(e) = cli.execute().await {
        tracing::error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) -> Result<()> {
    // RUST_LOG wins; --debug only raises the default.
    let default = if debug { "genie=debug" } else { "genie=info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}
