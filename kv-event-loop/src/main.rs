use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use kv_event_loop::{cli::Cli, config::Config, coordinator::LoggingHandler, server::Server};

fn init_tracing() {
    use std::io::IsTerminal;

    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stdout().is_terminal())
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from(Cli::parse());
    let server = Server::bind(config, LoggingHandler)
        .await
        .context("failed to start server")?;
    info!("kv server listening on {}", server.local_addr());

    match server.run_until_ctrl_c().await {
        Ok(report) => {
            info!(
                peers = report.peers,
                commands = report.stats.commands,
                parse_errors = report.stats.parse_errors,
                "server stopped"
            );
            Ok(())
        }
        Err(err) => {
            warn!("server exited with error: {err:?}");
            Err(err.into())
        }
    }
}
