use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use lumin::cli::{self, Cli};
use lumin::client::Services;
use lumin::config::LuminConfig;
use lumin::error::Result;
use lumin::session::Client;
use lumin::{interactive, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = LuminConfig::load_or_default(&cli.config)?;
    if let Some(url) = cli.rpc_url {
        config.node.rpc_url = url;
    }
    if let Some(address) = cli.contract {
        config.contract.address = address;
    }
    logging::init(&config.logging)?;
    info!(config = %cli.config.display(), node = %config.node.rpc_url, "starting");

    let services = Services::connect(&config).await?;

    match cli.command {
        Some(command) => {
            let stdout = std::io::stdout();
            cli::query::handle_command(command, &services, &mut stdout.lock()).await
        }
        None => interactive::run(&mut Client::new(services)).await,
    }
}
