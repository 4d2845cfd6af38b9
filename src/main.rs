use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use dev_env_provisioner::cli::{self, Cli};
use dev_env_provisioner::ProvisionerSettings;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenv().ok();

    let settings = ProvisionerSettings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cli::run(cli, settings).await
}
