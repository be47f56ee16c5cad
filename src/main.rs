#![allow(clippy::result_large_err)]

use clap::Parser;
use dotenvy::dotenv;
use smoke_ledger::{
    cli::{self, Cli},
    config::{app::load_config_or_default, database},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env before clap reads DATABASE_URL
    dotenv().ok();

    // 2. Parse arguments and load the configuration file
    let cli = Cli::parse();
    let app_config = load_config_or_default(&cli.config)?;

    // 3. Initialize tracing; RUST_LOG wins over the configured filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&app_config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
    info!("Loaded configuration from {}", cli.config.display());

    // 4. Connect and make sure the schema exists
    let database_url = cli
        .database_url
        .clone()
        .unwrap_or_else(database::get_database_url);
    let db = database::connect(&database_url)
        .await
        .inspect(|_| info!("Database ready at {}", database_url))
        .inspect_err(|e| error!("Failed to open database: {}", e))?;

    // 5. Run the command
    cli::run(cli, &app_config, &db)
        .await
        .inspect_err(|e| error!("{}", e))
}
