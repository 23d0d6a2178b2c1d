use anyhow::Result;
use clap::Parser;
use sensorlink_server::{logging, supervisor, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    logging::init_tracing(&config.log_level)?;
    tracing::info!("sensorlink {} starting", sensorlink_core::VERSION);
    supervisor::run(config).await
}
