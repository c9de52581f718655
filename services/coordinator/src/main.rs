use anyhow::Result;
use tracing::{info, warn};

mod federation;
mod retry;

use federation::FederationModule;

#[tokio::main]
async fn main() -> Result<()> {
    federation_core::init_tracing("coordinator-service")?;
    info!(target: "coordinator-service", "Starting coordinator service");
    let cfg = federation_core::load_config()?;
    let module = FederationModule::new(cfg).await?;
    tokio::select! {
        res = module.run() => {
            let reports = res?;
            info!(rounds = reports.len(), "federation_complete");
        }
        _ = tokio::signal::ctrl_c() => warn!("interrupted; stopping after current round"),
    }
    module.shutdown().await?;
    Ok(())
}
