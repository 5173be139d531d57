//! Maintenance Ingest - Entry Point
//!
//! Loads a JSON file of maintenance records, embeds each summary and upserts
//! the result into MongoDB.

use clap::Parser;
use core_config::Environment;
use core_config::tracing::{init_tracing, install_color_eyre};
use maintenance_ingest::IngestArgs;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();
    init_tracing(&Environment::from_env());

    let args = IngestArgs::parse();
    let report = maintenance_ingest::run(args).await?;
    println!("{}", maintenance_ingest::render_report(&report));
    maintenance_ingest::ensure_completed(&report)?;

    Ok(())
}
