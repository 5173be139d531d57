//! Maintenance Query Producer - Entry Point
//!
//! Reads queries from stdin and publishes them to the query topic until
//! `exit`, end of input, Ctrl+C or SIGTERM.

use core_config::Environment;
use core_config::tracing::{init_tracing, install_color_eyre};
use eyre::WrapErr;
use std::time::Duration;

fn main() -> eyre::Result<()> {
    install_color_eyre();
    init_tracing(&Environment::from_env());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("Failed to start the async runtime")?;

    let result = runtime.block_on(maintenance_query_producer::run());

    // A pending stdin read sits on a blocking thread and would hold the runtime open
    runtime.shutdown_timeout(Duration::from_millis(100));

    result.map(|_| println!("Done!"))
}
