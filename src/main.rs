//! Stored Procedure Inspector - Main entry point.
//!
//! Inspects every stored procedure of the configured database and prints the
//! generation output as JSON on stdout. Logs go to stderr.

use std::io::Write;
use std::sync::Arc;

use sproc_inspector::config::Config;
use sproc_inspector::db::{Datasource, PoolRegistry, TdsPoolFactory};
use sproc_inspector::generator::Generator;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    info!("Starting sproc-inspector v{}", env!("CARGO_PKG_VERSION"));

    let options = config.pool_options()?;
    let registry = Arc::new(PoolRegistry::new(TdsPoolFactory::new(options)));
    let datasource = Datasource::new(config.connection_string.clone(), registry)?;
    let generator = Generator::new(datasource);

    let result = generator.generate().await;
    generator.shutdown().await;

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            error!(error = %e, "Generation failed");
            return Err(e.into());
        }
    };

    let json = if config.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", json)?;

    info!("Shutdown complete");
    Ok(())
}
