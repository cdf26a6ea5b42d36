//! Gateway entrypoint.
//!
//! Startup order matters: the upstream credential is checked before any core
//! component initializes, and its absence is fatal. Panics anywhere in the
//! process are logged and terminate with a non-zero exit.

use dispatch_config::Settings;
use dispatch_server::{Server, ServerState};
use dispatch_telemetry::{init_logging, LoggingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&LoggingConfig::new(&settings.log_level, settings.log_format)) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    // Process-level faults terminate after a best-effort log write
    std::panic::set_hook(Box::new(|info| {
        error!(panic = %info, "Fatal process fault");
        eprintln!("Fatal process fault: {info}");
        std::process::exit(1);
    }));

    let state = match ServerState::builder(settings).build() {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to initialize server state");
            std::process::exit(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Dispatch gateway starting"
    );

    if let Err(e) = Server::new(state).run().await {
        error!(error = %e, "Server terminated with error");
        std::process::exit(1);
    }
}
