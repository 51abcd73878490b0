//! Signal API Server
//!
//! Holds the single current signal in memory and serves it over HTTP.
//! Producers POST to /signal, agents poll GET /signal. The record is lost on
//! restart.

use dotenvy::dotenv;
use signalbridge::config::{get_environment, ServerConfig};
use signalbridge::core::http::start_server;
use signalbridge::logging;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let config = ServerConfig::from_env();
    info!(
        environment = %get_environment(),
        port = config.port,
        "Starting Signal API Server"
    );

    tokio::select! {
        result = start_server(config.port) => {
            if let Err(e) = result {
                error!(error = %e, "Signal API server failed");
                return Err(e);
            }
            error!("Signal API server exited");
        }
        _ = signal::ctrl_c() => {
            info!("Signal API server shutting down, current signal discarded");
        }
    }

    Ok(())
}
