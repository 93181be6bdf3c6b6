//! Samples a DHT temperature/humidity sensor at a fixed interval and republishes the readings to
//! a line protocol endpoint or an MQTT broker.
//!
//! Usage: `tempsense-daemon [CONFIG]`. Without an argument the configuration is read from
//! `$TEMPSENSE_CONFIG` or from `config.json` in the user's configuration directory.

mod app;
mod config;
mod pipeline;
mod scheduler;

use anyhow::Context;

use crate::app::App;
use crate::config::Config;

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// A minimal main function: load the configuration, then run the App until a shutdown signal.
///
/// Configuration errors end the process here, before anything is scheduled.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = config::config_path(std::env::args().nth(1))?;
    let config = Config::load(&path)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;

    App::new(config).run(shutdown_signal()).await
}
