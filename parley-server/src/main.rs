//! Parley server -- chat transcript and task service.
//!
//! Restores state from the state file (if any), serves the HTTP API until
//! Ctrl-C or SIGTERM, then writes the state file back for the next start.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8080
//! cargo run --bin parley-server
//!
//! # Custom address, admin identity and backend
//! cargo run --bin parley-server -- --bind 127.0.0.1:3000 \
//!     --admin-identity ops --backend-url http://127.0.0.1:11434
//! ```

use std::sync::Arc;

use clap::Parser;
use parley_server::auth::CallerId;
use parley_server::clock::SystemClock;
use parley_server::completion::{CompletionClient, HttpBackend};
use parley_server::config::{CliArgs, ServerConfig};
use parley_server::http;
use parley_server::persist::StateFile;
use parley_server::service::Service;

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "parley server failed");
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Everything that can fail at startup happens before the state file is
    // consumed; after `take` the only way out is through the save below.
    let shutdown = shutdown_signal()?;
    let backend = HttpBackend::new(&config.backend_url)?;
    tracing::info!(
        endpoint = %backend.endpoint(),
        model = %config.llm.model,
        "using generation backend"
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let state_file = StateFile::new(config.state_file.clone());
    let snapshot = state_file.take()?.unwrap_or_default();

    let completion = CompletionClient::new(backend, config.llm.clone(), config.request_timeout);
    let service = Arc::new(Service::restore(
        snapshot,
        CallerId::new(config.admin_identity.clone()),
        completion,
        Arc::new(SystemClock),
    ));

    tracing::info!(addr = %local_addr, "parley server listening");
    let served = http::serve(listener, Arc::clone(&service), shutdown).await;

    // Save even if the listener failed, so no state is lost.
    let saved = state_file.save(&service.snapshot().await);
    served?;
    saved?;
    tracing::info!("parley server stopped");
    Ok(())
}

/// Installs the shutdown handlers and returns a future that resolves on
/// Ctrl-C or, on Unix, SIGTERM.
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            sigterm.recv().await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => tracing::info!(signal = "SIGINT", "shutdown requested"),
            () = terminate => tracing::info!(signal = "SIGTERM", "shutdown requested"),
        }
    })
}
