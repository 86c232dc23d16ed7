//! `auto-seal-webhook` binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured logging (and OTLP export if configured).
//! 3. Load the sealing recipients into a [`KeyRing`](auto_seal_webhook::keys::KeyRing).
//! 4. Load the TLS certificate and key.
//! 5. Build the Axum router and serve HTTPS until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use tracing::{error, info};

use auto_seal_webhook::admission::SealPolicy;
use auto_seal_webhook::config::Config;
use auto_seal_webhook::server::{self, middleware::Limits, state::AppState};
use auto_seal_webhook::{keys, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        tls_port = cfg.tls_port,
        trigger = %cfg.trigger_annotation,
        "auto-seal-webhook starting"
    );

    // -----------------------------------------------------------------------
    // 3. Sealing recipients
    // -----------------------------------------------------------------------
    let keys = keys::load(&cfg).await.inspect_err(|e| {
        error!(error = ?e, "failed to load sealing keys");
    })?;
    info!(recipients = keys.len(), "key ring ready");

    // -----------------------------------------------------------------------
    // 4. TLS
    // -----------------------------------------------------------------------
    let tls = server::tls::load(&cfg.tls_cert_path, &cfg.tls_key_path).await?;

    // -----------------------------------------------------------------------
    // 5. HTTPS server
    // -----------------------------------------------------------------------
    let state = AppState::new(keys, SealPolicy::from_config(&cfg));
    let router = server::router::build(state, Limits::from_config(&cfg));

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.tls_port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    let result = tokio::select! {
        r = server::serve(listener, tls, router) => r,
        r = shutdown_signal() => {
            info!("shutdown signal received");
            r
        }
    };

    telemetry::shutdown();
    result
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r.context("failed to listen for ctrl-c")?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    Ok(())
}
