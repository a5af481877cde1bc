use std::net::{Ipv4Addr, SocketAddr};

use greate_accounts::{app, initialize_state, telemetry};
use opentelemetry::global;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // export logs and traces only when a collector is set.
    let endpoint = std::env::var(OTLP_ENDPOINT).ok();
    let logs = endpoint
        .as_deref()
        .map(telemetry::setup_logging)
        .transpose()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(logs)
        .init();

    if let Some(endpoint) = &endpoint {
        global::set_tracer_provider(telemetry::setup_tracer(endpoint)?);
        tracing::info!(%endpoint, "opentelemetry export enabled");
    }

    let metrics = telemetry::setup_metrics_recorder()?;
    let state = initialize_state(Some(metrics)).await?;

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, state.config.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server started");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
