use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rppg_ingest::config::Config;
use rppg_ingest::processor::HeuristicProcessor;
use rppg_ingest::routes::router;
use rppg_ingest::state::AppState;

/// Session ingest server for streamed rPPG measurements.
#[derive(Parser, Debug)]
#[command(name = "rppg-ingest-server")]
#[command(about = "Ingest and finalize streamed rPPG measurement sessions over HTTP and WebSocket")]
struct Args {
    /// TCP port to listen on.
    #[arg(long, env = "RPPG_PORT", default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = Config::from_env();
    config.validate().map_err(anyhow::Error::msg)?;

    let state = AppState::new(config, Arc::new(HeuristicProcessor));

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
