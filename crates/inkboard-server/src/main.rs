use inkboard_server::{AppState, ServerConfig, serve};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkboard_server=info,tower_http=info".into()),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let addr = config.bind;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    info!("Inkboard hub listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    if let Err(e) = serve(listener, AppState::new(config), shutdown_signal()).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
    info!("Inkboard hub stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
