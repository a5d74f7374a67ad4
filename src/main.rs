use std::sync::Arc;

use dispatch_api::api;
use dispatch_api::config::Config;
use dispatch_api::dispatch::{Dispatcher, KeywordDecomposer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env().expect("Invalid configuration");

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(KeywordDecomposer),
        config.event_log_capacity,
    ));
    let app = api::router(dispatcher);

    // Start server
    tracing::info!("Server listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .await
        .expect("Server failed");
}
