pub mod router;
pub mod state;

use std::sync::Arc;

use crate::config::PlaygroundConfig;
use crate::error::{PlaygroundError, Result};
use crate::upstream::OpenAiCompatClient;

/// Start the relay server with the given configuration.
///
/// Runs until Ctrl+C, then stops accepting connections and lets in-flight
/// requests finish.
pub async fn start(config: PlaygroundConfig) -> Result<()> {
    let api_key = config.upstream.api_key()?;
    let client = OpenAiCompatClient::new(&config.upstream.base_url, api_key);
    tracing::info!(
        upstream = %client.endpoint(),
        model = %config.upstream.model,
        "Configured upstream"
    );

    let bind_addr = config.bind_address();
    let app_state = state::AppState::new(Arc::new(config), Arc::new(client));

    let app = router::build(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| PlaygroundError::Server(format!("Failed to bind to {bind_addr}: {e}")))?;

    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PlaygroundError::Server(format!("Server error: {e}")))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
