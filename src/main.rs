//! ember-chat - streaming chat server for a local GGUF backend
//!
//! A Rust backend implementing a turn-based streaming chat protocol
//! over a llama.cpp inference server.

mod api;
mod config;
mod conversation;
mod llm;
mod relay;
mod session;
mod turn;

use api::{create_router, AppState};
use config::Config;
use llm::LlamaServerClient;
use session::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ember_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env();

    // Generation backend
    let generator = Arc::new(
        LlamaServerClient::new(&config.backend_url, config.model.clone())
            .with_sampling(config.max_tokens, config.temperature),
    );
    tracing::info!(
        backend = %config.backend_url,
        model = %config.model,
        "Generation backend configured"
    );

    // Sessions, seeded with the fixed system prompt
    let sessions = Arc::new(SessionManager::new(config.system_prompt.clone()));

    // Create application state
    let state = AppState::new(sessions, generator);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("ember-chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Conversation state is memory-only; nothing to persist. Dropping the
    // generator tears down its backend connections.
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("SIGINT received, shutting down"),
        () = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
