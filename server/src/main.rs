mod app;
mod config;
mod routes;
mod services;
mod state;

use tokio::signal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = config::channel_settings();
    let context = config::initial_context();
    let (state, command_rx) = AppState::new(settings, context);
    match state.current_topic() {
        Some(topic) => tracing::info!(?context, %topic, "live topic resolved"),
        None => tracing::warn!(?context, "no live topic for the configured channel"),
    }

    let (payload_tx, payload_rx) = mpsc::channel(config::PAYLOAD_QUEUE);

    // Spawn background services
    tokio::spawn(services::transport::run(state.clone(), payload_tx));
    tokio::spawn(services::reconciler::run(
        state.clone(),
        payload_rx,
        command_rx,
    ));

    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("GW2 live map server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
