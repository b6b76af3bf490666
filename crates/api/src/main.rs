use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modelbay_api::config::ServerConfig;
use modelbay_api::router::build_app_router;
use modelbay_api::state::AppState;
use modelbay_lifecycle::config::LifecycleConfig;
use modelbay_lifecycle::events;
use modelbay_lifecycle::service::ModelService;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "modelbay_api=debug,modelbay_lifecycle=debug,modelbay_docker=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let lifecycle = LifecycleConfig::from_env();
    tracing::info!(
        upload_dir = %lifecycle.upload_dir.display(),
        runtime = ?lifecycle.runtime,
        inference_host = %lifecycle.inference_host,
        "Loaded lifecycle configuration",
    );

    tokio::fs::create_dir_all(&lifecycle.upload_dir)
        .await
        .expect("Failed to create upload directory");

    // --- Model service ---
    let service = Arc::new(ModelService::from_config(&lifecycle));

    // Log every lifecycle event until the service is dropped.
    let events_handle = tokio::spawn(events::log_events(service.subscribe()));

    // --- App state ---
    let state = AppState {
        service: Arc::clone(&service),
        config: Arc::new(config.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Dropping the last service handle closes the event channel.
    drop(service);
    let _ = tokio::time::timeout(Duration::from_secs(5), events_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
