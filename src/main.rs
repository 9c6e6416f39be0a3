use tokio::net::TcpListener;

use starport::config::Config;
use starport::startup::{build_app, init_logging, resolve_config_path};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env
    let _ = dotenvy::dotenv();

    // Load config (priority: STARPORT_CONFIG env var > ./starport.toml > defaults)
    let config = Config::load(resolve_config_path().as_deref())?;

    init_logging(&config);

    // Build application (router + feed worker + snapshots)
    let (app, handles) = build_app(config.clone()).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %addr, "listening");

    let listener = TcpListener::bind(&addr).await?;

    let shutdown_signal = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();
        tokio::select! {
            _ = ctrl_c => tracing::info!("received SIGINT"),
            _ = terminate => tracing::info!("received SIGTERM"),
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    tracing::info!("server stopped, stopping feed");
    // Joining the feed thread blocks; keep it off the async workers.
    tokio::task::spawn_blocking(move || handles.shutdown()).await?;
    tracing::info!("starport shutdown complete");

    Ok(())
}
