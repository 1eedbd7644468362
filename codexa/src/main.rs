use clap::Parser;
use codexa::{Application, Config, telemetry};

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = codexa::config::Args::parse();

    // YAML file, then CODEXA_* env vars, then DATABASE_URL; fails if validation does
    let config = Config::load(&args)?;

    // --validate only checks the layered config, it never binds a port
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    // Logging first, so startup (migrations, admin bootstrap) is traced
    telemetry::init_telemetry(config.enable_otel_export)?;

    tracing::debug!("{:?}", args);

    // Serve until SIGTERM/Ctrl+C, then stop background tasks
    let shutdown = shutdown_signal();
    Application::new(config).await?.serve(shutdown).await
}
