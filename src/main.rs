use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use onboardiq::config::AppConfig;
use onboardiq::router::app_router;
use onboardiq::state::AppState;

fn init_tracing(log_dir: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "onboardiq.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = AppConfig::from_env();
    let _log_guard = init_tracing(config.log_dir.as_deref());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_addr = %config.bind_addr,
        db_path = %config.db_path,
        "Starting OnboardIQ"
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::from_config(config)
        .await
        .context("failed to initialize application state")?;

    let app = app_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "HTTP server listening");

    axum::serve(listener, app)
        .await
        .context("server exited with error")?;
    Ok(())
}
