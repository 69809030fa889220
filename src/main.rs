use anyhow::Context;

use inbox_classifier::config::AppConfig;
use inbox_classifier::routes::{AppState, classify_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;

    eprintln!("📬 Inbox Classifier v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Max upload: {} bytes", config.max_file_size_bytes);
    match config.completion_timeout {
        Some(limit) => eprintln!("   Completion timeout: {}s", limit.as_secs()),
        None => eprintln!("   Completion timeout: disabled"),
    }
    eprintln!(
        "   Classify API: http://0.0.0.0:{}/api/v1/email/classify\n",
        config.port
    );

    // ── Pipeline ─────────────────────────────────────────────────────────
    let state = AppState::from_config(&config).context("failed to build classification pipeline")?;

    // ── HTTP server ──────────────────────────────────────────────────────
    let app = classify_routes(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Classification server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Classification server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
