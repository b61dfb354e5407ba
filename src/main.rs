use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use web_search_mcp::{
    build_app,
    config::Config,
    http::cors_layer,
    logging,
    mcp::server::McpEngine,
    providers::ProviderRegistry,
    transport::{self, SessionTable},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let providers = Arc::new(ProviderRegistry::from_config(&config)?);
    let engine = Arc::new(McpEngine::new(providers));
    let sessions = Arc::new(SessionTable::new());

    info!(
        transport = config.transport_mode.as_str(),
        default_provider = %config.default_provider,
        "starting web search MCP server"
    );

    let mut stdio_task = if config.transport_mode.stdio_enabled() {
        let engine = engine.clone();
        Some(tokio::spawn(async move {
            // A broken stdio pipe must not take the HTTP listener down.
            if let Err(err) = transport::stdio::serve(engine).await {
                error!(error = %err, "stdio transport failed");
            }
        }))
    } else {
        None
    };

    if config.transport_mode.http_enabled() {
        let state = AppState::new(engine, sessions.clone());
        let mut app = build_app(state);
        if let Some(cors) = cors_layer(&config) {
            app = app.layer(cors);
        }

        let listener = tokio::net::TcpListener::bind(config.bind_socket()?).await?;
        info!(
            bind_addr = %config.bind_addr,
            bind_port = config.bind_port,
            "http transport listening"
        );

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else if let Some(task) = stdio_task.as_mut() {
        // Stdio-only mode runs until the input stream ends or a signal arrives.
        tokio::select! {
            _ = shutdown_signal() => {}
            _ = task => {}
        }
    }

    sessions.close_all();
    if let Some(task) = stdio_task {
        task.abort();
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
