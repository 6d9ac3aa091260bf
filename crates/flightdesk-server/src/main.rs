use anyhow::Context;
use flightdesk_server::agent::{Agent, OpenRouterAgent, ScriptedAgent};
use flightdesk_server::config::ServerConfig;
use flightdesk_server::routes::{cors_layer, router, AppState};
use flightdesk_server::tools::ToolRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flightdesk=debug,flightdesk_server=debug,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    let client = config.upstream.http_client().context("failed to build HTTP client")?;
    let tools = Arc::new(ToolRegistry::with_upstream(client.clone(), &config.upstream));

    let agent: Arc<dyn Agent> = match &config.openrouter {
        Some(openrouter) => {
            tracing::info!(model = %openrouter.model, "using OpenRouter agent");
            Arc::new(OpenRouterAgent::new(openrouter.clone(), client, Arc::clone(&tools)))
        }
        None => {
            tracing::warn!("OPENROUTER_API_KEY not set, using the offline scripted agent");
            Arc::new(ScriptedAgent::new(Arc::clone(&tools)))
        }
    };

    let cors = cors_layer(&config.cors_origin)
        .with_context(|| format!("invalid CORS_ORIGIN '{}'", config.cors_origin))?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let (port, cors_origin, environment) = (config.port, config.cors_origin.clone(), config.environment);
    let app = router(AppState::new(config, agent, tools)).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(port, "flight booking backend listening");
    tracing::info!(origin = %cors_origin, "CORS enabled");
    tracing::info!(environment = environment.as_str(), "environment");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
