//! Assistant HTTP Server
//!
//! Axum server exposing the intent-routed workflow: one POST per
//! conversational turn, plus read access to checkpointed sessions.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{routing::{get, post}, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{AgentConfig, GenerationOptions, LlmProvider, ProviderStructuredLlm, ReactAgent, ToolRegistry};
use agent_runtime::OllamaProvider;
use assistant_workflow::{
    CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, Workflow, WorkflowConfig,
    WorkflowContext,
};

use crate::config::ServerConfig;
use crate::handlers::{chat_handler, get_session, health_check, list_checkpoints};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env();

    let provider: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::from_env());
    match provider.health_check().await {
        Ok(true) => tracing::info!(model = %config.model, "✓ Connected to Ollama"),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - turns will fail");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    let generation = GenerationOptions::with_model(config.model.clone());
    let structured = Arc::new(ProviderStructuredLlm::new(provider.clone(), generation.clone()));
    let reasoner = Arc::new(ReactAgent::new(
        provider.clone(),
        AgentConfig {
            max_iterations: config.max_iterations,
            generation,
            ..Default::default()
        },
    ));

    // Document tools are supplied by deployments; none are built in.
    let tools = ToolRegistry::new();
    tracing::info!("Registered {} tools", tools.len());

    let ctx = WorkflowContext::builder()
        .language_model(structured)
        .reasoner(reasoner)
        .tools(tools)
        .config(WorkflowConfig::from_env())
        .build()?;

    let store: Arc<dyn CheckpointStore> = match &config.checkpoint_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "Using file checkpoint store");
            Arc::new(FileCheckpointStore::open(dir)?)
        }
        None => {
            tracing::info!("Using in-memory checkpoint store");
            Arc::new(MemoryCheckpointStore::new())
        }
    };

    let state = AppState {
        workflow: Arc::new(Workflow::new(ctx, store)),
        provider,
        model: config.model.clone(),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 assistant server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                        - Health check");
    tracing::info!("  POST /api/chat                      - Run one turn");
    tracing::info!("  GET  /api/sessions/{{id}}             - Latest session state");
    tracing::info!("  GET  /api/sessions/{{id}}/checkpoints - Checkpoint history");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/checkpoints", get(list_checkpoints))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
