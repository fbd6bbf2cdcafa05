use std::net::SocketAddr;
use std::sync::Arc;

use kvgen_cloud::{GenerationStore, StorageConfig, SupabaseStore};
use kvgen_comfyui::config::ComfyUIConfig;
use kvgen_comfyui::session::{ComfyUISession, GenerationEngine};
use kvgen_core::templates::WorkflowTemplates;
use kvgen_llm::{ChatCompletion, LlmConfig, OpenAiChat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kvgen_api::config::ServerConfig;
use kvgen_api::router::build_app_router;
use kvgen_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvgen_api=debug,kvgen_comfyui=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Engine ---
    let engine_config = ComfyUIConfig::from_env();
    tracing::info!(
        api_url = %engine_config.api_url,
        ws_url = %engine_config.ws_url,
        authenticated = engine_config.auth.is_some(),
        timeout_secs = engine_config.wait.timeout.as_secs(),
        http_timeout_secs = engine_config.http_timeout.as_secs(),
        "Loaded engine configuration",
    );
    let engine: Arc<dyn GenerationEngine> = Arc::new(ComfyUISession::new(&engine_config));

    // --- Workflow templates ---
    let templates = match &config.workflow_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "Loading workflows from directory");
            WorkflowTemplates::with_override_dir(dir.clone())
        }
        None => WorkflowTemplates::builtin(),
    };

    // --- Optional backends ---
    let chat: Option<Arc<dyn ChatCompletion>> = match LlmConfig::from_env() {
        Some(llm) => {
            tracing::info!(model = %llm.model, "Chat completion enabled");
            Some(Arc::new(OpenAiChat::new(llm)))
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set, /run_llm is disabled");
            None
        }
    };

    let store: Option<Arc<dyn GenerationStore>> = match StorageConfig::from_env() {
        Some(storage) => {
            tracing::info!(bucket = %storage.bucket, table = %storage.metadata_table, "Storage enabled");
            Some(Arc::new(SupabaseStore::new(storage)))
        }
        None => {
            tracing::warn!("SUPABASE_URL or SUPABASE_KEY not set, persistence is disabled");
            None
        }
    };

    // --- App state ---
    let state = AppState {
        engine,
        templates: Arc::new(templates),
        chat,
        store,
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
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
