//! Main Entrypoint for the Lingua API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Initializing the analysis service.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use lingua_api::{
    config::{AnalysisProvider, Config},
    db::Db,
    router::create_router,
    state::AppState,
};
use lingua_core::analysis::{AnalysisService, MockAnalysisService, OpenAiAnalysisService};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    let analysis: Arc<dyn AnalysisService> = match &config.provider {
        AnalysisProvider::OpenAi => {
            info!("Using OpenAI analysis provider.");
            let api_key = config
                .openai_api_key
                .as_ref()
                .context("OPENAI_API_KEY is required for the openai provider")?;
            let openai_config = OpenAIConfig::new().with_api_key(api_key);
            Arc::new(OpenAiAnalysisService::new(
                openai_config,
                config.analysis_model.clone(),
            ))
        }
        AnalysisProvider::Mock => {
            info!("Using mock analysis provider.");
            Arc::new(MockAnalysisService::with_score(70))
        }
    };

    let app_state = Arc::new(AppState {
        db,
        analysis,
        config: Arc::new(config.clone()),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    info!(
        model = %config.analysis_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
