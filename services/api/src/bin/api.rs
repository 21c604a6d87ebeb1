//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, DocumentTextExtractor, GoogleIdentityAdapter, InMemoryDb,
        OpenAiGenerationAdapter,
    },
    config::Config,
    error::ApiError,
    generation::GenerationEngine,
    session::SessionService,
    web::{self, AppState, GenerationPipeline},
};
use async_openai::{config::OpenAIConfig, Client};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use study_genie_core::ports::DatabaseService;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to the Record Store & Run Migrations ---
    let db: Arc<dyn DatabaseService> = if config.uses_memory_store() {
        info!("Using the in-memory record store; data will not survive a restart.");
        Arc::new(InMemoryDb::new())
    } else {
        info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;
        let db_adapter = DbAdapter::new(db_pool);
        info!("Running database migrations...");
        db_adapter.run_migrations().await?;
        info!("Database migrations complete.");
        Arc::new(db_adapter)
    };

    // --- 3. Initialize Service Adapters ---
    let mut openai_config = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());
    if let Some(base_url) = &config.openai_base_url {
        openai_config = openai_config.with_api_base(base_url.clone());
    }
    let openai_client = Client::with_config(openai_config);

    let generation_adapter = Arc::new(OpenAiGenerationAdapter::new(
        openai_client.clone(),
        config.generation_model.clone(),
        config.generation_timeout,
    ));
    let extractor = Arc::new(DocumentTextExtractor::new(
        openai_client,
        config.vision_model.clone(),
        config.generation_timeout,
    ));
    let identity = Arc::new(
        GoogleIdentityAdapter::new(
            config.google_tokeninfo_url.clone(),
            config.google_client_id.clone(),
            config.identity_timeout,
        )
        .map_err(|e| ApiError::Internal(format!("Failed to build identity client: {}", e)))?,
    );

    // --- 4. Build the Shared AppState ---
    let engine = GenerationEngine::new(generation_adapter);
    let pipeline = Arc::new(GenerationPipeline::new(db.clone(), engine.clone()));
    let sessions = Arc::new(SessionService::new(db.clone(), identity, &config.jwt_secret));
    let app_state = Arc::new(AppState {
        db,
        config: config.clone(),
        sessions,
        extractor,
        engine,
        pipeline: pipeline.clone(),
    });

    // --- 5. Create the Web Router ---
    let app = web::router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- 7. Let Background Pipelines Finish ---
    pipeline.shutdown().await;
    info!("Server stopped.");

    Ok(())
}
