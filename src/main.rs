use anyhow::Result;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quiz_generator::api::{create_router, AppState};
use quiz_generator::{
    Config, Database, DistractorService, FlashcardScraper, GeminiClient, GenerationMode,
    GenerationOrchestrator, QuizPersister,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging with file output before anything else logs
    let _guard = setup_logging()?;

    let config = Config::from_env()?;
    config.validate()?;

    info!("Starting quiz generator server...");

    // Initialize database
    let db = Database::new(&config.database.url).await?;
    info!("Database initialized successfully");

    // Initialize services
    let gemini = GeminiClient::new(
        config.ai.api_key.clone(),
        config.ai.base_url.clone(),
        config.ai.model.clone(),
    );
    let distractor_service =
        DistractorService::new(gemini, Duration::from_secs(config.ai.timeout_secs));
    let scraper = FlashcardScraper::new(config.scraper.clone());
    let persister = QuizPersister::new(db.clone());

    let mode = if config.ai.batch_mode {
        GenerationMode::Batch
    } else {
        GenerationMode::PerQuestion {
            concurrency: config.ai.concurrency,
        }
    };

    let orchestrator =
        GenerationOrchestrator::new(scraper, distractor_service.clone(), persister, mode);

    info!(
        model = distractor_service.model_name(),
        batch_mode = config.ai.batch_mode,
        "Initialized generation pipeline"
    );

    let state = AppState {
        orchestrator,
        distractor_service,
        db,
        default_user_id: config.server.default_user_id.clone(),
    };

    // Build the application router
    let app = create_router(state)
        // CORS middleware
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn setup_logging() -> Result<WorkerGuard> {
    use std::fs;
    use tracing_subscriber::fmt;

    // Create logs directory if it doesn't exist
    fs::create_dir_all("logs").unwrap_or_else(|e| {
        eprintln!("Warning: Could not create logs directory: {}", e);
    });

    // Configure log level from environment variable
    let default_log_level = "info,quiz_generator=debug";
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level));

    // Set up file appender with daily rotation
    let file_appender = tracing_appender::rolling::daily("logs", "quiz-generator.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // Configure console output
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true);

    // Configure file output (no ANSI colors for files)
    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(non_blocking_file);

    // Initialize subscriber with both console and file outputs
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized - writing to logs/quiz-generator.log with daily rotation");

    Ok(guard)
}
