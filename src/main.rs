use halal_map::claude_client::{ClaudeClient, CompletionClient};
use halal_map::config::AppConfig;
use halal_map::middleware::rate_limit::RateLimiter;
use halal_map::services::{IntentResolver, PgPlaceStore, PgSuggestionSink};
use halal_map::{build_router, db, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = AppConfig::from_env()?;

    let db_pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool ready");

    let completion_client: Option<Arc<dyn CompletionClient>> = match &config.anthropic_api_key {
        Some(api_key) => {
            tracing::info!("Initializing Claude client ({})...", config.anthropic_model);
            Some(Arc::new(ClaudeClient::new(
                api_key.clone(),
                config.anthropic_model.clone(),
            )))
        }
        None => {
            tracing::warn!("ANTHROPIC_API_KEY not found. Chat will use keyword inference only.");
            None
        }
    };

    let shared_state = Arc::new(AppState {
        place_store: Arc::new(PgPlaceStore::new(db_pool.clone())),
        suggestion_sink: Arc::new(PgSuggestionSink::new(db_pool)),
        resolver: IntentResolver::new(completion_client),
        chat_limiter: RateLimiter::new(config.chat_rate_limit_per_minute, 60),
        trust_proxy_headers: config.trust_proxy_headers,
        place_result_cap: config.place_result_cap,
    });

    let app = build_router(shared_state);

    // ConnectInfo gives the rate limiter a client address
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

// Production-grade logging configuration
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,halal_map=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,halal_map=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON lines for log aggregation
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("🕌 Halal map service starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Build mode: {}",
        if cfg!(debug_assertions) { "development" } else { "production" }
    );
    tracing::info!("Log level: {}", log_level);

    let db_configured = std::env::var("DATABASE_URL").is_ok();
    let assistant_configured = std::env::var("ANTHROPIC_API_KEY").is_ok();
    tracing::info!(
        "Configuration - Database: {}, Assistant: {}",
        if db_configured { "✅" } else { "❌" },
        if assistant_configured { "✅" } else { "❌" }
    );

    Ok(())
}
