use anyhow::Result;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::info;

use trustledger_core::config::Settings;
use trustledger_core::conversation::{Dispatcher, RedisStateStore};
use trustledger_core::database::{DbPool, Repository};
use trustledger_core::handlers;
use trustledger_core::services::NlpClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,trustledger_core=debug".to_string()),
        )
        .with_target(true)
        .json()
        .init();

    info!("🚀 Starting TrustLedger core service...");

    // Load configuration
    let settings = Settings::load()?;
    info!("✅ Configuration loaded");

    // Initialize database
    let db_pool = DbPool::new(&settings.database).await?;
    let repository = Repository::new(db_pool);
    repository.ensure_schema().await?;
    info!("✅ Database connection established");

    // Conversation state store
    let state_store =
        RedisStateStore::connect(&settings.state.redis_url, settings.state.ttl_seconds).await?;
    info!("✅ Redis state store connected");

    // NLP client
    let nlp_client = NlpClient::new(settings.nlp.clone());

    // The conversational FSM
    let dispatcher = Arc::new(Dispatcher::new(
        Box::new(repository),
        Box::new(state_store),
        Box::new(nlp_client),
    ));

    let app = build_router(dispatcher);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/webhook",
            post(handlers::webhook::handle_incoming_message),
        )
        .layer(Extension(dispatcher))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
}
