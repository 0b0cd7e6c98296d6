use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower::make::Shared;
use tracing_subscriber::EnvFilter;

use ppg_docs::config::AppConfig;
use ppg_docs::db;
use ppg_docs::repository::postgres::PgRepository;
use ppg_docs::routes::create_router;
use ppg_docs::state::{AppState, Repositories};
use ppg_docs::storage::storage_from_config;
use ppg_docs::summaries::SummaryPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        storage_backend = ?config.storage_backend,
        public_document_access = config.public_document_access,
        summaries_enabled = config.summary_api_url.is_some(),
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = db::run_migrations(&pool)?;
    tracing::info!(applied, "database migrations up to date");

    let storage = storage_from_config(&config).await?;
    let summaries = SummaryPipeline::from_config(&config)?;
    let repositories = Repositories::shared(Arc::new(PgRepository::new(pool)));

    let listen_addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let state = AppState::new(config, repositories, storage, summaries)?;
    let router = create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, Shared::new(router)).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
