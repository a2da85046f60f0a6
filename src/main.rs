use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower::make::Shared;
use tracing_subscriber::EnvFilter;

use invoice_tracker::auth::jwt::JwtService;
use invoice_tracker::config::AppConfig;
use invoice_tracker::db;
use invoice_tracker::routes;
use invoice_tracker::s3::build_client;
use invoice_tracker::state::AppState;
use invoice_tracker::storage::S3Storage;
use invoice_tracker::store::PgRecordStore;

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
        s3_bucket = %config.s3_bucket,
        invoice_number_scope = ?config.invoice_number_scope,
        clamp_negative_totals = config.clamp_negative_totals,
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = db::run_migrations(&pool)?;
    tracing::info!(applied, "database migrations up to date");

    let s3_client = build_client(&config).await?;
    let storage = Arc::new(S3Storage::new(
        s3_client,
        config.s3_bucket.clone(),
        config.storage_public_url.clone(),
    ));
    let records = Arc::new(PgRecordStore::new(pool, config.invoice_number_scope));
    let jwt = JwtService::from_config(&config)?;

    let listen_addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let state = AppState::new(config, records, storage, jwt);
    let router = routes::create_router(state);

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
