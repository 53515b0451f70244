use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use rust_market::config::{Config, StoreBackend};
use rust_market::db::{create_pool, run_migrations};
use rust_market::proto::health::health_server::HealthServer;
use rust_market::proto::items::marketplace_service_server::MarketplaceServiceServer;
use rust_market::services::{HealthServiceImpl, MarketplaceServiceImpl};
use rust_market::store::{ItemStore, MemoryItemStore, PgItemStore};

use tonic::transport::Server;
use tonic_reflection::server::Builder as ReflectionBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Include file descriptor for gRPC reflection
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("market_descriptor");

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn ItemStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;

            tracing::info!("Connecting to database...");
            let pool = create_pool(database_url, config.db_max_connections)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connection established");

            if config.run_migrations {
                run_migrations(&pool)
                    .await
                    .context("Failed to run migrations")?;
                tracing::info!("Migrations applied");
            }

            Ok(Arc::new(PgItemStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory item store, listings are lost on restart");
            Ok(Arc::new(MemoryItemStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_market=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!("Starting rust-market gRPC server...");

    let store = build_store(&config).await?;

    // Create services
    let marketplace_service = MarketplaceServiceImpl::new(store.clone());
    let health_service = HealthServiceImpl::new(store);

    // CORS layer for gRPC-Web
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any)
        .expose_headers(Any);

    let reflection_service = ReflectionBuilder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .context("Invalid SERVER_HOST/SERVER_PORT")?;
    tracing::info!("Listening on {}", addr);

    Server::builder()
        .accept_http1(true) // Required for gRPC-Web
        .layer(TraceLayer::new_for_grpc())
        .layer(cors)
        .layer(tonic_web::GrpcWebLayer::new())
        .add_service(reflection_service)
        .add_service(MarketplaceServiceServer::new(marketplace_service))
        .add_service(HealthServer::new(health_service))
        .serve(addr)
        .await?;

    Ok(())
}
