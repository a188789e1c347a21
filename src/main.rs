use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use promo_hub::{
    config::{Config, StorageBackend},
    routes,
    services::{Database, MemoryStore, PromoStore},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting promo-hub service ({})...", config.environment);

    // 初始化存储
    let store: Arc<dyn PromoStore> = match config.storage_backend {
        StorageBackend::Postgres => {
            let db = match Database::new(&config).await {
                Ok(db) => db,
                Err(e) => {
                    error!("Failed to create database connection: {}", e);
                    return Err(anyhow::anyhow!("Database initialization failed"));
                }
            };
            db.verify_connection().await?;
            db.migrate().await?;
            Arc::new(db)
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // 创建应用状态
    let app_state = Arc::new(AppState::new(config.clone(), store));

    // 配置 CORS
    let origins = config
        .cors_allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers([axum::http::HeaderName::from_static(routes::TOTAL_COUNT_HEADER)])
        .allow_origin(origins);

    let app = routes::app(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(cors),
    );

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
