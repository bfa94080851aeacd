pub mod config;
pub mod handler;
pub mod sys_stats;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app::config::AppConfig;
use crate::pipeline::SharedModel;

/// Aerial orthomosaics run large; the default 2 MB body limit would
/// reject most real uploads.
const MAX_UPLOAD_BYTES: usize = 250 * 1024 * 1024;

pub struct AppContext {
    pub config: AppConfig,
    pub model: SharedModel,
}

pub struct App;

impl App {
    pub async fn start(config: AppConfig, model: SharedModel) -> crate::Result<()> {
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let context = Arc::new(AppContext { config, model });

        let router = Router::new()
            .route("/", get(handler::root))
            .route("/health", get(handler::health))
            .route("/api/detect-trees", post(handler::detect))
            .route("/api/detect-trees-tile", post(handler::detect_tile))
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(context);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "tree detection api listening");
        axum::serve(listener, router).await?;
        Ok(())
    }
}
