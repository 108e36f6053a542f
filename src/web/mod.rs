pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{
    config::CorsConfig,
    detection::{CascadeOutput, DetectOptions},
    models::ModelManager,
    samples::RES_ROUTE,
    utils::error::GatewayError,
    Config, Result,
};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub models: ModelManager,
}

impl AppState {
    pub fn new(config: Config, models: ModelManager) -> Self {
        Self {
            config: Arc::new(config),
            models,
        }
    }

    /// Resolve request overrides against the configured defaults.
    pub fn detect_options(&self, model: Option<&str>, output: Option<&str>) -> Result<DetectOptions> {
        let backend = match model.map(str::trim).filter(|m| !m.is_empty()) {
            Some(name) => name.parse()?,
            None => self.config.default_backend,
        };
        let cascade_output = match output.map(str::trim).filter(|o| !o.is_empty()) {
            Some(name) => name.parse::<CascadeOutput>()?,
            None => self.config.cascade_output,
        };

        Ok(DetectOptions {
            backend,
            cascade_output,
        })
    }
}

pub async fn serve(config: Config) -> Result<()> {
    config
        .validate()
        .map_err(|e| GatewayError::Config(e.to_string()))?;

    let models = ModelManager::load(&config)?;
    if !models.is_loaded(config.default_backend) {
        tracing::warn!(
            "Default backend '{}' is not loaded; requests without a model will fail in-band",
            config.default_backend
        );
    }

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        GatewayError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    let app = create_app(AppState::new(config, models));

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /predict          - Multipart or raw image upload");
    tracing::info!("  POST /detect_landmarks - Alias of /predict");
    tracing::info!("  POST /predict/json     - JSON base64 upload");
    tracing::info!("  GET  /list_images      - Sample image listing");
    tracing::info!("  GET  /res/*            - Sample image files");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  GET  /api/info         - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        GatewayError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| GatewayError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = state.config.server_config.clone();
    let cors = cors_layer(&state.config.cors_config);
    let samples = ServeDir::new(&state.config.res_dir);

    Router::new()
        // Detection
        .route("/predict", post(handlers::predict_handler))
        .route("/detect_landmarks", post(handlers::predict_handler))
        .route("/predict/json", post(handlers::predict_json_handler))
        // Samples
        .route(
            "/list_images",
            get(handlers::list_images_handler).post(handlers::list_images_handler),
        )
        .nest_service(RES_ROUTE, samples)
        // System
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(DefaultBodyLimit::max(server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server_config.request_timeout)))
        .layer(cors)
        .with_state(state)
}

/// CORS policy built from configuration.
///
/// Wildcard origins cannot be combined with credentials, so credentials
/// are dropped in that case.
pub fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .max_age(Duration::from_secs(cors.max_age));

    if cors.allows_any_origin() {
        if cors.allow_credentials {
            tracing::warn!("CORS credentials ignored because any origin is allowed");
        }
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(cors.allow_credentials)
}

/// Health check endpoint
async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "models": state.models.get_stats(),
    }))
}

/// Service information endpoint
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = &state.config;
    Json(json!({
        "service": "face_landmark_service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "models": state.models.get_stats(),
        "defaults": {
            "model": config.default_backend.as_str(),
            "output": config.cascade_output,
        },
        "cascade": {
            "scale_factor": config.cascade_config.scale_factor,
            "min_face_size": config.cascade_config.min_face_size,
        },
        "mesh": {
            "max_faces": config.mesh_config.max_faces,
            "min_confidence": config.mesh_config.min_confidence,
            "input_size": config.mesh_config.input_size,
        }
    }))
}
