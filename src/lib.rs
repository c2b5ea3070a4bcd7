pub mod analysis;
pub mod commands;
pub mod error;
pub mod models;

use analysis::classifier::RiskModel;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use commands::{
    banking::get_banking_data,
    clients::create_client,
    health::{liveness, root},
    settings::{load_settings, settings_path, Settings},
};
use error::AppError;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<RiskModel>,
    pub settings: Arc<Settings>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.allowed_origins);

    Router::new()
        .route("/", get(root))
        .route("/health/live", get(liveness))
        .route("/api/clients", post(create_client))
        .route("/api/banking", get(get_banking_data))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub async fn run() -> Result<(), AppError> {
    let path = settings_path();
    let mut settings = load_settings(&path)?;
    settings.apply_env_overrides(|key| std::env::var(key).ok())?;
    let addr = settings.bind_address()?;

    let settings = Arc::new(settings);
    let seed_settings = Arc::clone(&settings);
    tokio::task::spawn_blocking(move || commands::dataset::seed_database(&seed_settings))
        .await
        .map_err(|e| AppError::Internal(format!("Seeding task failed: {e}")))??;

    let model = RiskModel::load(&settings.model_path, &settings.scaler_path)?;
    log::info!(
        "Loaded {} model from {}",
        model.classifier_kind(),
        settings.model_path.display()
    );
    log::info!("Dataset source: {:?}", settings.dataset_source);

    let state = AppState {
        model: Arc::new(model),
        settings,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("bankrisk v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    axum::serve(listener, app).await?;
    Ok(())
}
