use axum::{extract::State, Json};

use crate::db;
use crate::models::HealthResponse;
use crate::state::AppState;

/// GET /health - Liveness plus storage connectivity
pub async fn health_check(State(app_state): State<AppState>) -> Json<HealthResponse> {
    let storage = match &app_state.db_pool {
        Some(pool) => match db::check_health(pool).await {
            Ok(()) => "connected".to_string(),
            Err(e) => format!("error: {}", e),
        },
        None => "memory".to_string(),
    };

    let status = if storage.starts_with("error") {
        "unhealthy"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        storage,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
