//! Route definitions for the loan API

mod loan;

use axum::{routing::get, Router};

use crate::handlers::health_check;
use crate::middleware;
use crate::state::AppState;

pub use loan::loan_routes;

/// Full application router with state and middleware applied
pub fn app_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(loan_routes())
        .with_state(app_state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}
