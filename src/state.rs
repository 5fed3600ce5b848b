//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::loan::LifecycleEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LifecycleEngine>,
    /// Present when loans are stored in Postgres
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(engine: Arc<LifecycleEngine>, db_pool: Option<PgPool>) -> Self {
        Self { engine, db_pool }
    }
}

impl FromRef<AppState> for Arc<LifecycleEngine> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.engine.clone()
    }
}
