//! Loan route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn loan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/loans", post(create_loan))
        .route("/api/v1/loans/:id", get(get_loan))
        .route("/api/v1/loans/:id/approve", post(approve_loan))
        .route("/api/v1/loans/:id/invest", post(invest_in_loan))
        .route("/api/v1/loans/:id/disburse", post(disburse_loan))
}
