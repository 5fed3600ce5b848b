//! Loan lifecycle API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiResult;
use crate::loan::{
    ApproveLoanRequest, CreateLoanRequest, DisbursementRequest, InvestmentRequest,
    LifecycleEngine, Loan,
};
use crate::models::ApiResponse;

/// POST /api/v1/loans - Propose a loan
pub async fn create_loan(
    State(engine): State<Arc<LifecycleEngine>>,
    Json(req): Json<CreateLoanRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Loan>>)> {
    req.validate()?;

    let loan = engine
        .create_loan(&req.borrower_id_number, req.principal_amount, req.rate, req.roi)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(loan))))
}

/// GET /api/v1/loans/:id - Fetch a loan with its investments
pub async fn get_loan(
    State(engine): State<Arc<LifecycleEngine>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    let loan = engine.get_loan(id).await?;
    Ok(Json(ApiResponse::ok(loan)))
}

/// POST /api/v1/loans/:id/approve
pub async fn approve_loan(
    State(engine): State<Arc<LifecycleEngine>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApproveLoanRequest>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    req.validate()?;

    let loan = engine
        .approve_loan(id, &req.field_validator_id, &req.proof_image_url)
        .await?;

    Ok(Json(ApiResponse::ok(loan)))
}

/// POST /api/v1/loans/:id/invest
pub async fn invest_in_loan(
    State(engine): State<Arc<LifecycleEngine>>,
    Path(id): Path<Uuid>,
    Json(req): Json<InvestmentRequest>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    req.validate()?;

    let loan = engine.invest_in_loan(id, req.investor_id, req.amount).await?;
    Ok(Json(ApiResponse::ok(loan)))
}

/// POST /api/v1/loans/:id/disburse
pub async fn disburse_loan(
    State(engine): State<Arc<LifecycleEngine>>,
    Path(id): Path<Uuid>,
    Json(req): Json<DisbursementRequest>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    req.validate()?;

    let loan = engine
        .disburse_loan(id, &req.field_officer_id, &req.signed_agreement_url)
        .await?;

    Ok(Json(ApiResponse::ok(loan)))
}
