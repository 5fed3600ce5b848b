//! Loan models for the lending service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::ledger::{self, NumericBounds};

/// Loan lifecycle state.
///
/// A loan only ever advances `Proposed -> Approved -> Invested -> Disbursed`.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[sqlx(type_name = "loan_state", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanState {
    Proposed,
    Approved,
    Invested,
    Disbursed,
}

impl LoanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::Proposed => "PROPOSED",
            LoanState::Approved => "APPROVED",
            LoanState::Invested => "INVESTED",
            LoanState::Disbursed => "DISBURSED",
        }
    }

    /// The single state reachable from this one, if any.
    pub fn next(&self) -> Option<LoanState> {
        match self {
            LoanState::Proposed => Some(LoanState::Approved),
            LoanState::Approved => Some(LoanState::Invested),
            LoanState::Invested => Some(LoanState::Disbursed),
            LoanState::Disbursed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for LoanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field validator sign-off, attached on approval
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ApprovalDetails {
    pub field_validator_id: String,
    pub proof_image_url: String,
    pub approved_at: DateTime<Utc>,
}

/// Field officer hand-over, attached on disbursement
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DisbursementDetails {
    pub field_officer_id: String,
    pub signed_agreement_url: String,
    pub disbursed_at: DateTime<Utc>,
}

/// A funding contribution. Never updated or deleted once written.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Investment {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub investor_id: Uuid,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Investment {
    pub fn new(loan_id: Uuid, investor_id: Uuid, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            investor_id,
            amount,
            created_at: Utc::now(),
        }
    }
}

/// Loan aggregate root
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Loan {
    pub id: Uuid,
    pub borrower_id_number: String,
    pub principal_amount: Decimal,
    pub rate: Decimal,
    pub roi: Decimal,
    pub state: LoanState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_details: Option<ApprovalDetails>,
    #[serde(default)]
    pub investments: Vec<Investment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disbursement_details: Option<DisbursementDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_letter_url: Option<String>,

    /// Optimistic concurrency token, bumped by every successful write
    pub version: i64,
}

impl Loan {
    /// Build a fresh proposal. Timestamps share one instant.
    pub fn propose(
        borrower_id_number: impl Into<String>,
        principal_amount: Decimal,
        rate: Decimal,
        roi: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            borrower_id_number: borrower_id_number.into(),
            principal_amount,
            rate,
            roi,
            state: LoanState::Proposed,
            created_at: now,
            updated_at: now,
            approval_details: None,
            investments: Vec::new(),
            disbursement_details: None,
            agreement_letter_url: None,
            version: 0,
        }
    }

    pub fn can_approve(&self) -> bool {
        self.state == LoanState::Proposed
    }

    pub fn can_invest(&self) -> bool {
        self.state == LoanState::Approved
    }

    pub fn can_disburse(&self) -> bool {
        self.state == LoanState::Invested
    }

    pub fn total_invested(&self) -> Decimal {
        ledger::total_invested(&self.investments)
    }

    pub fn remaining_amount(&self) -> Decimal {
        ledger::remaining(self.principal_amount, &self.investments)
    }

    pub fn is_fully_funded(&self) -> bool {
        ledger::is_fully_funded(self.principal_amount, &self.investments)
    }

    /// Distinct investors in order of first contribution
    pub fn investor_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::with_capacity(self.investments.len());
        for investment in &self.investments {
            if !ids.contains(&investment.investor_id) {
                ids.push(investment.investor_id);
            }
        }
        ids
    }

    /// Whether the optional sub-records agree with the lifecycle state.
    pub fn sub_records_consistent(&self) -> bool {
        let approved = self.state >= LoanState::Approved;
        let disbursed = self.state == LoanState::Disbursed;
        self.approval_details.is_some() == approved
            && self.disbursement_details.is_some() == disbursed
    }
}

fn bounded_positive(value: Decimal, bounds: NumericBounds) -> Result<(), ValidationError> {
    if !value.is_sign_positive() || value.is_zero() {
        return Err(ValidationError::new("must_be_positive"));
    }
    if !bounds.admits(value) {
        return Err(ValidationError::new("out_of_range"));
    }
    Ok(())
}

fn money_amount(value: &Decimal) -> Result<(), ValidationError> {
    bounded_positive(*value, ledger::MONEY)
}

fn rate_value(value: &Decimal) -> Result<(), ValidationError> {
    bounded_positive(*value, ledger::RATE)
}

/// Request to propose a new loan
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLoanRequest {
    #[validate(length(min = 1))]
    pub borrower_id_number: String,
    #[validate(custom = "money_amount")]
    pub principal_amount: Decimal,
    #[validate(custom = "rate_value")]
    pub rate: Decimal,
    #[validate(custom = "rate_value")]
    pub roi: Decimal,
}

/// Request to approve a proposed loan
#[derive(Debug, Deserialize, Validate)]
pub struct ApproveLoanRequest {
    #[validate(length(min = 1))]
    pub field_validator_id: String,
    #[validate(url)]
    pub proof_image_url: String,
}

/// Request to invest in an approved loan
#[derive(Debug, Deserialize, Validate)]
pub struct InvestmentRequest {
    pub investor_id: Uuid,
    #[validate(custom = "money_amount")]
    pub amount: Decimal,
}

/// Request to disburse a funded loan
#[derive(Debug, Deserialize, Validate)]
pub struct DisbursementRequest {
    #[validate(length(min = 1))]
    pub field_officer_id: String,
    #[validate(url)]
    pub signed_agreement_url: String,
}
