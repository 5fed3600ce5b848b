//! Lifecycle engine - the loan state machine
//!
//! Every mutating operation is a read-validate-write cycle against the
//! persistence gateway. Writes carry the version that was read, so a writer
//! that lost a race gets `VersionConflict` and the whole cycle is replayed
//! against fresh state. Preconditions are checked before anything is written.

use chrono::Utc;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use super::error::LoanError;
use super::ledger::{self, NumericBounds};
use super::model::{ApprovalDetails, DisbursementDetails, Investment, Loan, LoanState};
use crate::gateway::{DocumentGenerator, LoanRepository, Notifier};

/// Default number of attempts for a read-modify-write cycle
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Result of fanning the agreement notice out to investors
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotificationSummary {
    pub delivered: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

pub struct LifecycleEngine {
    repo: Arc<dyn LoanRepository>,
    notifier: Arc<dyn Notifier>,
    documents: Arc<dyn DocumentGenerator>,
    max_attempts: u32,
}

fn ensure_amount(
    field: &'static str,
    value: Decimal,
    bounds: NumericBounds,
) -> Result<(), LoanError> {
    if value <= Decimal::ZERO {
        return Err(LoanError::InvalidAmount { field, value });
    }
    if !bounds.admits(value) {
        return Err(LoanError::AmountOutOfRange { field, value });
    }
    Ok(())
}

impl LifecycleEngine {
    pub fn new(
        repo: Arc<dyn LoanRepository>,
        notifier: Arc<dyn Notifier>,
        documents: Arc<dyn DocumentGenerator>,
    ) -> Self {
        Self {
            repo,
            notifier,
            documents,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Attempts per operation before a concurrency conflict is surfaced
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Propose a new loan
    pub async fn create_loan(
        &self,
        borrower_id_number: &str,
        principal_amount: Decimal,
        rate: Decimal,
        roi: Decimal,
    ) -> Result<Loan, LoanError> {
        ensure_amount("principal_amount", principal_amount, ledger::MONEY)?;
        ensure_amount("rate", rate, ledger::RATE)?;
        ensure_amount("roi", roi, ledger::RATE)?;

        let loan = Loan::propose(borrower_id_number, principal_amount, rate, roi);
        self.repo.create(&loan).await?;

        tracing::info!(
            loan_id = %loan.id,
            borrower = %loan.borrower_id_number,
            principal = %loan.principal_amount,
            "Loan proposed"
        );
        Ok(loan)
    }

    pub async fn get_loan(&self, loan_id: Uuid) -> Result<Loan, LoanError> {
        Ok(self.repo.get_by_id(loan_id).await?)
    }

    /// Field validator sign-off: `PROPOSED -> APPROVED`
    pub async fn approve_loan(
        &self,
        loan_id: Uuid,
        field_validator_id: &str,
        proof_image_url: &str,
    ) -> Result<Loan, LoanError> {
        let loan = self
            .with_conflict_retry("approve", loan_id, move || {
                self.try_approve(loan_id, field_validator_id, proof_image_url)
            })
            .await?;

        tracing::info!(loan_id = %loan_id, validator = %field_validator_id, "Loan approved");
        Ok(loan)
    }

    /// Record an investment; the contribution that reaches the principal
    /// moves the loan to `INVESTED` and triggers the agreement fan-out.
    pub async fn invest_in_loan(
        &self,
        loan_id: Uuid,
        investor_id: Uuid,
        amount: Decimal,
    ) -> Result<Loan, LoanError> {
        ensure_amount("amount", amount, ledger::MONEY)?;

        let mut loan = self
            .with_conflict_retry("invest", loan_id, move || {
                self.try_append_investment(loan_id, investor_id, amount)
            })
            .await?;

        tracing::info!(
            loan_id = %loan_id,
            investor_id = %investor_id,
            amount = %amount,
            total_invested = %loan.total_invested(),
            "Investment recorded"
        );

        if loan.state == LoanState::Invested {
            tracing::info!(loan_id = %loan_id, "Loan is fully invested");
            self.complete_funding(&mut loan).await;
        }

        Ok(loan)
    }

    /// Hand-over to the borrower: `INVESTED -> DISBURSED`
    pub async fn disburse_loan(
        &self,
        loan_id: Uuid,
        field_officer_id: &str,
        signed_agreement_url: &str,
    ) -> Result<Loan, LoanError> {
        let loan = self
            .with_conflict_retry("disburse", loan_id, move || {
                self.try_disburse(loan_id, field_officer_id, signed_agreement_url)
            })
            .await?;

        tracing::info!(loan_id = %loan_id, officer = %field_officer_id, "Loan disbursed");
        Ok(loan)
    }

    async fn with_conflict_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        loan_id: Uuid,
        mut attempt: F,
    ) -> Result<T, LoanError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LoanError>>,
    {
        let mut tries = 1;
        loop {
            match attempt().await {
                Err(err) if err.is_conflict() && tries < self.max_attempts => {
                    tracing::warn!(
                        loan_id = %loan_id,
                        operation,
                        attempt = tries,
                        "Loan modified concurrently, retrying"
                    );
                    tries += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_approve(
        &self,
        loan_id: Uuid,
        field_validator_id: &str,
        proof_image_url: &str,
    ) -> Result<Loan, LoanError> {
        let mut loan = self.repo.get_by_id(loan_id).await?;
        if !loan.can_approve() {
            return Err(LoanError::InvalidTransition {
                action: "approved",
                state: loan.state,
            });
        }

        let now = Utc::now();
        loan.state = LoanState::Approved;
        loan.approval_details = Some(ApprovalDetails {
            field_validator_id: field_validator_id.to_string(),
            proof_image_url: proof_image_url.to_string(),
            approved_at: now,
        });
        loan.updated_at = now;

        self.repo.update(&loan).await?;
        loan.version += 1;
        Ok(loan)
    }

    async fn try_append_investment(
        &self,
        loan_id: Uuid,
        investor_id: Uuid,
        amount: Decimal,
    ) -> Result<Loan, LoanError> {
        let mut loan = self.repo.get_by_id(loan_id).await?;
        if !loan.can_invest() {
            return Err(LoanError::InvalidTransition {
                action: "invested in",
                state: loan.state,
            });
        }

        ledger::check_investment(loan.principal_amount, &loan.investments, amount).map_err(
            |remaining| LoanError::Overfunding {
                requested: amount,
                remaining,
            },
        )?;

        let investment = Investment::new(loan_id, investor_id, amount);
        loan.investments.push(investment.clone());
        if loan.is_fully_funded() {
            loan.state = LoanState::Invested;
            loan.updated_at = investment.created_at;
        }

        // The state change rides in the same transaction as the investment row.
        self.repo.add_investment(&loan, &investment).await?;
        loan.version += 1;
        Ok(loan)
    }

    async fn try_disburse(
        &self,
        loan_id: Uuid,
        field_officer_id: &str,
        signed_agreement_url: &str,
    ) -> Result<Loan, LoanError> {
        let mut loan = self.repo.get_by_id(loan_id).await?;
        if !loan.can_disburse() {
            return Err(LoanError::InvalidTransition {
                action: "disbursed",
                state: loan.state,
            });
        }

        let now = Utc::now();
        loan.state = LoanState::Disbursed;
        loan.disbursement_details = Some(DisbursementDetails {
            field_officer_id: field_officer_id.to_string(),
            signed_agreement_url: signed_agreement_url.to_string(),
            disbursed_at: now,
        });
        loan.updated_at = now;

        self.repo.update(&loan).await?;
        loan.version += 1;
        Ok(loan)
    }

    /// Agreement generation and investor notices after `INVESTED` has been
    /// committed. Failures here are logged and never undo the transition.
    async fn complete_funding(&self, loan: &mut Loan) {
        let agreement_url = match self.documents.generate_agreement(loan).await {
            Ok(url) => url,
            Err(e) => {
                let err = LoanError::DocumentGeneration(e.to_string());
                tracing::error!(
                    loan_id = %loan.id,
                    error = %err,
                    "Investors not notified, agreement letter unavailable"
                );
                return;
            }
        };

        loan.agreement_letter_url = Some(agreement_url.clone());
        match self.repo.update(loan).await {
            Ok(()) => loan.version += 1,
            Err(e) => {
                tracing::warn!(
                    loan_id = %loan.id,
                    error = %e,
                    "Failed to record agreement letter reference"
                );
                loan.agreement_letter_url = None;
            }
        }

        let summary = self.notify_investors(loan, &agreement_url).await;
        tracing::info!(
            loan_id = %loan.id,
            delivered = summary.delivered.len(),
            failed = summary.failed.len(),
            "Agreement notices dispatched"
        );
    }

    /// Notify each distinct investor; one failure never blocks the others.
    pub async fn notify_investors(&self, loan: &Loan, agreement_url: &str) -> NotificationSummary {
        let investor_ids = loan.investor_ids();
        let outcomes = join_all(
            investor_ids
                .iter()
                .map(|investor_id| self.notifier.notify(*investor_id, agreement_url)),
        )
        .await;

        let mut summary = NotificationSummary::default();
        for (investor_id, outcome) in investor_ids.into_iter().zip(outcomes) {
            match outcome {
                Ok(()) => summary.delivered.push(investor_id),
                Err(e) => {
                    tracing::warn!(
                        loan_id = %loan.id,
                        investor_id = %investor_id,
                        error = %e,
                        "Failed to send agreement notice to investor"
                    );
                    summary.failed.push(investor_id);
                }
            }
        }
        summary
    }
}
