//! Postgres persistence gateway
//!
//! Approval and disbursement details are stored as JSONB columns on `loans`;
//! investments live in their own append-only table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{LoanRepository, RepositoryError};
use crate::loan::{ApprovalDetails, DisbursementDetails, Investment, Loan, LoanState};

#[derive(Clone)]
pub struct PgLoanRepository {
    db_pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct LoanRow {
    id: Uuid,
    borrower_id_number: String,
    principal_amount: Decimal,
    rate: Decimal,
    roi: Decimal,
    state: LoanState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    approval_details: Option<Json<ApprovalDetails>>,
    disbursement_details: Option<Json<DisbursementDetails>>,
    agreement_letter_url: Option<String>,
    version: i64,
}

impl LoanRow {
    fn into_loan(self, investments: Vec<Investment>) -> Loan {
        Loan {
            id: self.id,
            borrower_id_number: self.borrower_id_number,
            principal_amount: self.principal_amount,
            rate: self.rate,
            roi: self.roi,
            state: self.state,
            created_at: self.created_at,
            updated_at: self.updated_at,
            approval_details: self.approval_details.map(|Json(d)| d),
            investments,
            disbursement_details: self.disbursement_details.map(|Json(d)| d),
            agreement_letter_url: self.agreement_letter_url,
            version: self.version,
        }
    }
}

impl PgLoanRepository {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Resolve a zero-row versioned write into the matching error.
    async fn missed_write(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        loan: &Loan,
    ) -> RepositoryError {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM loans WHERE id = $1)")
            .bind(loan.id)
            .fetch_one(&mut **tx)
            .await;

        match exists {
            Ok(true) => RepositoryError::VersionConflict {
                loan_id: loan.id,
                expected: loan.version,
            },
            Ok(false) => RepositoryError::NotFound(loan.id),
            Err(e) => RepositoryError::Database(e),
        }
    }
}

#[async_trait]
impl LoanRepository for PgLoanRepository {
    async fn create(&self, loan: &Loan) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO loans (
                id, borrower_id_number, principal_amount, rate, roi,
                state, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(loan.id)
        .bind(&loan.borrower_id_number)
        .bind(loan.principal_amount)
        .bind(loan.rate)
        .bind(loan.roi)
        .bind(loan.state)
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .bind(loan.version)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Loan, RepositoryError> {
        let row = sqlx::query_as::<_, LoanRow>(
            r#"
            SELECT id, borrower_id_number, principal_amount, rate, roi, state,
                   created_at, updated_at, approval_details, disbursement_details,
                   agreement_letter_url, version
            FROM loans
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(RepositoryError::NotFound(id))?;

        let investments = sqlx::query_as::<_, Investment>(
            r#"
            SELECT id, loan_id, investor_id, amount, created_at
            FROM investments
            WHERE loan_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(row.into_loan(investments))
    }

    async fn update(&self, loan: &Loan) -> Result<(), RepositoryError> {
        let mut tx = self.db_pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE loans
            SET state = $1,
                approval_details = $2,
                disbursement_details = $3,
                agreement_letter_url = $4,
                updated_at = $5,
                version = version + 1
            WHERE id = $6 AND version = $7
            "#,
        )
        .bind(loan.state)
        .bind(loan.approval_details.clone().map(Json))
        .bind(loan.disbursement_details.clone().map(Json))
        .bind(&loan.agreement_letter_url)
        .bind(loan.updated_at)
        .bind(loan.id)
        .bind(loan.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missed_write(&mut tx, loan).await);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn add_investment(
        &self,
        loan: &Loan,
        investment: &Investment,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.db_pool.begin().await?;

        // Claim the version first so concurrent investors serialize on the row.
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET state = $1, updated_at = $2, version = version + 1
            WHERE id = $3 AND version = $4
            "#,
        )
        .bind(loan.state)
        .bind(loan.updated_at)
        .bind(investment.loan_id)
        .bind(loan.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missed_write(&mut tx, loan).await);
        }

        sqlx::query(
            r#"
            INSERT INTO investments (id, loan_id, investor_id, amount, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(investment.id)
        .bind(investment.loan_id)
        .bind(investment.investor_id)
        .bind(investment.amount)
        .bind(investment.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
