//! In-process loan store with the same version semantics as Postgres

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{LoanRepository, RepositoryError};
use crate::loan::{Investment, Loan};

#[derive(Clone, Default)]
pub struct InMemoryLoanRepository {
    loans: Arc<RwLock<HashMap<Uuid, Loan>>>,
}

impl InMemoryLoanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.loans.read().await.is_empty()
    }
}

fn check_version(stored: &Loan, incoming: &Loan) -> Result<(), RepositoryError> {
    if stored.version != incoming.version {
        return Err(RepositoryError::VersionConflict {
            loan_id: incoming.id,
            expected: incoming.version,
        });
    }
    Ok(())
}

#[async_trait]
impl LoanRepository for InMemoryLoanRepository {
    async fn create(&self, loan: &Loan) -> Result<(), RepositoryError> {
        let mut loans = self.loans.write().await;
        let mut stored = loan.clone();
        stored.investments.clear();
        loans.insert(loan.id, stored);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Loan, RepositoryError> {
        let loans = self.loans.read().await;
        let mut loan = loans.get(&id).cloned().ok_or(RepositoryError::NotFound(id))?;
        loan.investments.sort_by_key(|inv| inv.created_at);
        Ok(loan)
    }

    async fn update(&self, loan: &Loan) -> Result<(), RepositoryError> {
        let mut loans = self.loans.write().await;
        let stored = loans
            .get_mut(&loan.id)
            .ok_or(RepositoryError::NotFound(loan.id))?;
        check_version(stored, loan)?;

        // Investments are append-only and owned by add_investment.
        stored.state = loan.state;
        stored.approval_details = loan.approval_details.clone();
        stored.disbursement_details = loan.disbursement_details.clone();
        stored.agreement_letter_url = loan.agreement_letter_url.clone();
        stored.updated_at = loan.updated_at;
        stored.version += 1;
        Ok(())
    }

    async fn add_investment(
        &self,
        loan: &Loan,
        investment: &Investment,
    ) -> Result<(), RepositoryError> {
        let mut loans = self.loans.write().await;
        let stored = loans
            .get_mut(&investment.loan_id)
            .ok_or(RepositoryError::NotFound(investment.loan_id))?;
        check_version(stored, loan)?;

        stored.investments.push(investment.clone());
        stored.state = loan.state;
        stored.updated_at = loan.updated_at;
        stored.version += 1;
        Ok(())
    }
}
