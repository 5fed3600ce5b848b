//! Collaborator gateways consumed by the lifecycle engine
//!
//! Persistence, investor notification and agreement generation are reached
//! only through the traits below, so the engine can be wired against Postgres
//! in production and the in-memory store in tests.

mod document;
mod memory;
mod notifier;
mod postgres;
mod smtp;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::loan::{Investment, Loan};

pub use document::UrlAgreementGenerator;
pub use memory::InMemoryLoanRepository;
pub use notifier::{LogNotifier, MailRelayNotifier};
pub use postgres::PgLoanRepository;
pub use smtp::SmtpNotifier;

/// Persistence gateway failures
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("loan not found: {0}")]
    NotFound(Uuid),

    #[error("loan {loan_id} was modified concurrently (expected version {expected})")]
    VersionConflict { loan_id: Uuid, expected: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Loan storage.
///
/// Every write is atomic for the records it touches. `update` and
/// `add_investment` compare `loan.version` with the stored version and fail
/// with `VersionConflict` when another writer got there first; on success the
/// stored version becomes `loan.version + 1`.
#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn create(&self, loan: &Loan) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Loan, RepositoryError>;

    /// Writes state, sub-records, agreement reference and `updated_at`.
    async fn update(&self, loan: &Loan) -> Result<(), RepositoryError>;

    /// Appends `investment` and writes the loan's post-append state in a
    /// single transaction.
    async fn add_investment(
        &self,
        loan: &Loan,
        investment: &Investment,
    ) -> Result<(), RepositoryError>;
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid mail message: {0}")]
    InvalidMessage(String),
}

/// Delivers the funding-agreement notice to an investor
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, investor_id: Uuid, agreement_url: &str)
        -> Result<(), NotificationError>;
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("agreement rendering failed: {0}")]
    Rendering(String),
}

/// Produces a retrievable reference to a loan's agreement letter
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate_agreement(&self, loan: &Loan) -> Result<String, DocumentError>;
}
