//! Gateway doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use loan_lifecycle_server::gateway::{
    DocumentError, DocumentGenerator, InMemoryLoanRepository, LoanRepository, NotificationError,
    Notifier, RepositoryError,
};
use loan_lifecycle_server::loan::{Investment, LifecycleEngine, Loan};

/// Captures every notice; fails for the investors listed in `failing`
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(Uuid, String)>>>,
    failing: Arc<Mutex<HashSet<Uuid>>>,
}

impl RecordingNotifier {
    pub fn fail_for(&self, investor_id: Uuid) {
        self.failing.lock().unwrap().insert(investor_id);
    }

    pub fn sent(&self) -> Vec<(Uuid, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<Uuid> {
        self.sent().into_iter().map(|(id, _)| id).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        investor_id: Uuid,
        agreement_url: &str,
    ) -> Result<(), NotificationError> {
        if self.failing.lock().unwrap().contains(&investor_id) {
            return Err(NotificationError::Rejected(550));
        }
        self.sent
            .lock()
            .unwrap()
            .push((investor_id, agreement_url.to_string()));
        Ok(())
    }
}

/// Returns a fixed reference, or fails when `broken`
#[derive(Clone, Default)]
pub struct StubDocuments {
    pub broken: bool,
    calls: Arc<Mutex<Vec<Uuid>>>,
}

impl StubDocuments {
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Uuid> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentGenerator for StubDocuments {
    async fn generate_agreement(&self, loan: &Loan) -> Result<String, DocumentError> {
        self.calls.lock().unwrap().push(loan.id);
        if self.broken {
            return Err(DocumentError::Rendering("renderer offline".to_string()));
        }
        Ok(format!("https://docs.test/agreements/{}.pdf", loan.id))
    }
}

/// Store whose writes always fail
pub struct UnavailableRepository;

#[async_trait]
impl LoanRepository for UnavailableRepository {
    async fn create(&self, _loan: &Loan) -> Result<(), RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Loan, RepositoryError> {
        Err(RepositoryError::NotFound(id))
    }

    async fn update(&self, _loan: &Loan) -> Result<(), RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn add_investment(
        &self,
        _loan: &Loan,
        _investment: &Investment,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
}

/// Store where every versioned write loses a race
#[derive(Clone, Default)]
pub struct ContendedRepository {
    inner: InMemoryLoanRepository,
    writes: Arc<AtomicU32>,
}

impl ContendedRepository {
    pub fn write_attempts(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoanRepository for ContendedRepository {
    async fn create(&self, loan: &Loan) -> Result<(), RepositoryError> {
        self.inner.create(loan).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Loan, RepositoryError> {
        self.inner.get_by_id(id).await
    }

    async fn update(&self, loan: &Loan) -> Result<(), RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::VersionConflict {
            loan_id: loan.id,
            expected: loan.version,
        })
    }

    async fn add_investment(
        &self,
        loan: &Loan,
        _investment: &Investment,
    ) -> Result<(), RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::VersionConflict {
            loan_id: loan.id,
            expected: loan.version,
        })
    }
}

/// Store that refuses to record an agreement reference; every other write
/// goes through
#[derive(Clone, Default)]
pub struct ReferenceRejectingRepository {
    pub inner: InMemoryLoanRepository,
}

#[async_trait]
impl LoanRepository for ReferenceRejectingRepository {
    async fn create(&self, loan: &Loan) -> Result<(), RepositoryError> {
        self.inner.create(loan).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Loan, RepositoryError> {
        self.inner.get_by_id(id).await
    }

    async fn update(&self, loan: &Loan) -> Result<(), RepositoryError> {
        if loan.agreement_letter_url.is_some() {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.update(loan).await
    }

    async fn add_investment(
        &self,
        loan: &Loan,
        investment: &Investment,
    ) -> Result<(), RepositoryError> {
        self.inner.add_investment(loan, investment).await
    }
}

pub struct Harness {
    pub engine: Arc<LifecycleEngine>,
    pub repo: InMemoryLoanRepository,
    pub notifier: RecordingNotifier,
    pub documents: StubDocuments,
}

pub fn harness_with(documents: StubDocuments, max_attempts: u32) -> Harness {
    let repo = InMemoryLoanRepository::new();
    let notifier = RecordingNotifier::default();
    let engine = LifecycleEngine::new(
        Arc::new(repo.clone()),
        Arc::new(notifier.clone()),
        Arc::new(documents.clone()),
    )
    .with_max_attempts(max_attempts);

    Harness {
        engine: Arc::new(engine),
        repo,
        notifier,
        documents,
    }
}

pub fn harness() -> Harness {
    harness_with(StubDocuments::default(), 3)
}
