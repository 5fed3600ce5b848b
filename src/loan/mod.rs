//! Loan domain module
//!
//! Contains the loan aggregate, the funding ledger and the lifecycle engine.

mod engine;
mod error;
pub mod ledger;
mod model;

pub use engine::{LifecycleEngine, NotificationSummary, DEFAULT_MAX_ATTEMPTS};
pub use error::LoanError;
pub use model::*;
