//! API handlers for the loan service

mod health;
mod loan;

pub use health::health_check;
pub use loan::*;
