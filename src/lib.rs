//! Peer-to-peer loan lifecycle service
//!
//! Loans move `PROPOSED -> APPROVED -> INVESTED -> DISBURSED`. The library
//! exposes the lifecycle engine, its collaborator gateways and the axum
//! router that serves them.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod loan;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
