//! # Predictions Module
//!
//! The upload -> classify -> advise -> narrate -> record pipeline, the
//! per-user history ledger query, and serving of stored artifacts.

pub mod handlers;
pub mod models;
pub mod routes;

#[cfg(test)]
mod tests;

pub use routes::predictions_routes;
