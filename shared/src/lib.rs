//! Grading structure and performance analytics engine
//!
//! This crate holds the rules shared between the backend and the console
//! (via WASM): how a partial's score is composed from weighted categories,
//! how evaluation point budgets are checked, how raw scores are validated,
//! and how partial results roll up into period, class and student reports.

pub mod aggregation;
pub mod budget;
pub mod error;
pub mod models;
pub mod recording;
pub mod reports;
pub mod types;
pub mod validation;

pub use aggregation::*;
pub use budget::*;
pub use error::*;
pub use models::*;
pub use recording::*;
pub use reports::*;
pub use types::*;
pub use validation::*;
