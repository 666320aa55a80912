//! HTTP handlers

pub mod evaluation;
pub mod health;
pub mod report;
pub mod score;
pub mod structure;

pub use evaluation::*;
pub use health::*;
pub use report::*;
pub use score::*;
pub use structure::*;
