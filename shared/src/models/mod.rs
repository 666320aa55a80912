//! Domain models for the grading engine

mod academic;
mod category;
mod evaluation;
mod report;
mod score;
mod structure;

pub use academic::*;
pub use category::*;
pub use evaluation::*;
pub use report::*;
pub use score::*;
pub use structure::*;
