//! Persistence-backed services for the grading engine

pub mod catalog;
pub mod evaluation;
pub mod report;
pub mod score;
pub mod structure;

pub use catalog::CatalogService;
pub use evaluation::EvaluationService;
pub use report::ReportService;
pub use score::ScoreService;
pub use structure::StructureService;
