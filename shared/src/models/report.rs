//! Derived result and report shapes
//!
//! None of these are persisted; they are recomputed on demand.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::Category;

/// Points a student earned in one category of one partial
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub points: Decimal,
    /// Category budget in points (`limite`)
    pub limit: Decimal,
    pub remaining: Decimal,
}

/// A student's weighted result for one partial of one class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialResult {
    pub student_id: Uuid,
    pub partial_id: Uuid,
    pub class_id: Uuid,
    pub categories: Vec<CategoryTotal>,
    pub weighted_total: Decimal,
    pub max_partial_score: Decimal,
    pub min_passing_score: Decimal,
    pub passed: bool,
    pub evaluation_count: usize,
    pub graded_count: usize,
    pub structure_is_default: bool,
}

impl PartialResult {
    pub fn category_points(&self, category: Category) -> Decimal {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.points)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Total of one partial inside a multi-partial row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialTotal {
    pub partial_id: Uuid,
    pub sequence: i32,
    pub weighted_total: Decimal,
    pub passed: bool,
}

/// One class in a student's period report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentPeriodRow {
    pub class_id: Uuid,
    pub partials: Vec<PartialTotal>,
    pub average: Decimal,
    pub latest: Option<Decimal>,
    pub attendance_percentage: Option<Decimal>,
    pub passed: bool,
}

/// One student across every class they take in a period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentPeriodReport {
    pub student_id: Uuid,
    pub period_id: Uuid,
    pub rows: Vec<StudentPeriodRow>,
    pub overall_average: Decimal,
    pub classes_passed: usize,
    pub classes_failed: usize,
}

/// Class average for one partial, used by the evolution view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassPartialRow {
    pub partial_id: Uuid,
    pub partial_name: String,
    pub sequence: i32,
    pub average: Decimal,
    pub student_count: usize,
    pub passed_count: usize,
}

/// One student of a class across the period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStudentRow {
    pub student_id: Uuid,
    pub average: Decimal,
    pub attendance_percentage: Option<Decimal>,
    pub passed: bool,
}

/// One class across the partials of a period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassPeriodReport {
    pub class_id: Uuid,
    pub period_id: Uuid,
    pub partials: Vec<ClassPartialRow>,
    pub students: Vec<ClassStudentRow>,
    pub class_average: Decimal,
    pub passed_count: usize,
    pub failed_count: usize,
}

/// One student's line in a partial report; flat so it exports to CSV as is
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialClassRow {
    pub student_id: Uuid,
    pub acumulativo: Decimal,
    pub examen: Decimal,
    pub reposicion: Decimal,
    pub weighted_total: Decimal,
    pub passed: bool,
    pub attendance_percentage: Option<Decimal>,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
}

/// Every student of a class for one partial
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialClassReport {
    pub partial_id: Uuid,
    pub class_id: Uuid,
    pub rows: Vec<PartialClassRow>,
    pub average: Decimal,
    pub passed_count: usize,
    pub failed_count: usize,
    pub structure_is_default: bool,
}
