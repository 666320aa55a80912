//! Academic catalog shapes consumed by the engine
//!
//! Periods, partials, enrollments and attendance figures are owned by the
//! surrounding console; the engine only reads them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::RecordState;

/// Top-level academic term
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Period {
    pub id: Uuid,
    pub name: String,
    pub state: RecordState,
}

/// Graded sub-period of a period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Partial {
    pub id: Uuid,
    pub period_id: Uuid,
    pub name: String,
    /// Position of the partial inside its period, starting at 1
    pub sequence: i32,
}

/// A student's membership in a class for one period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Enrollment {
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub section_id: Option<Uuid>,
    pub period_id: Uuid,
}

/// Attendance figures produced by the attendance collaborator.
///
/// `partial_id` is `None` for period-wide figures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceSummary {
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub partial_id: Option<Uuid>,
    pub percentage: Decimal,
    #[serde(default)]
    pub present: u32,
    #[serde(default)]
    pub absent: u32,
    #[serde(default)]
    pub late: u32,
}
