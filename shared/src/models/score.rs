//! Student score models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FieldViolation;

/// Grading status of a (evaluation, student) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreStatus {
    #[default]
    Pending,
    Graded,
}

impl ScoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreStatus::Pending => "PENDING",
            ScoreStatus::Graded => "GRADED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ScoreStatus::Pending),
            "GRADED" => Some(ScoreStatus::Graded),
            _ => None,
        }
    }
}

/// Raw score of one student on one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentScore {
    pub evaluation_id: Uuid,
    pub student_id: Uuid,
    pub raw_score: Decimal,
    pub status: ScoreStatus,
    pub recorded_at: DateTime<Utc>,
    /// Row version, bumped whenever the recorded value changes
    pub version: i32,
}

impl StudentScore {
    pub fn is_graded(&self) -> bool {
        self.status == ScoreStatus::Graded
    }
}

/// Input for recording a single score
#[derive(Debug, Clone, Deserialize)]
pub struct RecordScoreInput {
    pub evaluation_id: Uuid,
    pub student_id: Uuid,
    /// Kept as submitted; non-numeric values are rejected by validation
    #[serde(default)]
    pub raw_score: serde_json::Value,
    /// Optimistic-concurrency token; last write wins when omitted
    #[serde(default)]
    pub expected_version: Option<i32>,
}

/// One entry of a bulk recording
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreEntry {
    pub student_id: Uuid,
    #[serde(default)]
    pub raw_score: serde_json::Value,
    #[serde(default)]
    pub expected_version: Option<i32>,
}

/// Input for recording many scores on one evaluation
#[derive(Debug, Clone, Deserialize)]
pub struct BulkScoreInput {
    pub evaluation_id: Uuid,
    pub entries: Vec<ScoreEntry>,
}

/// Why one bulk entry was not applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreEntryError {
    pub student_id: Uuid,
    /// Position of the entry in the submitted batch
    pub index: usize,
    #[serde(flatten)]
    pub violation: FieldViolation,
}

/// Outcome of a bulk recording: what was stored and what was rejected
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkScoreOutcome {
    pub recorded: Vec<StudentScore>,
    pub failed: Vec<ScoreEntryError>,
}
