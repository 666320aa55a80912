//! Read access to the academic catalog
//!
//! Periods, partials, enrollments and attendance are maintained by other
//! parts of the console; the grading engine only reads them.

use std::collections::HashSet;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{AttendanceSummary, Enrollment, EvaluationScope, Partial, Period, RecordState};

/// Catalog service for periods, partials, enrollments and attendance
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct PeriodRow {
    id: Uuid,
    name: String,
    state: String,
}

impl From<PeriodRow> for Period {
    fn from(row: PeriodRow) -> Self {
        Period {
            id: row.id,
            name: row.name,
            state: RecordState::from_str(&row.state).unwrap_or(RecordState::Inactive),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PartialRow {
    id: Uuid,
    period_id: Uuid,
    name: String,
    sequence: i32,
}

impl From<PartialRow> for Partial {
    fn from(row: PartialRow) -> Self {
        Partial {
            id: row.id,
            period_id: row.period_id,
            name: row.name,
            sequence: row.sequence,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EnrollmentRow {
    student_id: Uuid,
    class_id: Uuid,
    section_id: Option<Uuid>,
    period_id: Uuid,
}

impl From<EnrollmentRow> for Enrollment {
    fn from(row: EnrollmentRow) -> Self {
        Enrollment {
            student_id: row.student_id,
            class_id: row.class_id,
            section_id: row.section_id,
            period_id: row.period_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttendanceRow {
    student_id: Uuid,
    class_id: Uuid,
    partial_id: Option<Uuid>,
    present: i64,
    absent: i64,
    late: i64,
    percentage: Decimal,
}

impl From<AttendanceRow> for AttendanceSummary {
    fn from(row: AttendanceRow) -> Self {
        AttendanceSummary {
            student_id: row.student_id,
            class_id: row.class_id,
            partial_id: row.partial_id,
            percentage: row.percentage,
            present: u32::try_from(row.present).unwrap_or(u32::MAX),
            absent: u32::try_from(row.absent).unwrap_or(u32::MAX),
            late: u32::try_from(row.late).unwrap_or(u32::MAX),
        }
    }
}

/// Attendance aggregation shared by the attendance queries.
/// Late arrivals count as attended.
const ATTENDANCE_COLUMNS: &str = r#"
    a.student_id,
    a.class_id,
    COUNT(*) FILTER (WHERE a.status = 'PRESENT') AS present,
    COUNT(*) FILTER (WHERE a.status = 'ABSENT') AS absent,
    COUNT(*) FILTER (WHERE a.status = 'LATE') AS late,
    CASE WHEN COUNT(*) = 0 THEN 0
         ELSE ROUND(
            (COUNT(*) FILTER (WHERE a.status IN ('PRESENT', 'LATE')))::numeric * 100 / COUNT(*),
            2)
    END AS percentage
"#;

impl CatalogService {
    /// Create a new CatalogService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a period by ID
    pub async fn get_period(&self, period_id: Uuid) -> AppResult<Period> {
        let row = sqlx::query_as::<_, PeriodRow>("SELECT id, name, state FROM periods WHERE id = $1")
            .bind(period_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Period".to_string()))?;

        Ok(row.into())
    }

    /// Look up a partial, `None` when it does not exist
    pub async fn find_partial(&self, partial_id: Uuid) -> AppResult<Option<Partial>> {
        let row = sqlx::query_as::<_, PartialRow>(
            "SELECT id, period_id, name, sequence FROM partials WHERE id = $1",
        )
        .bind(partial_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get a partial by ID
    pub async fn get_partial(&self, partial_id: Uuid) -> AppResult<Partial> {
        self.find_partial(partial_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Partial".to_string()))
    }

    /// List the partials of a period in sequence order
    pub async fn list_partials(&self, period_id: Uuid) -> AppResult<Vec<Partial>> {
        let rows = sqlx::query_as::<_, PartialRow>(
            r#"
            SELECT id, period_id, name, sequence
            FROM partials
            WHERE period_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(period_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn class_exists(&self, class_id: Uuid) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM classes WHERE id = $1)")
            .bind(class_id)
            .fetch_one(&self.db)
            .await?;

        Ok(exists.0)
    }

    /// Classes a partial-wide evaluation reaches: those with students in the
    /// partial's period plus those with a structure configured for the partial
    pub async fn classes_for_partial(&self, period_id: Uuid, partial_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT class_id FROM enrollments WHERE period_id = $1
            UNION
            SELECT class_id FROM grading_structures WHERE partial_id = $2 AND state = 'ACTIVE'
            ORDER BY class_id
            "#,
        )
        .bind(period_id)
        .bind(partial_id)
        .fetch_all(&self.db)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Sections of a class
    pub async fn class_sections(&self, class_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM sections WHERE class_id = $1 ORDER BY id")
                .bind(class_id)
                .fetch_all(&self.db)
                .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Whether a student exists
    pub async fn student_exists(&self, student_id: Uuid) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM students WHERE id = $1)")
            .bind(student_id)
            .fetch_one(&self.db)
            .await?;

        Ok(exists.0)
    }

    /// Enrollments of a class during a period
    pub async fn class_enrollments(
        &self,
        class_id: Uuid,
        period_id: Uuid,
    ) -> AppResult<Vec<Enrollment>> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT e.student_id, e.class_id, e.section_id, e.period_id
            FROM enrollments e
            JOIN students s ON s.id = e.student_id
            WHERE e.class_id = $1 AND e.period_id = $2
            ORDER BY s.full_name ASC
            "#,
        )
        .bind(class_id)
        .bind(period_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Enrollments of a student during a period
    pub async fn student_enrollments(
        &self,
        student_id: Uuid,
        period_id: Uuid,
    ) -> AppResult<Vec<Enrollment>> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT e.student_id, e.class_id, e.section_id, e.period_id
            FROM enrollments e
            JOIN classes c ON c.id = e.class_id
            WHERE e.student_id = $1 AND e.period_id = $2
            ORDER BY c.name ASC
            "#,
        )
        .bind(student_id)
        .bind(period_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// A student's enrollment in one class during a period, if any
    pub async fn find_enrollment(
        &self,
        student_id: Uuid,
        class_id: Uuid,
        period_id: Uuid,
    ) -> AppResult<Option<Enrollment>> {
        let row = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT student_id, class_id, section_id, period_id
            FROM enrollments
            WHERE student_id = $1 AND class_id = $2 AND period_id = $3
            "#,
        )
        .bind(student_id)
        .bind(class_id)
        .bind(period_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Students that may be graded on an evaluation with this scope
    pub async fn students_in_scope(&self, scope: &EvaluationScope) -> AppResult<HashSet<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT student_id FROM enrollments
            WHERE period_id = $1
              AND ($2::uuid IS NULL OR class_id = $2)
              AND ($3::uuid IS NULL OR section_id = $3)
            "#,
        )
        .bind(scope.period_id)
        .bind(scope.class_id)
        .bind(scope.section_id)
        .fetch_all(&self.db)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Whether one student may be graded on an evaluation with this scope
    pub async fn student_in_scope(
        &self,
        scope: &EvaluationScope,
        student_id: Uuid,
    ) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM enrollments
                WHERE student_id = $1
                  AND period_id = $2
                  AND ($3::uuid IS NULL OR class_id = $3)
                  AND ($4::uuid IS NULL OR section_id = $4)
            )
            "#,
        )
        .bind(student_id)
        .bind(scope.period_id)
        .bind(scope.class_id)
        .bind(scope.section_id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists.0)
    }

    /// Attendance of every student of a class for one partial
    pub async fn partial_attendance(
        &self,
        class_id: Uuid,
        partial_id: Uuid,
    ) -> AppResult<Vec<AttendanceSummary>> {
        let query = format!(
            r#"
            SELECT {}, $2::uuid AS partial_id
            FROM attendance_records a
            WHERE a.class_id = $1 AND a.partial_id = $2
            GROUP BY a.student_id, a.class_id
            "#,
            ATTENDANCE_COLUMNS
        );

        let rows = sqlx::query_as::<_, AttendanceRow>(&query)
            .bind(class_id)
            .bind(partial_id)
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Period-wide attendance of every student of a class
    pub async fn class_attendance(
        &self,
        class_id: Uuid,
        period_id: Uuid,
    ) -> AppResult<Vec<AttendanceSummary>> {
        let query = format!(
            r#"
            SELECT {}, NULL::uuid AS partial_id
            FROM attendance_records a
            JOIN partials p ON p.id = a.partial_id
            WHERE a.class_id = $1 AND p.period_id = $2
            GROUP BY a.student_id, a.class_id
            "#,
            ATTENDANCE_COLUMNS
        );

        let rows = sqlx::query_as::<_, AttendanceRow>(&query)
            .bind(class_id)
            .bind(period_id)
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Period-wide attendance of one student in each of their classes
    pub async fn student_attendance(
        &self,
        student_id: Uuid,
        period_id: Uuid,
    ) -> AppResult<Vec<AttendanceSummary>> {
        let query = format!(
            r#"
            SELECT {}, NULL::uuid AS partial_id
            FROM attendance_records a
            JOIN partials p ON p.id = a.partial_id
            WHERE a.student_id = $1 AND p.period_id = $2
            GROUP BY a.student_id, a.class_id
            "#,
            ATTENDANCE_COLUMNS
        );

        let rows = sqlx::query_as::<_, AttendanceRow>(&query)
            .bind(student_id)
            .bind(period_id)
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
