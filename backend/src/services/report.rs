//! Result and report service
//!
//! Loads structures, evaluations, scores and attendance, then hands them to
//! the engine's pure aggregation and report builders.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::{CatalogService, EvaluationService, ScoreService, StructureService};
use shared::{
    build_class_period_report, build_partial_class_report, build_student_period_report,
    compute_class_results, compute_partial_result, BudgetPolicy, ClassPeriodReport, Evaluation,
    Partial, PartialClassReport, PartialResult, ResolvedStructure, StudentPeriodReport,
    StudentScore,
};

/// Report service
#[derive(Clone)]
pub struct ReportService {
    db: PgPool,
}

/// Flat line of a student period report for CSV export
#[derive(Debug, Serialize)]
pub struct StudentPeriodCsvRow {
    pub class_id: Uuid,
    pub partials_graded: usize,
    pub average: Decimal,
    pub latest: Option<Decimal>,
    pub attendance_percentage: Option<Decimal>,
    pub passed: bool,
}

impl StudentPeriodCsvRow {
    pub fn from_report(report: &StudentPeriodReport) -> Vec<Self> {
        report
            .rows
            .iter()
            .map(|row| Self {
                class_id: row.class_id,
                partials_graded: row.partials.len(),
                average: row.average,
                latest: row.latest,
                attendance_percentage: row.attendance_percentage,
                passed: row.passed,
            })
            .collect()
    }
}

/// Everything needed to compute results for one class over some partials
struct ClassInputs {
    structures: HashMap<Uuid, ResolvedStructure>,
    evaluations: Vec<Evaluation>,
    scores: Vec<StudentScore>,
}

impl ReportService {
    /// Create a new ReportService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn catalog(&self) -> CatalogService {
        CatalogService::new(self.db.clone())
    }

    /// One student's result for a partial of a class
    pub async fn partial_result(
        &self,
        student_id: Uuid,
        partial_id: Uuid,
        class_id: Uuid,
    ) -> AppResult<PartialResult> {
        let partial = self.catalog().get_partial(partial_id).await?;
        let enrollment = self
            .catalog()
            .find_enrollment(student_id, class_id, partial.period_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Enrollment".to_string()))?;

        let inputs = self
            .load_class_inputs(std::slice::from_ref(&partial), class_id, Some(student_id))
            .await?;
        let structure = structure_for(&inputs, partial_id)?;

        let result = compute_partial_result(
            student_id,
            enrollment.section_id,
            partial_id,
            class_id,
            structure,
            &inputs.evaluations,
            &inputs.scores,
        )?;

        tracing::debug!(
            "Student {} partial {} class {}: {} ({} of {} graded)",
            student_id,
            partial_id,
            class_id,
            result.weighted_total,
            result.graded_count,
            result.evaluation_count
        );
        Ok(result)
    }

    /// Per-student report for one partial of a class
    pub async fn partial_class_report(
        &self,
        partial_id: Uuid,
        class_id: Uuid,
    ) -> AppResult<PartialClassReport> {
        let catalog = self.catalog();
        let partial = catalog.get_partial(partial_id).await?;
        ensure_exists(catalog.class_exists(class_id).await?, "Class")?;
        let enrollments = catalog.class_enrollments(class_id, partial.period_id).await?;

        let inputs = self
            .load_class_inputs(std::slice::from_ref(&partial), class_id, None)
            .await?;
        let structure = structure_for(&inputs, partial_id)?;

        let results = compute_class_results(
            partial_id,
            class_id,
            structure,
            &enrollments,
            &inputs.evaluations,
            &inputs.scores,
        )?;
        let attendance = catalog.partial_attendance(class_id, partial_id).await?;

        let report = build_partial_class_report(
            partial_id,
            class_id,
            structure.is_default,
            &results,
            &attendance,
        )?;

        tracing::debug!(
            "Partial report for partial {} class {}: {} students, average {}",
            partial_id,
            class_id,
            report.rows.len(),
            report.average
        );
        Ok(report)
    }

    /// Evolution of a class across the partials of a period
    pub async fn class_period_report(
        &self,
        class_id: Uuid,
        period_id: Uuid,
    ) -> AppResult<ClassPeriodReport> {
        let catalog = self.catalog();
        catalog.get_period(period_id).await?;
        ensure_exists(catalog.class_exists(class_id).await?, "Class")?;
        let partials = catalog.list_partials(period_id).await?;
        let enrollments = catalog.class_enrollments(class_id, period_id).await?;

        let inputs = self.load_class_inputs(&partials, class_id, None).await?;

        let mut results = Vec::with_capacity(partials.len() * enrollments.len());
        for partial in &partials {
            let structure = structure_for(&inputs, partial.id)?;
            results.extend(compute_class_results(
                partial.id,
                class_id,
                structure,
                &enrollments,
                &inputs.evaluations,
                &inputs.scores,
            )?);
        }

        let attendance = catalog.class_attendance(class_id, period_id).await?;
        let report =
            build_class_period_report(class_id, period_id, &partials, &results, &attendance)?;

        tracing::debug!(
            "Class report for class {} period {}: {} partials, {} students",
            class_id,
            period_id,
            report.partials.len(),
            report.students.len()
        );
        Ok(report)
    }

    /// One student's classes across the partials of a period
    pub async fn student_period_report(
        &self,
        student_id: Uuid,
        period_id: Uuid,
    ) -> AppResult<StudentPeriodReport> {
        let catalog = self.catalog();
        catalog.get_period(period_id).await?;
        ensure_exists(catalog.student_exists(student_id).await?, "Student")?;
        let partials = catalog.list_partials(period_id).await?;
        let enrollments = catalog.student_enrollments(student_id, period_id).await?;

        let mut results = Vec::new();
        for enrollment in &enrollments {
            let inputs = self
                .load_class_inputs(&partials, enrollment.class_id, Some(student_id))
                .await?;
            for partial in &partials {
                let structure = structure_for(&inputs, partial.id)?;
                results.push(compute_partial_result(
                    student_id,
                    enrollment.section_id,
                    partial.id,
                    enrollment.class_id,
                    structure,
                    &inputs.evaluations,
                    &inputs.scores,
                )?);
            }
        }

        let class_ids: Vec<Uuid> = enrollments.iter().map(|e| e.class_id).collect();
        let attendance = catalog.student_attendance(student_id, period_id).await?;

        let report = build_student_period_report(
            student_id,
            period_id,
            &class_ids,
            &partials,
            &results,
            &attendance,
        )?;

        tracing::debug!(
            "Student report for student {} period {}: {} classes, average {}",
            student_id,
            period_id,
            report.rows.len(),
            report.overall_average
        );
        Ok(report)
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }

    /// Load structures, active evaluations and scores of a class for some partials
    async fn load_class_inputs(
        &self,
        partials: &[Partial],
        class_id: Uuid,
        student_id: Option<Uuid>,
    ) -> AppResult<ClassInputs> {
        let structure_service = StructureService::new(self.db.clone());
        let mut structures = HashMap::with_capacity(partials.len());
        for partial in partials {
            let structure = structure_service.get(partial.id, class_id).await?;
            structures.insert(partial.id, structure);
        }

        let partial_ids: Vec<Uuid> = partials.iter().map(|p| p.id).collect();
        let evaluations = EvaluationService::new(self.db.clone(), BudgetPolicy::default())
            .list_for_partials(&partial_ids, class_id)
            .await?;

        let evaluation_ids: Vec<Uuid> = evaluations.iter().map(|e| e.id).collect();
        let scores = ScoreService::new(self.db.clone())
            .scores_for(&evaluation_ids, student_id)
            .await?;

        Ok(ClassInputs {
            structures,
            evaluations,
            scores,
        })
    }
}

/// An unknown id is a 404, not an empty report
fn ensure_exists(exists: bool, resource: &str) -> AppResult<()> {
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(resource.to_string()))
    }
}

fn structure_for(inputs: &ClassInputs, partial_id: Uuid) -> AppResult<&ResolvedStructure> {
    inputs
        .structures
        .get(&partial_id)
        .ok_or_else(|| AppError::Internal(format!("No structure loaded for partial {}", partial_id)))
}
