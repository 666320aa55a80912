//! Report building
//!
//! Read-only projections over already computed [`PartialResult`]s and the
//! attendance collaborator's figures. Empty input yields empty rows and zero
//! aggregates, never an error; handing in results that belong to another
//! report is a precondition failure.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{GradingError, GradingResult};
use crate::models::{
    AttendanceSummary, Category, ClassPartialRow, ClassPeriodReport, ClassStudentRow, Partial,
    PartialClassReport, PartialClassRow, PartialResult, PartialTotal, StudentPeriodReport,
    StudentPeriodRow,
};
use crate::types::{mean, round_average};

/// Attendance entry for a student in a class, preferring the partial's own
/// figures over period-wide ones
fn find_attendance<'a>(
    attendance: &'a [AttendanceSummary],
    student_id: Uuid,
    class_id: Uuid,
    partial_id: Option<Uuid>,
) -> Option<&'a AttendanceSummary> {
    let mut fallback = None;
    for a in attendance
        .iter()
        .filter(|a| a.student_id == student_id && a.class_id == class_id)
    {
        if partial_id.is_some() && a.partial_id == partial_id {
            return Some(a);
        }
        if a.partial_id.is_none() {
            fallback = Some(a);
        }
    }
    fallback
}

/// Ensure every partial belongs to the period and return them by sequence
fn ordered_partials(period_id: Uuid, partials: &[Partial]) -> GradingResult<Vec<&Partial>> {
    if let Some(stray) = partials.iter().find(|p| p.period_id != period_id) {
        return Err(GradingError::Precondition(format!(
            "partial {} belongs to period {}, not {}",
            stray.id, stray.period_id, period_id
        )));
    }
    let mut ordered: Vec<&Partial> = partials.iter().collect();
    ordered.sort_by_key(|p| p.sequence);
    Ok(ordered)
}

fn unknown_partial(result: &PartialResult) -> GradingError {
    GradingError::Precondition(format!(
        "result for partial {} does not belong to the requested period",
        result.partial_id
    ))
}

/// Average and pass flag of a set of partial results.
///
/// The pass mark is the mean of the contributing partials' pass marks.
fn summarize_results(results: &[&PartialResult]) -> (Decimal, bool) {
    if results.is_empty() {
        return (Decimal::ZERO, false);
    }
    let average = mean(results.iter().map(|r| r.weighted_total));
    let threshold = mean(results.iter().map(|r| r.min_passing_score));
    (average, average >= threshold)
}

// ============================================================================
// Partial x Class
// ============================================================================

/// One row per student with their weighted total and attendance marks
pub fn build_partial_class_report(
    partial_id: Uuid,
    class_id: Uuid,
    structure_is_default: bool,
    results: &[PartialResult],
    attendance: &[AttendanceSummary],
) -> GradingResult<PartialClassReport> {
    let mut rows = Vec::with_capacity(results.len());

    for result in results {
        if result.partial_id != partial_id || result.class_id != class_id {
            return Err(GradingError::Precondition(format!(
                "result for partial {} / class {} supplied for partial {} / class {}",
                result.partial_id, result.class_id, partial_id, class_id
            )));
        }

        let marks = find_attendance(attendance, result.student_id, class_id, Some(partial_id));
        rows.push(PartialClassRow {
            student_id: result.student_id,
            acumulativo: result.category_points(Category::Acumulativo),
            examen: result.category_points(Category::Examen),
            reposicion: result.category_points(Category::Reposicion),
            weighted_total: result.weighted_total,
            passed: result.passed,
            attendance_percentage: marks.map(|a| a.percentage),
            present: marks.map(|a| a.present).unwrap_or(0),
            absent: marks.map(|a| a.absent).unwrap_or(0),
            late: marks.map(|a| a.late).unwrap_or(0),
        });
    }

    let passed_count = rows.iter().filter(|r| r.passed).count();
    let average = round_average(mean(rows.iter().map(|r| r.weighted_total)));

    Ok(PartialClassReport {
        partial_id,
        class_id,
        failed_count: rows.len() - passed_count,
        passed_count,
        average,
        rows,
        structure_is_default,
    })
}

// ============================================================================
// Class x Period
// ============================================================================

/// Per-partial class averages plus per-student period averages
pub fn build_class_period_report(
    class_id: Uuid,
    period_id: Uuid,
    partials: &[Partial],
    results: &[PartialResult],
    attendance: &[AttendanceSummary],
) -> GradingResult<ClassPeriodReport> {
    let ordered = ordered_partials(period_id, partials)?;
    let known: HashSet<Uuid> = ordered.iter().map(|p| p.id).collect();

    let mut by_student: Vec<(Uuid, Vec<&PartialResult>)> = Vec::new();
    let mut student_index: HashMap<Uuid, usize> = HashMap::new();
    let mut by_partial: HashMap<Uuid, Vec<&PartialResult>> = HashMap::new();

    for result in results {
        if result.class_id != class_id {
            return Err(GradingError::Precondition(format!(
                "result for class {} supplied for class {}",
                result.class_id, class_id
            )));
        }
        if !known.contains(&result.partial_id) {
            return Err(unknown_partial(result));
        }

        by_partial.entry(result.partial_id).or_default().push(result);
        let idx = *student_index.entry(result.student_id).or_insert_with(|| {
            by_student.push((result.student_id, Vec::new()));
            by_student.len() - 1
        });
        by_student[idx].1.push(result);
    }

    let partial_rows: Vec<ClassPartialRow> = ordered
        .iter()
        .map(|p| {
            let rs = by_partial.get(&p.id).map(Vec::as_slice).unwrap_or(&[]);
            ClassPartialRow {
                partial_id: p.id,
                partial_name: p.name.clone(),
                sequence: p.sequence,
                average: round_average(mean(rs.iter().map(|r| r.weighted_total))),
                student_count: rs.len(),
                passed_count: rs.iter().filter(|r| r.passed).count(),
            }
        })
        .collect();

    let mut student_averages = Vec::with_capacity(by_student.len());
    let student_rows: Vec<ClassStudentRow> = by_student
        .iter()
        .map(|(student_id, rs)| {
            let (average, passed) = summarize_results(rs);
            student_averages.push(average);
            ClassStudentRow {
                student_id: *student_id,
                average: round_average(average),
                attendance_percentage: find_attendance(attendance, *student_id, class_id, None)
                    .map(|a| a.percentage),
                passed,
            }
        })
        .collect();

    let passed_count = student_rows.iter().filter(|r| r.passed).count();

    Ok(ClassPeriodReport {
        class_id,
        period_id,
        partials: partial_rows,
        class_average: round_average(mean(student_averages)),
        failed_count: student_rows.len() - passed_count,
        passed_count,
        students: student_rows,
    })
}

// ============================================================================
// Student x Period
// ============================================================================

/// One row per class the student is enrolled in during the period.
///
/// `class_ids` lists the enrolled classes so a class without results still
/// gets a (zeroed) row. Only rows with at least one partial count towards
/// the overall average and the passed/failed tallies.
pub fn build_student_period_report(
    student_id: Uuid,
    period_id: Uuid,
    class_ids: &[Uuid],
    partials: &[Partial],
    results: &[PartialResult],
    attendance: &[AttendanceSummary],
) -> GradingResult<StudentPeriodReport> {
    let ordered = ordered_partials(period_id, partials)?;
    let sequence: HashMap<Uuid, i32> = ordered.iter().map(|p| (p.id, p.sequence)).collect();

    let mut by_class: HashMap<Uuid, Vec<&PartialResult>> = HashMap::new();
    for result in results {
        if result.student_id != student_id {
            return Err(GradingError::Precondition(format!(
                "result for student {} supplied for student {}",
                result.student_id, student_id
            )));
        }
        if !sequence.contains_key(&result.partial_id) {
            return Err(unknown_partial(result));
        }
        if !class_ids.contains(&result.class_id) {
            return Err(GradingError::Precondition(format!(
                "result for class {} but student {} is not enrolled in it",
                result.class_id, student_id
            )));
        }
        by_class.entry(result.class_id).or_default().push(result);
    }

    let mut rows = Vec::with_capacity(class_ids.len());
    for class_id in class_ids {
        let mut rs = by_class.remove(class_id).unwrap_or_default();
        rs.sort_by_key(|r| sequence.get(&r.partial_id).copied().unwrap_or(i32::MAX));

        let (average, passed) = summarize_results(&rs);
        rows.push(StudentPeriodRow {
            class_id: *class_id,
            partials: rs
                .iter()
                .map(|r| PartialTotal {
                    partial_id: r.partial_id,
                    sequence: sequence.get(&r.partial_id).copied().unwrap_or_default(),
                    weighted_total: r.weighted_total,
                    passed: r.passed,
                })
                .collect(),
            average: round_average(average),
            latest: rs.last().map(|r| r.weighted_total),
            attendance_percentage: find_attendance(attendance, student_id, *class_id, None)
                .map(|a| a.percentage),
            passed,
        });
    }

    let graded_rows: Vec<&StudentPeriodRow> = rows.iter().filter(|r| !r.partials.is_empty()).collect();
    let classes_passed = graded_rows.iter().filter(|r| r.passed).count();

    Ok(StudentPeriodReport {
        student_id,
        period_id,
        overall_average: round_average(mean(graded_rows.iter().map(|r| r.average))),
        classes_failed: graded_rows.len() - classes_passed,
        classes_passed,
        rows,
    })
}
