//! Validation rules of the grading engine
//!
//! Rules never coerce: a weight sum of 99.5 is rejected, not rounded up.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use validator::Validate;

use crate::error::{FieldViolation, GradingError, GradingResult};
use crate::models::{
    CategoryWeights, EvaluationFields, Partial, ScoreLimits, StructureInput,
};
use crate::types::{MAX_POINTS_VALUE, POINTS_SCALE, WEIGHT_EPSILON};

// ============================================================================
// Grading Structure Validations
// ============================================================================

/// Reject values with more than [`POINTS_SCALE`] decimal places.
///
/// Stored weights and points keep two decimals; finer input would be rounded
/// by the store instead of rejected here.
fn check_scale(field: &str, value: Decimal) -> Option<FieldViolation> {
    (value.normalize().scale() > POINTS_SCALE).then(|| {
        FieldViolation::new(
            field,
            format!("{} can have at most {} decimal places", value, POINTS_SCALE),
            format!("{} admite como máximo {} decimales", value, POINTS_SCALE),
        )
    })
}

/// Reject point values above [`MAX_POINTS_VALUE`]
fn check_points_ceiling(field: &str, value: Decimal) -> Option<FieldViolation> {
    (value > MAX_POINTS_VALUE).then(|| {
        FieldViolation::new(
            field,
            format!("Value cannot exceed {}, got {}", MAX_POINTS_VALUE, value),
            format!("El valor no puede superar {}, se recibió {}", MAX_POINTS_VALUE, value),
        )
    })
}

/// Whether the three weights add up to 100 within [`WEIGHT_EPSILON`]
pub fn weights_sum_to_hundred(weights: &CategoryWeights) -> bool {
    (weights.total() - Decimal::ONE_HUNDRED).abs() <= WEIGHT_EPSILON
}

/// Check each weight is a percentage and that together they make 100
pub fn validate_weights(weights: &CategoryWeights) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    let fields = [
        ("weights.acumulativo", weights.acumulativo),
        ("weights.examen", weights.examen),
        ("weights.reposicion", weights.reposicion),
    ];
    for (field, value) in fields {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            violations.push(FieldViolation::new(
                field,
                format!("Weight must be between 0 and 100, got {}", value),
                format!("El peso debe estar entre 0 y 100, se recibió {}", value),
            ));
        }
        violations.extend(check_scale(field, value));
    }

    if !weights_sum_to_hundred(weights) {
        violations.push(FieldViolation::new(
            "weights",
            format!("Weights must sum to 100, got {}", weights.total()),
            format!("Los pesos deben sumar 100, suman {}", weights.total()),
        ));
    }

    violations
}

/// Check the score ceiling and pass mark of a partial
pub fn validate_limits(limits: &ScoreLimits) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    if limits.max_partial_score <= Decimal::ZERO {
        violations.push(FieldViolation::new(
            "max_partial_score",
            "Maximum partial score must be positive",
            "La nota máxima del parcial debe ser positiva",
        ));
    }
    violations.extend(check_points_ceiling("max_partial_score", limits.max_partial_score));
    violations.extend(check_scale("max_partial_score", limits.max_partial_score));

    if limits.min_passing_score <= Decimal::ZERO {
        violations.push(FieldViolation::new(
            "min_passing_score",
            "Minimum passing score must be positive",
            "La nota mínima de aprobación debe ser positiva",
        ));
    }
    violations.extend(check_scale("min_passing_score", limits.min_passing_score));

    if limits.min_passing_score > limits.max_partial_score {
        violations.push(FieldViolation::new(
            "min_passing_score",
            format!(
                "Minimum passing score {} cannot exceed maximum partial score {}",
                limits.min_passing_score, limits.max_partial_score
            ),
            format!(
                "La nota mínima {} no puede superar la nota máxima {}",
                limits.min_passing_score, limits.max_partial_score
            ),
        ));
    }

    violations
}

/// Validate a full structure replacement, reporting every violated rule
pub fn validate_structure_input(input: &StructureInput) -> GradingResult<()> {
    let mut violations = validate_weights(&input.weights);
    violations.extend(validate_limits(&input.limits));

    if let Some(notes) = &input.notes {
        if notes.chars().count() > 2000 {
            violations.push(FieldViolation::new(
                "notes",
                "Notes must be at most 2000 characters",
                "Las notas deben tener como máximo 2000 caracteres",
            ));
        }
    }

    match GradingError::from_violations(violations) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ============================================================================
// Evaluation Validations
// ============================================================================

/// Validate an evaluation draft or update against its partial.
///
/// Field rules are checked first and reported together. The partial/period
/// agreement is checked afterwards and reported as a referential error.
/// `partial` is `None` when the referenced partial does not exist.
pub fn validate_evaluation<F>(input: &F, partial: Option<&Partial>) -> GradingResult<()>
where
    F: EvaluationFields + Validate,
{
    let mut violations = declarative_violations(input);

    if input.title().trim().is_empty() && !violations.iter().any(|v| v.field == "title") {
        violations.push(FieldViolation::new(
            "title",
            "Title is required",
            "El título es obligatorio",
        ));
    }

    if input.max_points() <= Decimal::ZERO {
        violations.push(FieldViolation::new(
            "max_points",
            "Maximum points must be greater than 0",
            "El puntaje máximo debe ser mayor que 0",
        ));
    }
    violations.extend(check_points_ceiling("max_points", input.max_points()));
    violations.extend(check_scale("max_points", input.max_points()));

    let (starts_at, closes_at) = input.window();
    if closes_at <= starts_at {
        violations.push(FieldViolation::new(
            "closes_at",
            "Closing time must be after the start time",
            "La fecha de cierre debe ser posterior a la de inicio",
        ));
    }

    let scope = input.scope();
    if scope.section_id.is_some() && scope.class_id.is_none() {
        violations.push(FieldViolation::new(
            "section_id",
            "A section can only be set together with its class",
            "Solo se puede indicar una sección junto con su clase",
        ));
    }

    if let Some(err) = GradingError::from_violations(violations) {
        return Err(err);
    }

    let partial = partial.ok_or_else(|| {
        GradingError::referential(
            "partial_id",
            format!("Partial {} does not exist", scope.partial_id),
            format!("El parcial {} no existe", scope.partial_id),
        )
    })?;

    if partial.id != scope.partial_id {
        return Err(GradingError::Precondition(format!(
            "partial lookup returned {} for requested {}",
            partial.id, scope.partial_id
        )));
    }

    if partial.period_id != scope.period_id {
        return Err(GradingError::referential(
            "period_id",
            format!(
                "Period {} is not the parent period of partial {}",
                scope.period_id, partial.id
            ),
            format!(
                "El periodo {} no es el periodo del parcial {}",
                scope.period_id, partial.id
            ),
        ));
    }

    Ok(())
}

/// Collect the derive-based rules of an input into field violations
fn declarative_violations<V: Validate>(input: &V) -> Vec<FieldViolation> {
    let errors = match input.validate() {
        Ok(()) => return Vec::new(),
        Err(errors) => errors,
    };

    let mut violations: Vec<FieldViolation> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                FieldViolation::new(
                    field,
                    message,
                    format!("Valor inválido para {} ({})", field, e.code),
                )
            })
        })
        .collect();
    violations.sort_by(|a, b| a.field.cmp(&b.field));
    violations
}

// ============================================================================
// Score Validations
// ============================================================================

/// Read a submitted raw score as a number.
///
/// Anything other than a JSON number (strings, `null`, a missing value) is a
/// field violation so that bulk submissions can itemize it.
pub fn raw_score_number(value: &serde_json::Value) -> GradingResult<f64> {
    value.as_f64().ok_or_else(|| {
        GradingError::validation(
            "raw_score",
            format!("Score must be a number, got {}", value),
            format!("La nota debe ser un número, se recibió {}", value),
        )
    })
}

/// Validate a submitted raw score value against an evaluation's maximum
pub fn validate_raw_value(value: &serde_json::Value, max_points: Decimal) -> GradingResult<Decimal> {
    validate_raw_score(raw_score_number(value)?, max_points)
}

/// Validate a raw score against an evaluation's maximum.
///
/// Checks, in order: the value is a finite number, it is not negative, and
/// it does not exceed `max_points`. Returns the score as a decimal.
pub fn validate_raw_score(raw_score: f64, max_points: Decimal) -> GradingResult<Decimal> {
    if !raw_score.is_finite() {
        return Err(GradingError::validation(
            "raw_score",
            "Score must be a finite number",
            "La nota debe ser un número finito",
        ));
    }

    if raw_score < 0.0 {
        return Err(GradingError::validation(
            "raw_score",
            "Score cannot be negative",
            "La nota no puede ser negativa",
        ));
    }

    // finite and non-negative, so only magnitudes beyond Decimal fail here
    let score = Decimal::from_f64(raw_score).filter(|score| *score <= max_points);

    match score {
        Some(score) => Ok(score.normalize()),
        None => Err(GradingError::validation(
            "raw_score",
            format!("Score cannot exceed the maximum of {} points", max_points),
            format!("La nota no puede superar el máximo de {} puntos", max_points),
        )),
    }
}
