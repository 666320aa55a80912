//! WebAssembly module for the Academic Console
//!
//! Lets the console preview grading rules client-side with exactly the
//! server's logic:
//! - Grading structure validation and category limits
//! - Category budget status while planning evaluations
//! - Raw score bounds
//! - A student's partial total before scores are saved

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

use shared::{
    compute_partial_result, summarize_budget, validate_limits, validate_raw_score,
    validate_weights, BudgetSummary, Category, Evaluation, EvaluationTipo, FieldViolation,
    GradingStructure, PartialResult, ResolvedStructure, StructureInput, StudentScore,
};

fn js_error(message: String) -> JsValue {
    js_sys::Error::new(&message).into()
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization failed: {}", e))
}

fn parse_json<T: serde::de::DeserializeOwned>(what: &str, json: &str) -> Result<T, String> {
    serde_json::from_str(json).map_err(|e| format!("Invalid {} JSON: {}", what, e))
}

fn parse_id(what: &str, id: &str) -> Result<Uuid, String> {
    Uuid::parse_str(id).map_err(|e| format!("Invalid {}: {}", what, e))
}

fn parse_optional_id(what: &str, id: Option<String>) -> Result<Option<Uuid>, String> {
    match id.as_deref() {
        None | Some("") => Ok(None),
        Some(id) => parse_id(what, id).map(Some),
    }
}

// ============================================================================
// Grading structure
// ============================================================================

fn structure_violations(input_json: &str) -> Result<Vec<FieldViolation>, String> {
    let input: StructureInput = parse_json("structure", input_json)?;
    let mut violations = validate_weights(&input.weights);
    violations.extend(validate_limits(&input.limits));
    Ok(violations)
}

/// Validate a grading structure form; returns a JSON array of violations,
/// empty when the structure can be saved
#[wasm_bindgen]
pub fn check_grading_structure(input_json: &str) -> Result<String, JsValue> {
    structure_violations(input_json)
        .and_then(|v| to_json(&v))
        .map_err(js_error)
}

/// Point budget of a category: `weight`% of the partial's maximum score
#[wasm_bindgen]
pub fn category_limit(weight: f64, max_partial_score: f64) -> f64 {
    match (Decimal::from_f64(weight), Decimal::from_f64(max_partial_score)) {
        (Some(w), Some(max)) => (w / Decimal::ONE_HUNDRED * max).to_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

// ============================================================================
// Category budget
// ============================================================================

fn resolve_structure(
    partial_id: Uuid,
    class_id: Uuid,
    structure_json: &str,
) -> Result<ResolvedStructure, String> {
    let stored: Option<GradingStructure> = parse_json("structure", structure_json)?;
    Ok(ResolvedStructure::resolve(partial_id, class_id, stored))
}

fn budget_preview(
    partial_id: &str,
    class_id: &str,
    structure_json: &str,
    evaluations_json: &str,
    section_id: Option<String>,
) -> Result<BudgetSummary, String> {
    let partial_id = parse_id("partial id", partial_id)?;
    let class_id = parse_id("class id", class_id)?;
    let section_id = parse_optional_id("section id", section_id)?;
    let structure = resolve_structure(partial_id, class_id, structure_json)?;
    let evaluations: Vec<Evaluation> = parse_json("evaluations", evaluations_json)?;

    Ok(summarize_budget(&structure, &evaluations, section_id))
}

/// Budget status of every category for a set of evaluations.
///
/// `structure_json` may be `null` to preview against the default structure.
#[wasm_bindgen]
pub fn preview_budget(
    partial_id: &str,
    class_id: &str,
    structure_json: &str,
    evaluations_json: &str,
    section_id: Option<String>,
) -> Result<String, JsValue> {
    let summary = budget_preview(partial_id, class_id, structure_json, evaluations_json, section_id)
        .map_err(js_error)?;

    #[cfg(target_arch = "wasm32")]
    if summary.any_exceeded() {
        web_sys::console::warn_1(&JsValue::from_str("A category is over its point budget"));
    }

    to_json(&summary).map_err(js_error)
}

// ============================================================================
// Scores
// ============================================================================

fn raw_score_violation(raw_score: f64, max_points: f64) -> Option<FieldViolation> {
    let max_points = Decimal::from_f64(max_points).unwrap_or(Decimal::ZERO);
    validate_raw_score(raw_score, max_points)
        .err()
        .and_then(|e| e.violations().into_iter().next())
}

/// Check a raw score before submitting it; returns the English error
/// message, or nothing when the score is valid
#[wasm_bindgen]
pub fn check_raw_score(raw_score: f64, max_points: f64) -> Option<String> {
    raw_score_violation(raw_score, max_points).map(|v| v.message)
}

/// Category an evaluation type feeds (`NORMAL` feeds `ACUMULATIVO`)
#[wasm_bindgen]
pub fn evaluation_category(tipo: &str) -> Option<String> {
    let tipo: EvaluationTipo = serde_json::from_value(serde_json::Value::String(tipo.to_string())).ok()?;
    Some(Category::from(tipo).as_str().to_string())
}

// ============================================================================
// Partial result
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn partial_result_preview(
    student_id: &str,
    section_id: Option<String>,
    partial_id: &str,
    class_id: &str,
    structure_json: &str,
    evaluations_json: &str,
    scores_json: &str,
) -> Result<PartialResult, String> {
    let student_id = parse_id("student id", student_id)?;
    let section_id = parse_optional_id("section id", section_id)?;
    let partial_id = parse_id("partial id", partial_id)?;
    let class_id = parse_id("class id", class_id)?;
    let structure = resolve_structure(partial_id, class_id, structure_json)?;
    let evaluations: Vec<Evaluation> = parse_json("evaluations", evaluations_json)?;
    let scores: Vec<StudentScore> = parse_json("scores", scores_json)?;

    compute_partial_result(
        student_id,
        section_id,
        partial_id,
        class_id,
        &structure,
        &evaluations,
        &scores,
    )
    .map_err(|e| e.to_string())
}

/// A student's partial total from unsaved scores
#[wasm_bindgen]
pub fn preview_partial_result(
    student_id: &str,
    section_id: Option<String>,
    partial_id: &str,
    class_id: &str,
    structure_json: &str,
    evaluations_json: &str,
    scores_json: &str,
) -> Result<String, JsValue> {
    partial_result_preview(
        student_id,
        section_id,
        partial_id,
        class_id,
        structure_json,
        evaluations_json,
        scores_json,
    )
    .and_then(|r| to_json(&r))
    .map_err(js_error)
}
