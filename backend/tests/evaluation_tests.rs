//! Tests for the evaluation catalog and category budget validator

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    admit_evaluation, admit_in_views, summarize_budget, BudgetView, validate_evaluation, BudgetPolicy, BudgetStatus, Category,
    Evaluation, EvaluationDraft, EvaluationScope, EvaluationTipo, EvaluationUpdate, GradingError,
    Partial, RecordState, ResolvedStructure,
};
use uuid::Uuid;

/// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn partial() -> Partial {
    Partial {
        id: Uuid::new_v4(),
        period_id: Uuid::new_v4(),
        name: "Segundo parcial".to_string(),
        sequence: 2,
    }
}

fn draft_for(partial: &Partial, class_id: Option<Uuid>, tipo: EvaluationTipo, points: &str) -> EvaluationDraft {
    let starts_at = Utc::now();
    EvaluationDraft {
        title: "Laboratorio".to_string(),
        description: None,
        tipo,
        max_points: dec(points),
        scope: EvaluationScope {
            partial_id: partial.id,
            period_id: partial.period_id,
            class_id,
            section_id: None,
        },
        starts_at,
        closes_at: starts_at + Duration::hours(2),
    }
}

fn evaluation(partial: &Partial, class_id: Uuid, tipo: EvaluationTipo, points: &str) -> Evaluation {
    Evaluation::from_draft(
        Uuid::new_v4(),
        draft_for(partial, Some(class_id), tipo, points),
        Utc::now(),
    )
}

// =============================================================================
// Evaluation validation
// =============================================================================

mod evaluation_validation {
    use super::*;

    #[test]
    fn valid_draft_passes() {
        let p = partial();
        let draft = draft_for(&p, Some(Uuid::new_v4()), EvaluationTipo::Normal, "20");
        assert!(validate_evaluation(&draft, Some(&p)).is_ok());
    }

    #[test]
    fn closing_before_start_is_rejected() {
        let p = partial();
        let mut draft = draft_for(&p, None, EvaluationTipo::Normal, "20");
        draft.closes_at = draft.starts_at;
        let err = validate_evaluation(&draft, Some(&p)).unwrap_err();
        assert_eq!(err.violations()[0].field, "closes_at");
    }

    #[test]
    fn zero_points_is_rejected() {
        let p = partial();
        let draft = draft_for(&p, None, EvaluationTipo::Examen, "0");
        let err = validate_evaluation(&draft, Some(&p)).unwrap_err();
        assert_eq!(err.violations()[0].field, "max_points");
    }

    #[test]
    fn overlong_title_is_rejected() {
        let p = partial();
        let mut draft = draft_for(&p, None, EvaluationTipo::Normal, "10");
        draft.title = "t".repeat(201);
        let err = validate_evaluation(&draft, Some(&p)).unwrap_err();
        assert_eq!(err.violations()[0].field, "title");
    }

    #[test]
    fn section_without_class_is_rejected() {
        let p = partial();
        let mut draft = draft_for(&p, None, EvaluationTipo::Normal, "10");
        draft.scope.section_id = Some(Uuid::new_v4());
        let err = validate_evaluation(&draft, Some(&p)).unwrap_err();
        assert_eq!(err.violations()[0].field, "section_id");
    }

    #[test]
    fn field_errors_are_reported_together() {
        let p = partial();
        let mut draft = draft_for(&p, None, EvaluationTipo::Normal, "-1");
        draft.closes_at = draft.starts_at - Duration::minutes(5);
        match validate_evaluation(&draft, Some(&p)).unwrap_err() {
            GradingError::InvalidFields(v) => assert_eq!(v.len(), 2),
            other => panic!("expected InvalidFields, got {:?}", other),
        }
    }

    #[test]
    fn period_must_be_the_partials_parent() {
        let p = partial();
        let mut draft = draft_for(&p, None, EvaluationTipo::Normal, "10");
        draft.scope.period_id = Uuid::new_v4();
        match validate_evaluation(&draft, Some(&p)).unwrap_err() {
            GradingError::Referential(v) => assert_eq!(v.field, "period_id"),
            other => panic!("expected a referential error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_partial_is_referential() {
        let p = partial();
        let draft = draft_for(&p, None, EvaluationTipo::Normal, "10");
        match validate_evaluation(&draft, None).unwrap_err() {
            GradingError::Referential(v) => assert_eq!(v.field, "partial_id"),
            other => panic!("expected a referential error, got {:?}", other),
        }
    }

    #[test]
    fn tipo_maps_to_category() {
        let p = partial();
        let class_id = Uuid::new_v4();
        assert_eq!(evaluation(&p, class_id, EvaluationTipo::Normal, "5").category, Category::Acumulativo);
        assert_eq!(evaluation(&p, class_id, EvaluationTipo::Examen, "5").category, Category::Examen);
        assert_eq!(evaluation(&p, class_id, EvaluationTipo::Reposicion, "5").category, Category::Reposicion);
    }
}

// =============================================================================
// Category lock
// =============================================================================

mod category_lock {
    use super::*;

    fn update(evaluation: &Evaluation, tipo: Option<EvaluationTipo>) -> EvaluationUpdate {
        EvaluationUpdate {
            title: evaluation.title.clone(),
            description: evaluation.description.clone(),
            tipo,
            max_points: evaluation.max_points,
            scope: evaluation.scope,
            starts_at: evaluation.starts_at,
            closes_at: evaluation.closes_at,
        }
    }

    #[test]
    fn changing_category_on_edit_is_rejected() {
        let e = evaluation(&partial(), Uuid::new_v4(), EvaluationTipo::Normal, "10");
        let err = e.apply_update(update(&e, Some(EvaluationTipo::Examen)), Utc::now()).unwrap_err();
        assert!(matches!(err, GradingError::Validation(ref v) if v.field == "tipo"));
    }

    #[test]
    fn restating_category_is_allowed() {
        let e = evaluation(&partial(), Uuid::new_v4(), EvaluationTipo::Normal, "10");
        let edited = e.apply_update(update(&e, Some(EvaluationTipo::Normal)), Utc::now()).unwrap();
        assert_eq!(edited.category, Category::Acumulativo);
    }
}

// =============================================================================
// Category budget
// =============================================================================

mod category_budget {
    use super::*;

    fn setup() -> (Partial, Uuid, ResolvedStructure) {
        let p = partial();
        let class_id = Uuid::new_v4();
        let structure = ResolvedStructure::resolve(p.id, class_id, None);
        (p, class_id, structure)
    }

    #[test]
    fn budget_reports_incomplete_complete_and_exceeds() {
        let (p, class_id, structure) = setup();
        let evaluations = vec![
            evaluation(&p, class_id, EvaluationTipo::Normal, "30"),
            evaluation(&p, class_id, EvaluationTipo::Examen, "40"),
            evaluation(&p, class_id, EvaluationTipo::Reposicion, "5"),
        ];
        let summary = summarize_budget(&structure, &evaluations, None);
        assert_eq!(summary.category(Category::Acumulativo).unwrap().status, BudgetStatus::Incomplete);
        assert_eq!(summary.category(Category::Examen).unwrap().status, BudgetStatus::Complete);
        assert_eq!(summary.category(Category::Reposicion).unwrap().status, BudgetStatus::Exceeds);
        assert!(summary.structure_is_default);
    }

    #[test]
    fn partial_wide_evaluations_count_for_every_class() {
        let (p, _, structure) = setup();
        let shared_exam = Evaluation::from_draft(
            Uuid::new_v4(),
            draft_for(&p, None, EvaluationTipo::Examen, "25"),
            Utc::now(),
        );
        let summary = summarize_budget(&structure, &[shared_exam], None);
        let exam = summary.category(Category::Examen).unwrap();
        assert_eq!(exam.assigned_points, dec("25"));
        assert_eq!(exam.remaining, dec("15"));
    }

    #[test]
    fn section_evaluations_only_count_in_their_section() {
        let (p, class_id, structure) = setup();
        let section_id = Uuid::new_v4();
        let mut draft = draft_for(&p, Some(class_id), EvaluationTipo::Normal, "20");
        draft.scope.section_id = Some(section_id);
        let section_eval = Evaluation::from_draft(Uuid::new_v4(), draft, Utc::now());
        let evaluations = vec![section_eval];

        let class_view = summarize_budget(&structure, &evaluations, None);
        assert_eq!(class_view.category(Category::Acumulativo).unwrap().assigned_points, Decimal::ZERO);

        let section_view = summarize_budget(&structure, &evaluations, Some(section_id));
        assert_eq!(section_view.category(Category::Acumulativo).unwrap().assigned_points, dec("20"));
    }

    #[test]
    fn deactivated_evaluations_free_their_points() {
        let (p, class_id, structure) = setup();
        let mut exam = evaluation(&p, class_id, EvaluationTipo::Examen, "40");
        exam.state = RecordState::Inactive;
        let summary = summarize_budget(&structure, &[exam], None);
        assert_eq!(summary.category(Category::Examen).unwrap().remaining, dec("40"));
    }

    #[test]
    fn advisory_mode_saves_and_reports_overshoot() {
        let (p, class_id, structure) = setup();
        let existing = vec![evaluation(&p, class_id, EvaluationTipo::Normal, "50")];
        let candidate = evaluation(&p, class_id, EvaluationTipo::Normal, "20");
        let after = admit_evaluation(&structure, &existing, &candidate, BudgetPolicy::Advisory).unwrap();
        let acum = after.category(Category::Acumulativo).unwrap();
        assert_eq!(acum.status, BudgetStatus::Exceeds);
        assert_eq!(acum.remaining, dec("-10"));
    }

    #[test]
    fn strict_mode_blocks_overshoot() {
        let (p, class_id, structure) = setup();
        let existing = vec![evaluation(&p, class_id, EvaluationTipo::Normal, "50")];
        let candidate = evaluation(&p, class_id, EvaluationTipo::Normal, "20");
        assert!(admit_evaluation(&structure, &existing, &candidate, BudgetPolicy::Strict).is_err());
    }

    #[test]
    fn strict_mode_blocks_partial_wide_overshoot_in_any_class() {
        let p = partial();
        let (open_class, full_class) = (Uuid::new_v4(), Uuid::new_v4());
        let open = ResolvedStructure::resolve(p.id, open_class, None);
        let full = ResolvedStructure::resolve(p.id, full_class, None);
        let existing = vec![evaluation(&p, full_class, EvaluationTipo::Examen, "40")];
        let partial_wide = Evaluation::from_draft(
            Uuid::new_v4(),
            draft_for(&p, None, EvaluationTipo::Examen, "10"),
            Utc::now(),
        );
        let views = [
            BudgetView { structure: &open, section_id: None },
            BudgetView { structure: &full, section_id: None },
        ];

        let err = admit_in_views(&views, &existing, &partial_wide, BudgetPolicy::Strict).unwrap_err();
        assert!(err.violations()[0].message.contains(&full_class.to_string()));
        assert!(admit_in_views(&views, &existing, &partial_wide, BudgetPolicy::Advisory).is_ok());
    }

    #[test]
    fn strict_mode_blocks_class_wide_overshoot_in_a_section() {
        let (p, class_id, structure) = setup();
        let section_id = Uuid::new_v4();
        let mut draft = draft_for(&p, Some(class_id), EvaluationTipo::Examen, "40");
        draft.scope.section_id = Some(section_id);
        let section_exam = Evaluation::from_draft(Uuid::new_v4(), draft, Utc::now());
        let class_exam = evaluation(&p, class_id, EvaluationTipo::Examen, "1");
        let views = [
            BudgetView { structure: &structure, section_id: None },
            BudgetView { structure: &structure, section_id: Some(section_id) },
        ];

        assert!(admit_in_views(&views, &[section_exam], &class_exam, BudgetPolicy::Strict).is_err());
    }

    #[test]
    fn strict_mode_allows_shrinking_an_overshooting_evaluation() {
        let (p, class_id, structure) = setup();
        let original = evaluation(&p, class_id, EvaluationTipo::Examen, "60");
        let mut shrunk = original.clone();
        shrunk.max_points = dec("50");
        let after = admit_evaluation(&structure, &[original], &shrunk, BudgetPolicy::Strict).unwrap();
        assert_eq!(after.category(Category::Examen).unwrap().status, BudgetStatus::Exceeds);
    }
}

// =============================================================================
// Property tests
// =============================================================================

proptest! {
    /// remaining = limit - assigned for every category, whatever the evaluations
    #[test]
    fn prop_remaining_is_limit_minus_assigned(points in prop::collection::vec((0usize..3, 1i64..=5_000), 0..12)) {
        let p = partial();
        let class_id = Uuid::new_v4();
        let structure = ResolvedStructure::resolve(p.id, class_id, None);
        let tipos = [EvaluationTipo::Normal, EvaluationTipo::Examen, EvaluationTipo::Reposicion];
        let evaluations: Vec<Evaluation> = points
            .iter()
            .map(|(t, cents)| evaluation(&p, class_id, tipos[*t], &Decimal::new(*cents, 2).to_string()))
            .collect();

        let summary = summarize_budget(&structure, &evaluations, None);
        for budget in &summary.categories {
            let assigned: Decimal = evaluations
                .iter()
                .filter(|e| e.category == budget.category)
                .map(|e| e.max_points)
                .sum();
            prop_assert_eq!(budget.assigned_points, assigned);
            prop_assert_eq!(budget.remaining, budget.limit - assigned);
            prop_assert_eq!(budget.status, BudgetStatus::from_remaining(budget.remaining));
        }
    }
}
