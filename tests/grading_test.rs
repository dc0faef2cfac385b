mod common;

use chrono::Duration;
use common::{fixed_now, multiple_choice, question, quiz, start, three_question_quiz};
use quiz_engine::error::Error;
use quiz_engine::models::answer::{AnswerSubmission, AnswerValue};
use quiz_engine::models::attempt::AttemptStatus;
use quiz_engine::models::question::QuestionType;
use quiz_engine::services::grading_service::{
    GradingPolicy, GradingService, ManualGrading, TextMatch,
};
use quiz_engine::services::lifecycle_service::LifecycleService;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

fn choice(value: &str) -> AnswerValue {
    AnswerValue::MultipleChoice(value.to_string())
}

#[test]
fn partial_credit_scenario_passes() {
    let quiz = three_question_quiz();
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    let submission: AnswerSubmission = [
        (quiz.questions[0].id, choice("avoir")),
        (quiz.questions[2].id, choice("aller")),
    ]
    .into_iter()
    .collect();

    let result = GradingService::grade(
        &quiz,
        &mut attempt,
        &submission,
        120,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();

    assert_eq!(result.score, 3);
    assert_eq!(result.max_score, 4);
    assert_eq!(result.percentage, 75);
    assert!(result.passed);
    assert!(!result.breakdown[&quiz.questions[1].id].correct);
    assert_eq!(result.breakdown[&quiz.questions[2].id].awarded_points, 2);

    assert_eq!(attempt.status, AttemptStatus::Completed);
    assert_eq!(attempt.score, Some(3));
    assert_eq!(attempt.percentage, Some(75));
    assert_eq!(attempt.passed, Some(true));
    assert_eq!(attempt.completed_at, Some(fixed_now()));
    assert_eq!(attempt.time_spent, 120);
}

#[test]
fn empty_submission_scores_zero() {
    let quiz = three_question_quiz();
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);

    let result = GradingService::grade(
        &quiz,
        &mut attempt,
        &AnswerSubmission::new(),
        30,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();

    assert_eq!(result.score, 0);
    assert_eq!(result.percentage, 0);
    assert!(!result.passed);
    assert!(result.breakdown.values().all(|g| !g.correct && g.submitted_value.is_none()));
}

#[test]
fn passing_threshold_is_inclusive_and_fractional() {
    let mut quiz = three_question_quiz();
    quiz.passing_score = Decimal::new(755, 1);
    let submission: AnswerSubmission = [
        (quiz.questions[0].id, choice("avoir")),
        (quiz.questions[2].id, choice("aller")),
    ]
    .into_iter()
    .collect();

    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    let result = GradingService::grade(
        &quiz,
        &mut attempt,
        &submission,
        0,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();
    assert!(!result.passed);

    quiz.passing_score = Decimal::from(75);
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    let result = GradingService::grade(
        &quiz,
        &mut attempt,
        &submission,
        0,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();
    assert!(result.passed);
}

#[test]
fn true_false_is_case_insensitive() {
    let quiz = quiz(vec![question(
        QuestionType::TrueFalse,
        0,
        1,
        &["true", "false"],
        "true",
    )]);
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    let submission: AnswerSubmission = [(
        quiz.questions[0].id,
        AnswerValue::TrueFalse("TRUE".to_string()),
    )]
    .into_iter()
    .collect();

    let result = GradingService::grade(
        &quiz,
        &mut attempt,
        &submission,
        5,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();

    assert!(result.breakdown[&quiz.questions[0].id].correct);
    assert_eq!(result.percentage, 100);
}

#[test]
fn multiple_choice_requires_exact_match() {
    let quiz = quiz(vec![multiple_choice(0, 1, "être")]);
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    let submission: AnswerSubmission = [(quiz.questions[0].id, choice("Être"))]
        .into_iter()
        .collect();

    let result = GradingService::grade(
        &quiz,
        &mut attempt,
        &submission,
        5,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();

    assert!(!result.breakdown[&quiz.questions[0].id].correct);
}

#[test]
fn short_answer_follows_text_match_policy() {
    let quiz = quiz(vec![
        question(QuestionType::ShortAnswer, 0, 1, &[], "la maison"),
        question(QuestionType::FillInBlank, 1, 1, &[], "chat"),
    ]);
    let submission: AnswerSubmission = [
        (
            quiz.questions[0].id,
            AnswerValue::ShortAnswer("  La   Maison ".to_string()),
        ),
        (
            quiz.questions[1].id,
            AnswerValue::FillInBlank(" chat\t".to_string()),
        ),
    ]
    .into_iter()
    .collect();

    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    let lenient = GradingService::grade(
        &quiz,
        &mut attempt,
        &submission,
        0,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();
    assert_eq!(lenient.score, 2);

    let exact = GradingPolicy {
        text_match: TextMatch::Exact,
        ..GradingPolicy::default()
    };
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    let strict =
        GradingService::grade(&quiz, &mut attempt, &submission, 0, &exact, fixed_now()).unwrap();
    assert_eq!(strict.score, 1);
    assert!(strict.breakdown[&quiz.questions[1].id].correct);
}

#[test]
fn grading_is_order_independent() {
    let quiz = quiz(
        (0..9)
            .map(|i| multiple_choice(i, (i as u32 % 3) + 1, "faire"))
            .collect(),
    );
    let submission: AnswerSubmission = quiz
        .questions
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 2 == 0)
        .map(|(i, q)| (q.id, choice(if i % 4 == 0 { "faire" } else { "avoir" })))
        .collect();
    let template = start(&quiz, Uuid::new_v4(), &[]);

    let mut baseline_attempt = template.clone();
    let baseline = GradingService::grade(
        &quiz,
        &mut baseline_attempt,
        &submission,
        60,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..10 {
        let mut permuted = quiz.clone();
        permuted.questions.shuffle(&mut rng);
        let mut attempt = template.clone();
        let result = GradingService::grade(
            &permuted,
            &mut attempt,
            &submission,
            60,
            &GradingPolicy::default(),
            fixed_now(),
        )
        .unwrap();

        assert_eq!(result.score, baseline.score);
        assert_eq!(result.percentage, baseline.percentage);
        assert_eq!(result.passed, baseline.passed);
        assert_eq!(result.breakdown, baseline.breakdown);
    }
}

#[test]
fn second_grade_fails_and_leaves_attempt_unchanged() {
    let quiz = three_question_quiz();
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    let submission: AnswerSubmission = [(quiz.questions[0].id, choice("avoir"))]
        .into_iter()
        .collect();
    GradingService::grade(
        &quiz,
        &mut attempt,
        &submission,
        10,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();
    let completed = attempt.clone();

    let everything: AnswerSubmission = quiz
        .questions
        .iter()
        .map(|q| (q.id, choice(&q.correct_answer)))
        .collect();
    let err = GradingService::grade(
        &quiz,
        &mut attempt,
        &everything,
        10,
        &GradingPolicy::default(),
        fixed_now() + Duration::minutes(1),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidAttemptState {
            status: AttemptStatus::Completed
        }
    ));
    assert_eq!(attempt, completed);
}

#[test]
fn abandoned_attempt_cannot_be_graded() {
    let quiz = three_question_quiz();
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    LifecycleService::abandon(
        &mut attempt,
        None,
        quiz_engine::models::attempt::AbandonReason::Inactive,
        fixed_now(),
    )
    .unwrap();

    let err = GradingService::grade(
        &quiz,
        &mut attempt,
        &AnswerSubmission::new(),
        0,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidAttemptState {
            status: AttemptStatus::Abandoned
        }
    ));
}

#[test]
fn unknown_questions_are_ignored() {
    let quiz = three_question_quiz();
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    let stray = Uuid::new_v4();
    let submission: AnswerSubmission = [
        (quiz.questions[0].id, choice("avoir")),
        (stray, choice("avoir")),
    ]
    .into_iter()
    .collect();

    let result = GradingService::grade(
        &quiz,
        &mut attempt,
        &submission,
        0,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();

    assert_eq!(result.score, 1);
    assert_eq!(result.ignored_question_ids, vec![stray]);
    assert!(!result.breakdown.contains_key(&stray));
}

#[test]
fn mismatched_answer_type_is_rejected_without_mutation() {
    let quiz = three_question_quiz();
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    let before = attempt.clone();
    let submission: AnswerSubmission = [(
        quiz.questions[1].id,
        AnswerValue::ShortAnswer("être".to_string()),
    )]
    .into_iter()
    .collect();

    let err = GradingService::grade(
        &quiz,
        &mut attempt,
        &submission,
        0,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap_err();

    match err {
        Error::MalformedAnswer { question_id, .. } => assert_eq!(question_id, quiz.questions[1].id),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(attempt, before);
}

#[test]
fn non_boolean_true_false_answer_is_malformed() {
    let quiz = quiz(vec![question(
        QuestionType::TrueFalse,
        0,
        1,
        &["true", "false"],
        "false",
    )]);
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    let submission: AnswerSubmission = [(
        quiz.questions[0].id,
        AnswerValue::TrueFalse("maybe".to_string()),
    )]
    .into_iter()
    .collect();

    let err = GradingService::grade(
        &quiz,
        &mut attempt,
        &submission,
        0,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::MalformedAnswer { .. }));
    assert!(err.is_business_rule());
}

fn mixed_quiz() -> quiz_engine::models::quiz::QuizDefinition {
    quiz(vec![
        multiple_choice(0, 2, "avoir"),
        question(QuestionType::Essay, 1, 3, &[], ""),
        question(QuestionType::Matching, 2, 2, &[], ""),
        question(QuestionType::Hotspot, 3, 1, &[], ""),
    ])
}

fn mixed_submission(
    quiz: &quiz_engine::models::quiz::QuizDefinition,
) -> AnswerSubmission {
    let pairs: BTreeMap<String, String> =
        [("chien".to_string(), "dog".to_string())].into_iter().collect();
    [
        (quiz.questions[0].id, choice("avoir")),
        (
            quiz.questions[1].id,
            AnswerValue::Essay("Je suis allé au marché.".to_string()),
        ),
        (quiz.questions[2].id, AnswerValue::Matching(pairs)),
        (quiz.questions[3].id, AnswerValue::Hotspot { x: f64::NAN, y: 4.0 }),
    ]
    .into_iter()
    .collect()
}

#[test]
fn manual_types_are_excluded_by_default() {
    let quiz = mixed_quiz();
    let policy = GradingPolicy::default();
    let mut attempt = LifecycleService::start(
        &quiz,
        Uuid::new_v4(),
        &[],
        &policy,
        fixed_now(),
        &mut common::rng(),
    )
    .unwrap();

    let result = GradingService::grade(
        &quiz,
        &mut attempt,
        &mixed_submission(&quiz),
        40,
        &policy,
        fixed_now(),
    )
    .unwrap();

    assert_eq!(result.max_score, 2);
    assert_eq!(result.score, 2);
    assert_eq!(result.percentage, 100);
    assert!(result.needs_review);
    let essay = &result.breakdown[&quiz.questions[1].id];
    assert!(essay.needs_review);
    assert_eq!(essay.awarded_points, 0);
    assert!(essay.submitted_value.is_some());
    assert_eq!(result.outcomes.len(), 1);
}

#[test]
fn manual_types_credit_any_non_blank_answer_when_configured() {
    let quiz = mixed_quiz();
    let policy = GradingPolicy {
        manual_grading: ManualGrading::CreditAnyAnswer,
        ..GradingPolicy::default()
    };
    let mut attempt = LifecycleService::start(
        &quiz,
        Uuid::new_v4(),
        &[],
        &policy,
        fixed_now(),
        &mut common::rng(),
    )
    .unwrap();

    let result = GradingService::grade(
        &quiz,
        &mut attempt,
        &mixed_submission(&quiz),
        40,
        &policy,
        fixed_now(),
    )
    .unwrap();

    assert_eq!(result.max_score, 8);
    // Hotspot with a non-finite coordinate counts as blank.
    assert_eq!(result.score, 7);
    assert_eq!(result.percentage, 88);
    assert!(!result.needs_review);
    assert!(!result.breakdown[&quiz.questions[3].id].correct);
    assert_eq!(result.outcomes.len(), 4);
}

#[test]
fn time_spent_is_clamped_to_the_limit() {
    let mut quiz = three_question_quiz();
    quiz.time_limit = Some(5);
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);

    GradingService::grade(
        &quiz,
        &mut attempt,
        &AnswerSubmission::new(),
        10_000,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();
    assert_eq!(attempt.time_spent, 300);

    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    GradingService::grade(
        &quiz,
        &mut attempt,
        &AnswerSubmission::new(),
        -40,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();
    assert_eq!(attempt.time_spent, 0);
}

#[test]
fn zero_max_score_yields_zero_percentage() {
    let quiz = quiz(vec![question(QuestionType::Essay, 0, 4, &[], "")]);
    let mut attempt = start(&quiz, Uuid::new_v4(), &[]);
    assert_eq!(attempt.max_score, 0);

    let result = GradingService::grade(
        &quiz,
        &mut attempt,
        &AnswerSubmission::new(),
        0,
        &GradingPolicy::default(),
        fixed_now(),
    )
    .unwrap();

    assert_eq!(result.percentage, 0);
    assert_eq!(attempt.percentage, Some(0));
}
