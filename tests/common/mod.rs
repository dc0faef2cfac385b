#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use quiz_engine::models::attempt::QuizAttempt;
use quiz_engine::models::item_stats::ItemStatistics;
use quiz_engine::models::question::{QuestionType, QuizQuestion};
use quiz_engine::models::quiz::QuizDefinition;
use quiz_engine::services::grading_service::GradingPolicy;
use quiz_engine::services::lifecycle_service::LifecycleService;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use uuid::Uuid;

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
}

pub fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

pub fn question(
    question_type: QuestionType,
    order_index: i32,
    points: u32,
    options: &[&str],
    correct_answer: &str,
) -> QuizQuestion {
    QuizQuestion {
        id: Uuid::new_v4(),
        question_type,
        question: format!("Question {}", order_index + 1),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: correct_answer.to_string(),
        points,
        order_index,
        explanation: Some(format!("Explanation {}", order_index + 1)),
        hints: Vec::new(),
        irt: None,
        stats: ItemStatistics::default(),
    }
}

pub fn multiple_choice(order_index: i32, points: u32, correct: &str) -> QuizQuestion {
    question(
        QuestionType::MultipleChoice,
        order_index,
        points,
        &["avoir", "être", "faire", "aller"],
        correct,
    )
}

pub fn quiz(questions: Vec<QuizQuestion>) -> QuizDefinition {
    QuizDefinition {
        id: Uuid::new_v4(),
        title: "French basics".to_string(),
        passing_score: Decimal::from(50),
        time_limit: None,
        allow_retry: true,
        max_attempts: None,
        shuffle_questions: false,
        show_results: true,
        show_explanations: false,
        questions,
    }
}

/// Three multiple-choice questions worth 1, 1 and 2 points.
pub fn three_question_quiz() -> QuizDefinition {
    quiz(vec![
        multiple_choice(0, 1, "avoir"),
        multiple_choice(1, 1, "être"),
        multiple_choice(2, 2, "aller"),
    ])
}

pub fn start(quiz: &QuizDefinition, student_id: Uuid, prior: &[QuizAttempt]) -> QuizAttempt {
    LifecycleService::start(
        quiz,
        student_id,
        prior,
        &GradingPolicy::default(),
        fixed_now(),
        &mut rng(),
    )
    .expect("attempt should start")
}
