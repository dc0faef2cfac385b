use crate::models::answer::{AnswerSubmission, AnswerValue};
use crate::models::quiz::QuizDefinition;
use crate::services::grading_service::GradingResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAttemptRequest {
    pub quiz_id: Uuid,
    pub student_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAttemptResponse {
    pub attempt_id: Uuid,
    pub attempt_number: u32,
    pub max_score: u32,
    pub started_at: DateTime<Utc>,
    pub time_limit_minutes: Option<u32>,
    pub question_order: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAttemptRequest {
    pub attempt_id: Uuid,
    #[serde(default)]
    pub answers: AnswerSubmission,
    /// Negative values are treated as zero; values past the time limit are capped.
    pub time_spent_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub correct: bool,
    pub awarded_points: u32,
    pub max_points: u32,
    pub submitted_value: Option<AnswerValue>,
    pub needs_review: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAttemptResponse {
    pub attempt_id: Uuid,
    pub score: u32,
    pub max_score: u32,
    pub percentage: u32,
    pub passed: bool,
    pub needs_review: bool,
    pub show_results: bool,
    /// Withheld when the quiz hides results.
    pub per_question_breakdown: Option<BTreeMap<Uuid, QuestionResult>>,
    pub ignored_question_ids: Vec<Uuid>,
}

impl SubmitAttemptResponse {
    pub fn from_result(quiz: &QuizDefinition, result: &GradingResult) -> Self {
        let per_question_breakdown = quiz.show_results.then(|| {
            result
                .breakdown
                .iter()
                .map(|(question_id, grade)| {
                    let explanation = if quiz.show_explanations {
                        quiz.question(*question_id)
                            .and_then(|q| q.explanation.clone())
                    } else {
                        None
                    };
                    (
                        *question_id,
                        QuestionResult {
                            correct: grade.correct,
                            awarded_points: grade.awarded_points,
                            max_points: grade.max_points,
                            submitted_value: grade.submitted_value.clone(),
                            needs_review: grade.needs_review,
                            explanation,
                        },
                    )
                })
                .collect()
        });

        Self {
            attempt_id: result.attempt_id,
            score: result.score,
            max_score: result.max_score,
            percentage: result.percentage,
            passed: result.passed,
            needs_review: result.needs_review,
            show_results: quiz.show_results,
            per_question_breakdown,
            ignored_question_ids: result.ignored_question_ids.clone(),
        }
    }
}
