use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::question::QuizQuestion;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_questions"))]
pub struct QuizDefinition {
    pub id: Uuid,
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(custom(function = "validate_passing_score"))]
    pub passing_score: Decimal,
    /// Minutes; `None` means unlimited.
    #[validate(range(min = 1, message = "Time limit must be at least 1 minute"))]
    pub time_limit: Option<u32>,
    #[serde(default)]
    pub allow_retry: bool,
    /// `None` or `Some(0)` means unlimited.
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default = "default_true")]
    pub show_results: bool,
    #[serde(default)]
    pub show_explanations: bool,
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<QuizQuestion>,
}

fn default_true() -> bool {
    true
}

impl QuizDefinition {
    pub fn attempt_limit(&self) -> Option<u32> {
        self.max_attempts.filter(|&n| n > 0)
    }

    pub fn time_limit_seconds(&self) -> Option<i64> {
        self.time_limit.map(|minutes| i64::from(minutes) * 60)
    }

    pub fn question(&self, id: Uuid) -> Option<&QuizQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn question_mut(&mut self, id: Uuid) -> Option<&mut QuizQuestion> {
        self.questions.iter_mut().find(|q| q.id == id)
    }

    /// Question ids in authored display order.
    pub fn ordered_question_ids(&self) -> Vec<Uuid> {
        let mut ordered: Vec<&QuizQuestion> = self.questions.iter().collect();
        ordered.sort_by_key(|q| q.order_index);
        ordered.into_iter().map(|q| q.id).collect()
    }
}

fn validate_passing_score(score: &Decimal) -> Result<(), ValidationError> {
    if *score < Decimal::ZERO || *score > Decimal::ONE_HUNDRED {
        let mut err = ValidationError::new("passing_score_range");
        err.message = Some("Passing score must be within [0, 100]".into());
        return Err(err);
    }
    Ok(())
}

fn validate_questions(quiz: &QuizDefinition) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    if !quiz.questions.iter().all(|q| seen.insert(q.id)) {
        let mut err = ValidationError::new("duplicate_question_id");
        err.message = Some("Question ids must be unique within a quiz".into());
        return Err(err);
    }

    let total = quiz
        .questions
        .iter()
        .try_fold(0u32, |total, q| total.checked_add(q.points));
    if total.is_none() {
        let mut err = ValidationError::new("points_total_overflow");
        err.message = Some("Total points of the quiz are too large".into());
        return Err(err);
    }

    Ok(())
}
