use crate::error::{Error, Result};
use crate::models::answer::{AnswerSubmission, AnswerValue};
use crate::models::attempt::{AttemptStatus, QuizAttempt};
use crate::models::item_stats::ItemOutcome;
use crate::models::question::{QuestionType, QuizQuestion};
use crate::models::quiz::QuizDefinition;
use crate::services::statistics_service::StatisticsService;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// How SHORT_ANSWER and FILL_IN_BLANK answers are compared to the key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
    /// Trim, collapse inner whitespace runs, compare case-insensitively.
    #[default]
    CaseInsensitive,
    /// Trim, then compare byte for byte.
    Exact,
}

impl TextMatch {
    pub fn matches(&self, submitted: &str, key: &str) -> bool {
        match self {
            TextMatch::Exact => submitted.trim() == key.trim(),
            TextMatch::CaseInsensitive => normalize_text(submitted) == normalize_text(key),
        }
    }
}

fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl FromStr for TextMatch {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "case_insensitive" => Ok(TextMatch::CaseInsensitive),
            "exact" => Ok(TextMatch::Exact),
            other => Err(format!("expected 'case_insensitive' or 'exact', got '{}'", other)),
        }
    }
}

/// Treatment of ESSAY, MATCHING, DRAG_DROP and HOTSPOT questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualGrading {
    /// Left for a human grader: no points, not part of `max_score`.
    #[default]
    Exclude,
    /// Full points for any non-blank answer.
    CreditAnyAnswer,
}

impl FromStr for ManualGrading {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "exclude" => Ok(ManualGrading::Exclude),
            "credit_any_answer" => Ok(ManualGrading::CreditAnyAnswer),
            other => Err(format!("expected 'exclude' or 'credit_any_answer', got '{}'", other)),
        }
    }
}

/// How whole-attempt time is attributed to individual questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAttribution {
    /// Split evenly across answered questions; unanswered ones get no sample.
    #[default]
    EvenSplit,
    /// No question receives a time sample.
    Omit,
}

impl FromStr for TimeAttribution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "even_split" => Ok(TimeAttribution::EvenSplit),
            "omit" => Ok(TimeAttribution::Omit),
            other => Err(format!("expected 'even_split' or 'omit', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingPolicy {
    pub text_match: TextMatch,
    pub manual_grading: ManualGrading,
    pub time_attribution: TimeAttribution,
}

impl GradingPolicy {
    pub fn counts_toward_score(&self, question_type: QuestionType) -> bool {
        question_type.is_auto_gradable() || self.manual_grading == ManualGrading::CreditAnyAnswer
    }
}

impl fmt::Display for GradingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "text_match={:?} manual_grading={:?} time_attribution={:?}",
            self.text_match, self.manual_grading, self.time_attribution
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionGrade {
    pub correct: bool,
    pub awarded_points: u32,
    pub max_points: u32,
    pub submitted_value: Option<AnswerValue>,
    pub needs_review: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub attempt_id: Uuid,
    pub score: u32,
    pub max_score: u32,
    pub percentage: u32,
    pub passed: bool,
    pub needs_review: bool,
    pub breakdown: BTreeMap<Uuid, QuestionGrade>,
    pub ignored_question_ids: Vec<Uuid>,
    pub outcomes: Vec<ItemOutcome>,
}

pub struct GradingService;

impl GradingService {
    /// Grades `submission` and moves `attempt` to COMPLETED.
    ///
    /// Only questions in `attempt.question_order` are graded, so the result
    /// stays within the `max_score` snapshot taken at start. The attempt is
    /// left untouched when this returns an error.
    pub fn grade(
        quiz: &QuizDefinition,
        attempt: &mut QuizAttempt,
        submission: &AnswerSubmission,
        elapsed_seconds: i64,
        policy: &GradingPolicy,
        now: DateTime<Utc>,
    ) -> Result<GradingResult> {
        if attempt.status != AttemptStatus::InProgress {
            return Err(Error::InvalidAttemptState {
                status: attempt.status,
            });
        }
        if attempt.quiz_id != quiz.id {
            return Err(Error::Internal(format!(
                "Attempt {} belongs to quiz {}, not {}",
                attempt.id, attempt.quiz_id, quiz.id
            )));
        }

        // Questions added to the quiz after the attempt started are not part of it.
        let asked: HashSet<Uuid> = attempt.question_order.iter().copied().collect();

        let mut ignored_question_ids = Vec::new();
        for (question_id, value) in submission {
            match quiz.question(*question_id) {
                Some(question) if asked.contains(question_id) => {
                    check_answer_shape(question, value)?
                }
                _ => ignored_question_ids.push(*question_id),
            }
        }
        ignored_question_ids.sort();
        if !ignored_question_ids.is_empty() {
            tracing::warn!(
                attempt_id = %attempt.id,
                quiz_id = %quiz.id,
                ignored = ?ignored_question_ids,
                "Submission references questions outside the attempt; ignoring them"
            );
        }

        let mut breakdown = BTreeMap::new();
        let mut score: u32 = 0;
        for question in quiz.questions.iter().filter(|q| asked.contains(&q.id)) {
            let grade = grade_question(question, submission.get(&question.id), policy);
            score = score.checked_add(grade.awarded_points).ok_or_else(|| {
                Error::Internal(format!("Score of attempt {} overflows", attempt.id))
            })?;
            breakdown.insert(question.id, grade);
        }

        let max_score = attempt.max_score;
        if score > max_score {
            return Err(Error::Internal(format!(
                "Attempt {} scored {} of a {} point snapshot; quiz or policy changed mid-attempt",
                attempt.id, score, max_score
            )));
        }
        let percentage = percentage(score, max_score);
        let passed = Decimal::from(percentage) >= quiz.passing_score;
        let needs_review = breakdown.values().any(|g| g.needs_review);
        let time_spent = clamp_time_spent(elapsed_seconds, quiz.time_limit_seconds());
        let outcomes =
            StatisticsService::outcomes(&breakdown, time_spent, policy.time_attribution);

        attempt.status = AttemptStatus::Completed;
        attempt.completed_at = Some(now);
        attempt.time_spent = time_spent;
        attempt.score = Some(score);
        attempt.percentage = Some(percentage);
        attempt.passed = Some(passed);

        Ok(GradingResult {
            attempt_id: attempt.id,
            score,
            max_score,
            percentage,
            passed,
            needs_review,
            breakdown,
            ignored_question_ids,
            outcomes,
        })
    }
}

/// `round(100 * score / max_score)`, halves rounded up; 0 when `max_score` is 0.
pub fn percentage(score: u32, max_score: u32) -> u32 {
    if max_score == 0 {
        return 0;
    }
    let score = u64::from(score);
    let max = u64::from(max_score);
    ((200 * score + max) / (2 * max)) as u32
}

pub fn clamp_time_spent(elapsed_seconds: i64, limit_seconds: Option<i64>) -> i64 {
    let elapsed = elapsed_seconds.max(0);
    match limit_seconds {
        Some(limit) => elapsed.min(limit),
        None => elapsed,
    }
}

fn parse_truth(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn check_answer_shape(question: &QuizQuestion, value: &AnswerValue) -> Result<()> {
    if value.question_type() != question.question_type {
        return Err(Error::MalformedAnswer {
            question_id: question.id,
            reason: format!(
                "expected a {} answer, got {}",
                question.question_type,
                value.question_type()
            ),
        });
    }
    if let AnswerValue::TrueFalse(raw) = value {
        if parse_truth(raw).is_none() {
            return Err(Error::MalformedAnswer {
                question_id: question.id,
                reason: format!("expected 'true' or 'false', got '{}'", raw),
            });
        }
    }
    Ok(())
}

fn grade_question(
    question: &QuizQuestion,
    submitted: Option<&AnswerValue>,
    policy: &GradingPolicy,
) -> QuestionGrade {
    let needs_review = !policy.counts_toward_score(question.question_type);
    let correct = match submitted {
        Some(value) if !needs_review => is_correct(question, value, policy),
        _ => false,
    };

    QuestionGrade {
        correct,
        awarded_points: if correct { question.points } else { 0 },
        max_points: question.points,
        submitted_value: submitted.cloned(),
        needs_review,
    }
}

fn is_correct(question: &QuizQuestion, value: &AnswerValue, policy: &GradingPolicy) -> bool {
    match value {
        AnswerValue::MultipleChoice(choice) => *choice == question.correct_answer,
        AnswerValue::TrueFalse(raw) => {
            let key = parse_truth(&question.correct_answer);
            key.is_some() && parse_truth(raw) == key
        }
        AnswerValue::ShortAnswer(text) | AnswerValue::FillInBlank(text) => {
            policy.text_match.matches(text, &question.correct_answer)
        }
        AnswerValue::Essay(_)
        | AnswerValue::Matching(_)
        | AnswerValue::DragDrop(_)
        | AnswerValue::Hotspot { .. } => !value.is_blank(),
    }
}
