//! Postgres-backed `AttemptStore`.
//!
//! Expected tables (managed outside this crate):
//!
//! ```text
//! quizzes        (id uuid pk, title text, passing_score numeric, time_limit int null,
//!                 allow_retry bool, max_attempts int null, shuffle_questions bool,
//!                 show_results bool, show_explanations bool)
//! quiz_questions (id uuid pk, quiz_id uuid, question_type text, question text,
//!                 options jsonb, correct_answer text, points int, order_index int,
//!                 explanation text null, hints jsonb, irt_difficulty float8 null,
//!                 irt_discrimination float8 null, irt_guessing float8 null,
//!                 times_asked bigint, times_correct bigint, timed_samples bigint,
//!                 average_time_spent float8, success_rate float8 null)
//! quiz_attempts  (id uuid pk, quiz_id uuid, student_id uuid, attempt_number int,
//!                 started_at timestamptz, completed_at timestamptz null, status text,
//!                 time_spent bigint, score int null, max_score int, percentage int null,
//!                 passed bool null, question_order jsonb, abandon_reason text null,
//!                 unique (quiz_id, student_id, attempt_number))
//! unique index on quiz_attempts (quiz_id, student_id) where status = 'in_progress'
//! ```

use crate::database::store::{AttemptStore, TimedAttempt};
use crate::error::{Error, Result};
use crate::models::attempt::{AbandonReason, AttemptStatus, QuizAttempt};
use crate::models::item_stats::{ItemOutcome, ItemStatistics};
use crate::models::question::{IrtParameters, QuizQuestion};
use crate::models::quiz::QuizDefinition;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const ATTEMPT_COLUMNS: &str = r#"
    a.id, a.quiz_id, a.student_id, a.attempt_number, a.started_at, a.completed_at,
    a.status, a.time_spent, a.score, a.max_score, a.percentage, a.passed,
    a.question_order, a.abandon_reason
"#;

#[derive(Debug, FromRow)]
struct QuizRow {
    id: Uuid,
    title: String,
    passing_score: Decimal,
    time_limit: Option<i32>,
    allow_retry: bool,
    max_attempts: Option<i32>,
    shuffle_questions: bool,
    show_results: bool,
    show_explanations: bool,
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    question_type: String,
    question: String,
    options: Json<Vec<String>>,
    correct_answer: String,
    points: i32,
    order_index: i32,
    explanation: Option<String>,
    hints: Json<Vec<String>>,
    irt_difficulty: Option<f64>,
    irt_discrimination: Option<f64>,
    irt_guessing: Option<f64>,
    times_asked: i64,
    times_correct: i64,
    timed_samples: i64,
    average_time_spent: f64,
    success_rate: Option<f64>,
}

#[derive(Debug, FromRow)]
struct AttemptRow {
    id: Uuid,
    quiz_id: Uuid,
    student_id: Uuid,
    attempt_number: i32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    status: String,
    time_spent: i64,
    score: Option<i32>,
    max_score: i32,
    percentage: Option<i32>,
    passed: Option<bool>,
    question_order: Json<Vec<Uuid>>,
    abandon_reason: Option<String>,
}

#[derive(Debug, FromRow)]
struct ExpiredAttemptRow {
    #[sqlx(flatten)]
    attempt: AttemptRow,
    quiz_time_limit: i32,
}

fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Internal(format!("Invalid {} value: {}", field, value)))
}

fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Internal(format!("Invalid {} value: {}", field, value)))
}

fn to_i32(value: u32, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::Internal(format!("{} out of range: {}", field, value)))
}

impl TryFrom<AttemptRow> for QuizAttempt {
    type Error = Error;

    fn try_from(row: AttemptRow) -> Result<Self> {
        Ok(QuizAttempt {
            id: row.id,
            quiz_id: row.quiz_id,
            student_id: row.student_id,
            attempt_number: to_u32(row.attempt_number.into(), "attempt_number")?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            status: row.status.parse::<AttemptStatus>().map_err(Error::Internal)?,
            time_spent: row.time_spent,
            score: row.score.map(|s| to_u32(s.into(), "score")).transpose()?,
            max_score: to_u32(row.max_score.into(), "max_score")?,
            percentage: row
                .percentage
                .map(|p| to_u32(p.into(), "percentage"))
                .transpose()?,
            passed: row.passed,
            question_order: row.question_order.0,
            abandon_reason: row
                .abandon_reason
                .map(|r| r.parse::<AbandonReason>().map_err(Error::Internal))
                .transpose()?,
        })
    }
}

impl TryFrom<QuestionRow> for QuizQuestion {
    type Error = Error;

    fn try_from(row: QuestionRow) -> Result<Self> {
        let irt = match (row.irt_difficulty, row.irt_discrimination, row.irt_guessing) {
            (Some(difficulty), Some(discrimination), Some(guessing)) => Some(IrtParameters {
                difficulty,
                discrimination,
                guessing,
            }),
            _ => None,
        };

        Ok(QuizQuestion {
            id: row.id,
            question_type: row.question_type.parse().map_err(Error::Internal)?,
            question: row.question,
            options: row.options.0,
            correct_answer: row.correct_answer,
            points: to_u32(row.points.into(), "points")?,
            order_index: row.order_index,
            explanation: row.explanation,
            hints: row.hints.0,
            irt,
            stats: ItemStatistics {
                times_asked: to_u64(row.times_asked, "times_asked")?,
                times_correct: to_u64(row.times_correct, "times_correct")?,
                timed_samples: to_u64(row.timed_samples, "timed_samples")?,
                average_time_spent: row.average_time_spent,
                success_rate: row.success_rate,
            },
        })
    }
}

#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Turns the row count of a guarded IN_PROGRESS -> terminal update into
    /// `InvalidAttemptState` carrying the status that won.
    async fn ensure_transitioned(&self, attempt_id: Uuid, rows_affected: u64) -> Result<()> {
        if rows_affected == 1 {
            return Ok(());
        }
        let current = self.get_attempt(attempt_id).await?;
        Err(Error::InvalidAttemptState {
            status: current.status,
        })
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn load_quiz(&self, quiz_id: Uuid) -> Result<QuizDefinition> {
        let quiz = sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT id, title, passing_score, time_limit, allow_retry, max_attempts,
                   shuffle_questions, show_results, show_explanations
            FROM quizzes WHERE id = $1
            "#,
        )
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, question_type, question, options, correct_answer, points, order_index,
                   explanation, hints, irt_difficulty, irt_discrimination, irt_guessing,
                   times_asked, times_correct, timed_samples, average_time_spent, success_rate
            FROM quiz_questions
            WHERE quiz_id = $1
            ORDER BY order_index, id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let questions = rows
            .into_iter()
            .map(QuizQuestion::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(QuizDefinition {
            id: quiz.id,
            title: quiz.title,
            passing_score: quiz.passing_score,
            time_limit: quiz
                .time_limit
                .map(|t| to_u32(t.into(), "time_limit"))
                .transpose()?,
            allow_retry: quiz.allow_retry,
            max_attempts: quiz
                .max_attempts
                .map(|m| to_u32(m.into(), "max_attempts"))
                .transpose()?,
            shuffle_questions: quiz.shuffle_questions,
            show_results: quiz.show_results,
            show_explanations: quiz.show_explanations,
            questions,
        })
    }

    async fn list_attempts(&self, quiz_id: Uuid, student_id: Uuid) -> Result<Vec<QuizAttempt>> {
        let query = format!(
            "SELECT {} FROM quiz_attempts a WHERE a.quiz_id = $1 AND a.student_id = $2 ORDER BY a.attempt_number",
            ATTEMPT_COLUMNS
        );
        let rows = sqlx::query_as::<_, AttemptRow>(&query)
            .bind(quiz_id)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(QuizAttempt::try_from).collect()
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<QuizAttempt> {
        let query = format!("SELECT {} FROM quiz_attempts a WHERE a.id = $1", ATTEMPT_COLUMNS);
        let row = sqlx::query_as::<_, AttemptRow>(&query)
            .bind(attempt_id)
            .fetch_one(&self.pool)
            .await?;
        QuizAttempt::try_from(row)
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO quiz_attempts (
                id, quiz_id, student_id, attempt_number, started_at, completed_at, status,
                time_spent, score, max_score, percentage, passed, question_order, abandon_reason
            ) VALUES ($1, $2, $3, $4, $5, NULL, $6, $7, NULL, $8, NULL, NULL, $9, NULL)
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.quiz_id)
        .bind(attempt.student_id)
        .bind(to_i32(attempt.attempt_number, "attempt_number")?)
        .bind(attempt.started_at)
        .bind(attempt.status.as_str())
        .bind(attempt.time_spent)
        .bind(to_i32(attempt.max_score, "max_score")?)
        .bind(Json(attempt.question_order.clone()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(Error::AttemptAlreadyInProgress)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn complete_attempt(&self, attempt: &QuizAttempt, outcomes: &[ItemOutcome]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET status = 'completed', completed_at = $2, time_spent = $3,
                score = $4, percentage = $5, passed = $6
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.completed_at)
        .bind(attempt.time_spent)
        .bind(attempt.score.map(|s| to_i32(s, "score")).transpose()?)
        .bind(attempt.percentage.map(|p| to_i32(p, "percentage")).transpose()?)
        .bind(attempt.passed)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            tx.rollback().await?;
            return self.ensure_transitioned(attempt.id, updated.rows_affected()).await;
        }

        for outcome in outcomes {
            sqlx::query(
                r#"
                UPDATE quiz_questions
                SET times_asked = times_asked + 1,
                    times_correct = times_correct + $2,
                    timed_samples = timed_samples + CASE WHEN $3::float8 IS NULL THEN 0 ELSE 1 END,
                    average_time_spent = CASE
                        WHEN $3::float8 IS NULL THEN average_time_spent
                        ELSE average_time_spent + ($3::float8 - average_time_spent) / (timed_samples + 1)
                    END,
                    success_rate = (times_correct + $2)::float8 / (times_asked + 1)
                WHERE id = $1
                "#,
            )
            .bind(outcome.question_id)
            .bind(if outcome.was_correct { 1_i64 } else { 0_i64 })
            .bind(outcome.time_spent)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn abandon_attempt(&self, attempt: &QuizAttempt) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET status = 'abandoned', completed_at = $2, time_spent = $3, abandon_reason = $4
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.completed_at)
        .bind(attempt.time_spent)
        .bind(attempt.abandon_reason.map(|r| r.as_str()))
        .execute(&self.pool)
        .await?;

        self.ensure_transitioned(attempt.id, updated.rows_affected())
            .await
    }

    async fn list_expired(&self, now: DateTime<Utc>, grace_secs: i64) -> Result<Vec<TimedAttempt>> {
        let query = format!(
            r#"
            SELECT {}, q.time_limit AS quiz_time_limit
            FROM quiz_attempts a
            JOIN quizzes q ON q.id = a.quiz_id
            WHERE a.status = 'in_progress'
              AND q.time_limit IS NOT NULL
              AND a.started_at + make_interval(mins => q.time_limit)
                  + make_interval(secs => $2::float8) < $1
            ORDER BY a.started_at
            "#,
            ATTEMPT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ExpiredAttemptRow>(&query)
            .bind(now)
            .bind(grace_secs.max(0) as f64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(TimedAttempt {
                    time_limit_minutes: to_u32(row.quiz_time_limit.into(), "time_limit")?,
                    attempt: QuizAttempt::try_from(row.attempt)?,
                })
            })
            .collect()
    }
}
