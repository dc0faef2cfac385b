use crate::error::{Error, Result};
use crate::models::attempt::{AbandonReason, AttemptStatus, QuizAttempt};
use crate::models::quiz::QuizDefinition;
use crate::services::grading_service::GradingPolicy;
use crate::utils::time::elapsed_seconds;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;
use validator::Validate;

/// Attempt state machine: NONE -> IN_PROGRESS -> COMPLETED | ABANDONED.
pub struct LifecycleService;

impl LifecycleService {
    /// Rejects a new attempt when one is still running, when retries are
    /// off and the quiz was completed, or when the attempt limit is used up.
    /// Abandoned attempts never count against the limit.
    pub fn check_eligibility(quiz: &QuizDefinition, prior_attempts: &[QuizAttempt]) -> Result<()> {
        if prior_attempts
            .iter()
            .any(|a| a.status == AttemptStatus::InProgress)
        {
            return Err(Error::AttemptAlreadyInProgress);
        }

        if !quiz.allow_retry
            && prior_attempts
                .iter()
                .any(|a| a.status == AttemptStatus::Completed)
        {
            return Err(Error::RetryNotAllowed);
        }

        if let Some(limit) = quiz.attempt_limit() {
            let counted = prior_attempts
                .iter()
                .filter(|a| a.status != AttemptStatus::Abandoned)
                .count();
            if counted >= limit as usize {
                return Err(Error::AttemptLimitExceeded {
                    max_attempts: limit,
                });
            }
        }

        Ok(())
    }

    /// Points available for automatic scoring at this moment.
    pub fn max_score(quiz: &QuizDefinition, policy: &GradingPolicy) -> Result<u32> {
        quiz.questions
            .iter()
            .filter(|q| policy.counts_toward_score(q.question_type))
            .try_fold(0u32, |total, q| total.checked_add(q.points))
            .ok_or_else(|| {
                Error::Internal(format!("Point total of quiz {} overflows", quiz.id))
            })
    }

    pub fn start<R: Rng + ?Sized>(
        quiz: &QuizDefinition,
        student_id: Uuid,
        prior_attempts: &[QuizAttempt],
        policy: &GradingPolicy,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<QuizAttempt> {
        quiz.validate()?;

        if let Some(foreign) = prior_attempts
            .iter()
            .find(|a| a.quiz_id != quiz.id || a.student_id != student_id)
        {
            return Err(Error::Internal(format!(
                "Attempt {} does not belong to quiz {} and student {}",
                foreign.id, quiz.id, student_id
            )));
        }

        Self::check_eligibility(quiz, prior_attempts)?;

        let max_score = Self::max_score(quiz, policy)?;
        let mut question_order = quiz.ordered_question_ids();
        if quiz.shuffle_questions {
            question_order.shuffle(rng);
        }

        Ok(QuizAttempt {
            id: Uuid::new_v4(),
            quiz_id: quiz.id,
            student_id,
            attempt_number: prior_attempts.len() as u32 + 1,
            started_at: now,
            completed_at: None,
            status: AttemptStatus::InProgress,
            time_spent: 0,
            score: None,
            max_score,
            percentage: None,
            passed: None,
            question_order,
            abandon_reason: None,
        })
    }

    /// IN_PROGRESS -> ABANDONED. No score is computed.
    pub fn abandon(
        attempt: &mut QuizAttempt,
        time_limit_minutes: Option<u32>,
        reason: AbandonReason,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if attempt.status != AttemptStatus::InProgress {
            return Err(Error::InvalidAttemptState {
                status: attempt.status,
            });
        }

        attempt.time_spent = match time_limit_minutes {
            Some(minutes) => i64::from(minutes) * 60,
            None => elapsed_seconds(attempt.started_at, now),
        };
        attempt.status = AttemptStatus::Abandoned;
        attempt.completed_at = Some(now);
        attempt.abandon_reason = Some(reason);
        Ok(())
    }
}
