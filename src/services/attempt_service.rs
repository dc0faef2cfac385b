use crate::database::store::AttemptStore;
use crate::dto::attempt_dto::{
    StartAttemptRequest, StartAttemptResponse, SubmitAttemptRequest, SubmitAttemptResponse,
};
use crate::error::{Error, Result};
use crate::models::attempt::{AbandonReason, QuizAttempt};
use crate::services::grading_service::{GradingPolicy, GradingService};
use crate::services::lifecycle_service::LifecycleService;
use crate::utils::time::now;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Drives the attempt lifecycle against a store: load, decide, persist.
#[derive(Clone)]
pub struct AttemptService<S> {
    store: S,
    policy: GradingPolicy,
}

impl<S: AttemptStore> AttemptService<S> {
    pub fn new(store: S, policy: GradingPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &GradingPolicy {
        &self.policy
    }

    pub async fn start_attempt(&self, req: StartAttemptRequest) -> Result<StartAttemptResponse> {
        let quiz = self.store.load_quiz(req.quiz_id).await?;
        let prior_attempts = self.store.list_attempts(req.quiz_id, req.student_id).await?;

        let started = {
            let mut rng = rand::thread_rng();
            LifecycleService::start(
                &quiz,
                req.student_id,
                &prior_attempts,
                &self.policy,
                now(),
                &mut rng,
            )
        };
        let attempt = match started {
            Ok(attempt) => attempt,
            Err(e) => {
                tracing::info!(
                    quiz_id = %req.quiz_id,
                    student_id = %req.student_id,
                    prior_attempts = prior_attempts.len(),
                    "Start rejected: {}",
                    e
                );
                return Err(e);
            }
        };

        self.store.insert_attempt(&attempt).await?;

        tracing::info!(
            attempt_id = %attempt.id,
            quiz_id = %attempt.quiz_id,
            student_id = %attempt.student_id,
            attempt_number = attempt.attempt_number,
            max_score = attempt.max_score,
            "Attempt started"
        );

        Ok(StartAttemptResponse {
            attempt_id: attempt.id,
            attempt_number: attempt.attempt_number,
            max_score: attempt.max_score,
            started_at: attempt.started_at,
            time_limit_minutes: quiz.time_limit,
            question_order: attempt.question_order,
        })
    }

    pub async fn submit_attempt(&self, req: SubmitAttemptRequest) -> Result<SubmitAttemptResponse> {
        tracing::info!(
            attempt_id = %req.attempt_id,
            answers = req.answers.len(),
            time_spent_seconds = req.time_spent_seconds,
            "Submitting attempt"
        );

        let mut attempt = self.store.get_attempt(req.attempt_id).await?;
        let quiz = self.store.load_quiz(attempt.quiz_id).await?;

        let result = match GradingService::grade(
            &quiz,
            &mut attempt,
            &req.answers,
            req.time_spent_seconds,
            &self.policy,
            now(),
        ) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(attempt_id = %req.attempt_id, "Submission rejected: {}", e);
                return Err(e);
            }
        };

        if let Err(e) = self
            .store
            .complete_attempt(&attempt, &result.outcomes)
            .await
        {
            match &e {
                Error::InvalidAttemptState { status } => tracing::warn!(
                    attempt_id = %attempt.id,
                    "Attempt became {} before the submission was stored",
                    status
                ),
                other => tracing::error!(attempt_id = %attempt.id, error = ?other, "Failed to store graded attempt"),
            }
            return Err(e);
        }

        tracing::info!(
            attempt_id = %attempt.id,
            score = result.score,
            max_score = result.max_score,
            percentage = result.percentage,
            passed = result.passed,
            needs_review = result.needs_review,
            "Attempt graded"
        );

        Ok(SubmitAttemptResponse::from_result(&quiz, &result))
    }

    pub async fn abandon_attempt(&self, attempt_id: Uuid, reason: AbandonReason) -> Result<QuizAttempt> {
        let mut attempt = self.store.get_attempt(attempt_id).await?;
        let quiz = self.store.load_quiz(attempt.quiz_id).await?;

        LifecycleService::abandon(&mut attempt, quiz.time_limit, reason, now())?;
        self.store.abandon_attempt(&attempt).await?;

        tracing::info!(
            attempt_id = %attempt.id,
            reason = reason.as_str(),
            time_spent = attempt.time_spent,
            "Attempt abandoned"
        );
        Ok(attempt)
    }

    /// Abandons every attempt past its time limit plus `grace_secs`.
    /// Attempts that a concurrent submit completed first are skipped.
    /// Returns how many attempts were abandoned.
    pub async fn abandon_expired(&self, at: DateTime<Utc>, grace_secs: i64) -> Result<usize> {
        let expired = self.store.list_expired(at, grace_secs).await?;
        let mut abandoned = 0;

        for timed in expired {
            let mut attempt = timed.attempt;
            if let Err(e) = LifecycleService::abandon(
                &mut attempt,
                Some(timed.time_limit_minutes),
                AbandonReason::TimeLimitExceeded,
                at,
            ) {
                tracing::debug!(attempt_id = %attempt.id, "Skipping sweep candidate: {}", e);
                continue;
            }

            match self.store.abandon_attempt(&attempt).await {
                Ok(()) => {
                    abandoned += 1;
                    tracing::info!(
                        attempt_id = %attempt.id,
                        quiz_id = %attempt.quiz_id,
                        "Attempt abandoned after time limit"
                    );
                }
                Err(Error::InvalidAttemptState { status }) => {
                    tracing::debug!(attempt_id = %attempt.id, "Attempt already {}; not abandoning", status);
                }
                Err(e) => {
                    tracing::error!(attempt_id = %attempt.id, error = ?e, "Failed to abandon expired attempt");
                }
            }
        }

        Ok(abandoned)
    }
}
