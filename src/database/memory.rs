use crate::database::store::{AttemptStore, TimedAttempt};
use crate::error::{Error, Result};
use crate::models::attempt::{AttemptStatus, QuizAttempt};
use crate::models::item_stats::ItemOutcome;
use crate::models::quiz::QuizDefinition;
use crate::services::statistics_service::StatisticsService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    quizzes: HashMap<Uuid, QuizDefinition>,
    attempts: HashMap<Uuid, QuizAttempt>,
}

/// Process-local store. Every operation runs under one lock, which gives
/// the check-and-set semantics `AttemptStore` requires.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_quiz(&self, quiz: QuizDefinition) -> Result<()> {
        self.lock()?.quizzes.insert(quiz.id, quiz);
        Ok(())
    }

    pub fn quiz(&self, quiz_id: Uuid) -> Option<QuizDefinition> {
        self.lock().ok()?.quizzes.get(&quiz_id).cloned()
    }

    pub fn attempt(&self, attempt_id: Uuid) -> Option<QuizAttempt> {
        self.lock().ok()?.attempts.get(&attempt_id).cloned()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("attempt store mutex poisoned".to_string()))
    }

    /// Replaces a stored IN_PROGRESS attempt, or reports the status that won.
    fn transition(state: &mut MemoryState, attempt: &QuizAttempt) -> Result<()> {
        let current = state
            .attempts
            .get_mut(&attempt.id)
            .ok_or_else(|| Error::NotFound(format!("Attempt {} not found", attempt.id)))?;
        if current.status != AttemptStatus::InProgress {
            return Err(Error::InvalidAttemptState {
                status: current.status,
            });
        }
        *current = attempt.clone();
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for InMemoryStore {
    async fn load_quiz(&self, quiz_id: Uuid) -> Result<QuizDefinition> {
        self.lock()?
            .quizzes
            .get(&quiz_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Quiz {} not found", quiz_id)))
    }

    async fn list_attempts(&self, quiz_id: Uuid, student_id: Uuid) -> Result<Vec<QuizAttempt>> {
        let mut attempts: Vec<QuizAttempt> = self
            .lock()?
            .attempts
            .values()
            .filter(|a| a.quiz_id == quiz_id && a.student_id == student_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.attempt_number);
        Ok(attempts)
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<QuizAttempt> {
        self.lock()?
            .attempts
            .get(&attempt_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Attempt {} not found", attempt_id)))
    }

    /// An in-progress attempt or an `attempt_number` clash for the same
    /// quiz and student both report `AttemptAlreadyInProgress`, matching the
    /// Postgres unique-index mapping.
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<()> {
        let mut state = self.lock()?;
        let conflict = state.attempts.values().any(|a| {
            a.quiz_id == attempt.quiz_id
                && a.student_id == attempt.student_id
                && (a.status == AttemptStatus::InProgress
                    || a.attempt_number == attempt.attempt_number)
        });
        if conflict {
            return Err(Error::AttemptAlreadyInProgress);
        }
        state.attempts.insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn complete_attempt(&self, attempt: &QuizAttempt, outcomes: &[ItemOutcome]) -> Result<()> {
        let mut state = self.lock()?;
        Self::transition(&mut state, attempt)?;
        if let Some(quiz) = state.quizzes.get_mut(&attempt.quiz_id) {
            StatisticsService::apply_outcomes(quiz, outcomes);
        }
        Ok(())
    }

    async fn abandon_attempt(&self, attempt: &QuizAttempt) -> Result<()> {
        let mut state = self.lock()?;
        Self::transition(&mut state, attempt)
    }

    async fn list_expired(&self, now: DateTime<Utc>, grace_secs: i64) -> Result<Vec<TimedAttempt>> {
        let state = self.lock()?;
        let mut expired: Vec<TimedAttempt> = state
            .attempts
            .values()
            .filter_map(|attempt| {
                let limit = state.quizzes.get(&attempt.quiz_id)?.time_limit?;
                attempt
                    .is_expired(Some(limit), grace_secs, now)
                    .then(|| TimedAttempt {
                        attempt: attempt.clone(),
                        time_limit_minutes: limit,
                    })
            })
            .collect();
        expired.sort_by_key(|t| t.attempt.started_at);
        Ok(expired)
    }
}
