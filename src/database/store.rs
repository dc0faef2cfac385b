use crate::error::Result;
use crate::models::attempt::QuizAttempt;
use crate::models::item_stats::ItemOutcome;
use crate::models::quiz::QuizDefinition;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct TimedAttempt {
    pub attempt: QuizAttempt,
    pub time_limit_minutes: u32,
}

/// Persistence contract for the attempt engine.
///
/// Terminal transitions are check-and-set on the stored status: of two
/// racing transitions out of IN_PROGRESS exactly one succeeds, and the
/// other gets `Error::InvalidAttemptState`. Statistics merges in
/// `complete_attempt` commit together with the status change.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn load_quiz(&self, quiz_id: Uuid) -> Result<QuizDefinition>;

    /// Every attempt by `student_id` on `quiz_id`, ordered by attempt number.
    async fn list_attempts(&self, quiz_id: Uuid, student_id: Uuid) -> Result<Vec<QuizAttempt>>;

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<QuizAttempt>;

    /// Fails with `Error::AttemptAlreadyInProgress` if another IN_PROGRESS
    /// attempt was stored concurrently. A clash on `attempt_number` between
    /// two concurrent starts maps to the same error, even when neither
    /// attempt is still in progress.
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<()>;

    async fn complete_attempt(&self, attempt: &QuizAttempt, outcomes: &[ItemOutcome]) -> Result<()>;

    async fn abandon_attempt(&self, attempt: &QuizAttempt) -> Result<()>;

    /// IN_PROGRESS attempts past their quiz's time limit plus `grace_secs`.
    async fn list_expired(&self, now: DateTime<Utc>, grace_secs: i64) -> Result<Vec<TimedAttempt>>;
}
