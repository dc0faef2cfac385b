use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "completed" => Ok(AttemptStatus::Completed),
            "abandoned" => Ok(AttemptStatus::Abandoned),
            other => Err(format!("unknown attempt status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    TimeLimitExceeded,
    Inactive,
    Withdrawn,
}

impl AbandonReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbandonReason::TimeLimitExceeded => "time_limit_exceeded",
            AbandonReason::Inactive => "inactive",
            AbandonReason::Withdrawn => "withdrawn",
        }
    }
}

impl FromStr for AbandonReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time_limit_exceeded" => Ok(AbandonReason::TimeLimitExceeded),
            "inactive" => Ok(AbandonReason::Inactive),
            "withdrawn" => Ok(AbandonReason::Withdrawn),
            other => Err(format!("unknown abandon reason '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub student_id: Uuid,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: AttemptStatus,
    /// Seconds.
    pub time_spent: i64,
    pub score: Option<u32>,
    /// Snapshotted when the attempt starts.
    pub max_score: u32,
    pub percentage: Option<u32>,
    pub passed: Option<bool>,
    /// Display order handed to the student; grading ignores it.
    pub question_order: Vec<Uuid>,
    pub abandon_reason: Option<AbandonReason>,
}

impl QuizAttempt {
    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    /// True once `now` is past the time limit plus `grace_secs`.
    /// Attempts on unlimited quizzes never expire.
    pub fn is_expired(&self, time_limit_minutes: Option<u32>, grace_secs: i64, now: DateTime<Utc>) -> bool {
        match time_limit_minutes {
            Some(minutes) => {
                let deadline = self.started_at
                    + Duration::minutes(i64::from(minutes))
                    + Duration::seconds(grace_secs.max(0));
                self.is_in_progress() && now > deadline
            }
            None => false,
        }
    }
}
