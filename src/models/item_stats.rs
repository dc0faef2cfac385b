use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Running per-question aggregates, updated one outcome at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStatistics {
    pub times_asked: u64,
    pub times_correct: u64,
    /// Outcomes that carried a time sample; the denominator of `average_time_spent`.
    pub timed_samples: u64,
    /// Seconds.
    pub average_time_spent: f64,
    pub success_rate: Option<f64>,
}

impl ItemStatistics {
    /// Folds one outcome into the aggregates without revisiting history.
    ///
    /// Not idempotent: the caller delivers each (attempt, question) outcome at most once.
    pub fn record_outcome(&mut self, was_correct: bool, time_spent: Option<f64>) {
        self.times_asked += 1;
        if was_correct {
            self.times_correct += 1;
        }
        if let Some(seconds) = time_spent {
            self.timed_samples += 1;
            self.average_time_spent +=
                (seconds - self.average_time_spent) / self.timed_samples as f64;
        }
        self.success_rate = Some(self.times_correct as f64 / self.times_asked as f64);
    }

    pub fn apply(&mut self, outcome: &ItemOutcome) {
        self.record_outcome(outcome.was_correct, outcome.time_spent);
    }
}

/// One question's contribution from a completed attempt, handed to storage
/// to merge atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub question_id: Uuid,
    pub was_correct: bool,
    pub time_spent: Option<f64>,
}
