use crate::models::item_stats::ItemOutcome;
use crate::models::question::QuizQuestion;
use crate::models::quiz::QuizDefinition;
use crate::services::grading_service::{QuestionGrade, TimeAttribution};
use std::collections::BTreeMap;
use uuid::Uuid;

pub struct StatisticsService;

impl StatisticsService {
    pub fn record_outcome(question: &mut QuizQuestion, was_correct: bool, time_spent: Option<f64>) {
        question.stats.record_outcome(was_correct, time_spent);
    }

    /// Per-question deltas for one graded attempt.
    ///
    /// Questions awaiting manual review have no known correctness and are skipped.
    pub fn outcomes(
        breakdown: &BTreeMap<Uuid, QuestionGrade>,
        time_spent: i64,
        attribution: TimeAttribution,
    ) -> Vec<ItemOutcome> {
        let graded: Vec<(&Uuid, &QuestionGrade)> =
            breakdown.iter().filter(|(_, g)| !g.needs_review).collect();
        let answered = graded
            .iter()
            .filter(|(_, g)| g.submitted_value.is_some())
            .count();

        let share = match attribution {
            TimeAttribution::EvenSplit if answered > 0 => {
                Some(time_spent.max(0) as f64 / answered as f64)
            }
            _ => None,
        };

        graded
            .into_iter()
            .map(|(question_id, grade)| ItemOutcome {
                question_id: *question_id,
                was_correct: grade.correct,
                time_spent: grade.submitted_value.as_ref().and(share),
            })
            .collect()
    }

    /// Folds outcomes into an in-memory quiz. Returns how many questions were updated.
    pub fn apply_outcomes(quiz: &mut QuizDefinition, outcomes: &[ItemOutcome]) -> usize {
        let mut applied = 0;
        for outcome in outcomes {
            match quiz.question_mut(outcome.question_id) {
                Some(question) => {
                    question.stats.apply(outcome);
                    applied += 1;
                }
                None => tracing::warn!(
                    quiz_id = %quiz.id,
                    question_id = %outcome.question_id,
                    "Outcome for a question no longer in the quiz; skipping"
                ),
            }
        }
        applied
    }
}
