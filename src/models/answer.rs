use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::models::question::QuestionType;

/// A submitted answer, tagged with the question type it was produced for.
///
/// Serialized as `{"type": "<question type>", "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    MultipleChoice(String),
    TrueFalse(String),
    ShortAnswer(String),
    FillInBlank(String),
    Essay(String),
    Matching(BTreeMap<String, String>),
    DragDrop(Vec<String>),
    Hotspot { x: f64, y: f64 },
}

impl AnswerValue {
    pub fn question_type(&self) -> QuestionType {
        match self {
            AnswerValue::MultipleChoice(_) => QuestionType::MultipleChoice,
            AnswerValue::TrueFalse(_) => QuestionType::TrueFalse,
            AnswerValue::ShortAnswer(_) => QuestionType::ShortAnswer,
            AnswerValue::FillInBlank(_) => QuestionType::FillInBlank,
            AnswerValue::Essay(_) => QuestionType::Essay,
            AnswerValue::Matching(_) => QuestionType::Matching,
            AnswerValue::DragDrop(_) => QuestionType::DragDrop,
            AnswerValue::Hotspot { .. } => QuestionType::Hotspot,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::MultipleChoice(s)
            | AnswerValue::TrueFalse(s)
            | AnswerValue::ShortAnswer(s)
            | AnswerValue::FillInBlank(s)
            | AnswerValue::Essay(s) => s.trim().is_empty(),
            AnswerValue::Matching(pairs) => pairs.is_empty(),
            AnswerValue::DragDrop(items) => items.is_empty(),
            AnswerValue::Hotspot { x, y } => !x.is_finite() || !y.is_finite(),
        }
    }
}

/// Answers keyed by question id. Questions without an entry score zero.
pub type AnswerSubmission = HashMap<Uuid, AnswerValue>;
