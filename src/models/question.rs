use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::item_stats::ItemStatistics;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_answer_key"))]
pub struct QuizQuestion {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default = "default_points")]
    #[validate(range(min = 1, max = 10_000, message = "Points must be between 1 and 10000"))]
    pub points: u32,
    #[serde(default)]
    pub order_index: i32,
    pub explanation: Option<String>,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub irt: Option<IrtParameters>,
    #[serde(default)]
    pub stats: ItemStatistics,
}

fn default_points() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    FillInBlank,
    Essay,
    Matching,
    DragDrop,
    Hotspot,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::FillInBlank => "fill_in_blank",
            QuestionType::Essay => "essay",
            QuestionType::Matching => "matching",
            QuestionType::DragDrop => "drag_drop",
            QuestionType::Hotspot => "hotspot",
        }
    }

    /// Types with a reproducible automatic comparison rule.
    pub fn is_auto_gradable(&self) -> bool {
        matches!(
            self,
            QuestionType::MultipleChoice
                | QuestionType::TrueFalse
                | QuestionType::ShortAnswer
                | QuestionType::FillInBlank
        )
    }

    pub fn requires_options(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "short_answer" => Ok(QuestionType::ShortAnswer),
            "fill_in_blank" => Ok(QuestionType::FillInBlank),
            "essay" => Ok(QuestionType::Essay),
            "matching" => Ok(QuestionType::Matching),
            "drag_drop" => Ok(QuestionType::DragDrop),
            "hotspot" => Ok(QuestionType::Hotspot),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

/// Item Response Theory calibration metadata. Set when the question is
/// authored; attempts never change it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct IrtParameters {
    pub difficulty: f64,
    pub discrimination: f64,
    #[validate(range(min = 0.0, max = 1.0, message = "Guessing must be within [0, 1]"))]
    pub guessing: f64,
}

fn validate_answer_key(question: &QuizQuestion) -> Result<(), ValidationError> {
    if question.question_type.requires_options() && question.options.is_empty() {
        let mut err = ValidationError::new("options_required");
        err.message = Some(format!("{} questions need options", question.question_type).into());
        return Err(err);
    }

    if question.question_type == QuestionType::MultipleChoice
        && !question.options.iter().any(|o| o == &question.correct_answer)
    {
        let mut err = ValidationError::new("correct_answer_not_in_options");
        err.message = Some("Correct answer must match one of the options".into());
        return Err(err);
    }

    if question.question_type == QuestionType::TrueFalse {
        let key = question.correct_answer.trim().to_lowercase();
        if key != "true" && key != "false" {
            let mut err = ValidationError::new("invalid_true_false_key");
            err.message = Some("True/false answer key must be 'true' or 'false'".into());
            return Err(err);
        }
    }

    Ok(())
}
