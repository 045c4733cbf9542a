use super::RejectionError;
use crate::models::{AnswerValue, Question, QuestionType};

/// Checks that `value` has the shape `question.kind` expects and, for choice
/// questions with a declared option set, that every selection belongs to it.
pub fn check_format(question: &Question, value: &AnswerValue) -> Result<(), RejectionError> {
    match question.kind {
        QuestionType::SingleChoice => {
            let selected = value
                .as_single()
                .ok_or_else(|| shape_error(question, value, "a single option"))?;
            if !question.options.is_empty() && !question.options.iter().any(|o| o == selected) {
                return Err(RejectionError::InvalidOption {
                    question_id: question.id.clone(),
                    offending: vec![selected.to_string()],
                });
            }
        }
        QuestionType::MultipleChoice => {
            let selected = value
                .as_multiple()
                .ok_or_else(|| shape_error(question, value, "a list of options"))?;
            if !question.options.is_empty() {
                let offending: Vec<String> = selected
                    .iter()
                    .filter(|s| !question.options.contains(*s))
                    .cloned()
                    .collect();
                if !offending.is_empty() {
                    return Err(RejectionError::InvalidOption {
                        question_id: question.id.clone(),
                        offending,
                    });
                }
            }
        }
        QuestionType::FreeText => {
            value
                .as_single()
                .ok_or_else(|| shape_error(question, value, "a single text value"))?;
        }
    }
    Ok(())
}

fn shape_error(question: &Question, value: &AnswerValue, expected: &str) -> RejectionError {
    RejectionError::InvalidAnswerFormat {
        question_id: question.id.clone(),
        reason: format!(
            "\"{}\" requires {}, got {}",
            question.text,
            expected,
            value.shape()
        ),
    }
}
