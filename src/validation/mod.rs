pub mod definition;
pub mod format;
pub mod visibility;

pub use definition::{DefinitionError, check_definition};

use crate::models::{Question, SubmittedAnswer, ValidatedAnswer};
use definition::rule_problem;
use format::check_format;
use log::debug;
use std::collections::HashMap;
use thiserror::Error;
use visibility::{AcceptedAnswers, should_show};

/// Why a submission was refused. Every variant names the question at fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionError {
    #[error("Answer required for question: {question_text}")]
    MissingRequiredAnswer {
        question_id: String,
        question_text: String,
    },

    #[error("Invalid answer for question {question_id}: {reason}")]
    InvalidAnswerFormat { question_id: String, reason: String },

    #[error("Invalid options selected for question {question_id}: {}", .offending.join(", "))]
    InvalidOption {
        question_id: String,
        offending: Vec<String>,
    },

    #[error("Conditional rule on question {question_id} is malformed: {reason}")]
    MalformedConditionalRule { question_id: String, reason: String },
}

impl RejectionError {
    pub fn question_id(&self) -> &str {
        match self {
            RejectionError::MissingRequiredAnswer { question_id, .. }
            | RejectionError::InvalidAnswerFormat { question_id, .. }
            | RejectionError::InvalidOption { question_id, .. }
            | RejectionError::MalformedConditionalRule { question_id, .. } => question_id,
        }
    }

    /// True when the poll definition is at fault rather than the respondent.
    pub fn is_definition_error(&self) -> bool {
        matches!(self, RejectionError::MalformedConditionalRule { .. })
    }
}

/// Resolves conditional visibility over `questions` and validates `submitted`
/// against it, returning only the answers to visible questions.
///
/// Questions are processed in ascending `order` (stable on ties), so a rule is
/// always evaluated against answers already accepted earlier in the same pass.
/// Answers to hidden questions are dropped. The first violation aborts the
/// whole submission; nothing is returned for partial persistence.
///
/// When one question id is answered more than once, the first answer wins.
pub fn validate(
    questions: &[Question],
    submitted: &[SubmittedAnswer],
) -> Result<Vec<ValidatedAnswer>, RejectionError> {
    let mut ordered: Vec<&Question> = questions.iter().collect();
    ordered.sort_by_key(|q| q.order);

    let orders: HashMap<&str, i64> = questions.iter().map(|q| (q.id.as_str(), q.order)).collect();

    let mut by_question: HashMap<&str, &SubmittedAnswer> = HashMap::with_capacity(submitted.len());
    for answer in submitted {
        by_question.entry(answer.question_id.as_str()).or_insert(answer);
    }

    let mut accepted = AcceptedAnswers::with_capacity(questions.len());
    let mut validated = Vec::with_capacity(by_question.len());

    for question in ordered {
        if let Some(reason) = rule_problem(question, |id| orders.get(id).copied()) {
            return Err(RejectionError::MalformedConditionalRule {
                question_id: question.id.clone(),
                reason,
            });
        }

        let visible = should_show(question, &accepted);

        let Some(answer) = by_question.get(question.id.as_str()) else {
            if question.required && visible {
                return Err(RejectionError::MissingRequiredAnswer {
                    question_id: question.id.clone(),
                    question_text: question.text.clone(),
                });
            }
            continue;
        };

        if !visible {
            debug!("Dropping answer to hidden question {}", question.id);
            continue;
        }

        check_format(question, &answer.value)?;

        accepted.insert(question.id.as_str(), &answer.value);
        validated.push(ValidatedAnswer {
            question_id: question.id.clone(),
            value: answer.value.clone(),
            session_id: answer.session_id.clone(),
        });
    }

    if by_question.len() > validated.len() {
        debug!(
            "Accepted {} of {} distinct answered questions",
            validated.len(),
            by_question.len()
        );
    }

    Ok(validated)
}
