use crate::models::{AnswerValue, Question, StoredAnswer};
use crate::results::Tally;
use log::warn;

// Storage order is kept; empty strings are left out.
pub fn collect_text(question: &Question, answers: &[&StoredAnswer]) -> Tally {
    let mut responses = Vec::new();
    for answer in answers {
        match &answer.value {
            AnswerValue::Single(text) if text.is_empty() => {}
            AnswerValue::Single(text) => responses.push(text.clone()),
            other => warn!(
                "Stored answer to text question {} is {}, skipping",
                question.id,
                other.shape()
            ),
        }
    }
    Tally::Text(responses)
}
