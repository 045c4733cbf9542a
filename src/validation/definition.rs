use crate::models::Question;
use std::collections::HashMap;
use thiserror::Error;

/// Problems with the poll definition itself, caught before a poll is stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("Poll has no questions")]
    NoQuestions,

    #[error("Question id {0} is used more than once")]
    DuplicateQuestionId(String),

    #[error("Choice question {0} declares no options")]
    MissingOptions(String),

    #[error("Conditional rule on question {question_id} is malformed: {reason}")]
    MalformedConditionalRule { question_id: String, reason: String },
}

/// Checks a question set before it is persisted: unique ids, options on every
/// choice question, and conditional rules that only point at earlier questions.
pub fn check_definition(questions: &[Question]) -> Result<(), DefinitionError> {
    if questions.is_empty() {
        return Err(DefinitionError::NoQuestions);
    }

    let mut orders: HashMap<&str, i64> = HashMap::with_capacity(questions.len());
    for q in questions {
        if orders.insert(q.id.as_str(), q.order).is_some() {
            return Err(DefinitionError::DuplicateQuestionId(q.id.clone()));
        }
        if q.kind.is_choice() && q.options.is_empty() {
            return Err(DefinitionError::MissingOptions(q.id.clone()));
        }
    }

    for q in questions {
        if let Some(reason) = rule_problem(q, |id| orders.get(id).copied()) {
            return Err(DefinitionError::MalformedConditionalRule {
                question_id: q.id.clone(),
                reason,
            });
        }
    }
    Ok(())
}

/// Describes what is wrong with `question`'s rule, given a lookup from question
/// id to that question's `order`. `None` when the rule is sound or absent.
pub(crate) fn rule_problem(
    question: &Question,
    order_of: impl Fn(&str) -> Option<i64>,
) -> Option<String> {
    let rule = question.condition.as_ref()?;
    let dependency = rule.depends_on_question_id.as_str();

    if dependency == question.id {
        return Some("question depends on itself".to_string());
    }
    match order_of(dependency) {
        None => Some(format!("depends on unknown question {}", dependency)),
        Some(order) if order >= question.order => Some(format!(
            "depends on question {} (order {}) which does not come before it (order {})",
            dependency, order, question.order
        )),
        Some(_) => None,
    }
}
