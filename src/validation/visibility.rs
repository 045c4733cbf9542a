use crate::models::{AnswerValue, ConditionalRule, Question, RuleOperator};
use std::collections::HashMap;

/// Answers accepted so far in one validation pass, keyed by question id.
pub type AcceptedAnswers<'a> = HashMap<&'a str, &'a AnswerValue>;

pub fn should_show(question: &Question, accepted: &AcceptedAnswers<'_>) -> bool {
    let Some(rule) = &question.condition else {
        return true;
    };

    match accepted.get(rule.depends_on_question_id.as_str()) {
        Some(recorded) if is_answered(recorded) => rule_matches(rule, recorded),
        _ => false,
    }
}

// An empty string is treated the same as no answer at all.
fn is_answered(value: &AnswerValue) -> bool {
    !matches!(value, AnswerValue::Single(s) if s.is_empty())
}

pub fn rule_matches(rule: &ConditionalRule, recorded: &AnswerValue) -> bool {
    let expected = rule.expected_answer.as_str();
    match rule.operator {
        RuleOperator::Equals => equals(recorded, expected),
        RuleOperator::NotEquals => !equals(recorded, expected),
        RuleOperator::Contains => match recorded {
            AnswerValue::Multiple(values) => values.iter().any(|v| v == expected),
            AnswerValue::Single(s) => s.contains(expected),
            AnswerValue::Other(_) => false,
        },
    }
}

// A list never equals a scalar, even a one-element list.
fn equals(recorded: &AnswerValue, expected: &str) -> bool {
    matches!(recorded, AnswerValue::Single(s) if s == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionType;

    fn gated(operator: RuleOperator, expected: &str) -> Question {
        Question {
            id: "q2".into(),
            text: "Follow-up".into(),
            kind: QuestionType::FreeText,
            options: vec![],
            order: 1,
            required: false,
            condition: Some(ConditionalRule {
                depends_on_question_id: "q1".into(),
                expected_answer: expected.into(),
                operator,
            }),
        }
    }

    fn show_with(question: &Question, recorded: AnswerValue) -> bool {
        let mut accepted = AcceptedAnswers::new();
        accepted.insert("q1", &recorded);
        should_show(question, &accepted)
    }

    #[test]
    fn unconditional_question_is_always_visible() {
        let mut q = gated(RuleOperator::Equals, "Yes");
        q.condition = None;
        assert!(should_show(&q, &AcceptedAnswers::new()));
    }

    #[test]
    fn hidden_until_dependency_is_answered() {
        let q = gated(RuleOperator::NotEquals, "Yes");
        assert!(!should_show(&q, &AcceptedAnswers::new()));
        assert!(!show_with(&q, "".into()));
        assert!(show_with(&q, "No".into()));
    }

    #[test]
    fn equals_compares_raw_value() {
        let q = gated(RuleOperator::Equals, "Yes");
        assert!(show_with(&q, "Yes".into()));
        assert!(!show_with(&q, "yes".into()));
        assert!(!show_with(&q, vec!["Yes"].into()));
    }

    #[test]
    fn not_equals_negates() {
        let q = gated(RuleOperator::NotEquals, "Yes");
        assert!(!show_with(&q, "Yes".into()));
        assert!(show_with(&q, vec!["Yes"].into()));
    }

    #[test]
    fn contains_uses_membership_or_substring() {
        let q = gated(RuleOperator::Contains, "tea");
        assert!(show_with(&q, vec!["coffee", "tea"].into()));
        assert!(!show_with(&q, vec!["coffee", "green tea"].into()));
        assert!(show_with(&q, "green tea".into()));
        assert!(!show_with(&q, "coffee".into()));
    }
}
