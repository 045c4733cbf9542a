use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub creator_id: String,
    pub questions: Vec<Question>,
    pub is_active: bool,
    pub allow_anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "conditionalLogic")]
    pub condition: Option<ConditionalRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "single")]
    SingleChoice,
    #[serde(rename = "multiple")]
    MultipleChoice,
    #[serde(rename = "text")]
    FreeText,
}

impl QuestionType {
    pub fn is_choice(self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultipleChoice)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single",
            QuestionType::MultipleChoice => "multiple",
            QuestionType::FreeText => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single" => Some(QuestionType::SingleChoice),
            "multiple" => Some(QuestionType::MultipleChoice),
            "text" => Some(QuestionType::FreeText),
            _ => None,
        }
    }
}

/// Visibility gate on a question: shown only when the answer already accepted
/// for `depends_on_question_id` satisfies `operator` against `expected_answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalRule {
    pub depends_on_question_id: String,
    #[serde(default)]
    pub expected_answer: String,
    #[serde(default)]
    pub operator: RuleOperator,
}

// Null, missing and unrecognised operators all collapse to `Equals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum RuleOperator {
    #[default]
    Equals,
    NotEquals,
    Contains,
}

impl From<Option<String>> for RuleOperator {
    fn from(raw: Option<String>) -> Self {
        match raw.as_deref() {
            Some("not_equals") => RuleOperator::NotEquals,
            Some("contains") => RuleOperator::Contains,
            _ => RuleOperator::Equals,
        }
    }
}

impl From<RuleOperator> for String {
    fn from(op: RuleOperator) -> Self {
        match op {
            RuleOperator::Equals => "equals",
            RuleOperator::NotEquals => "not_equals",
            RuleOperator::Contains => "contains",
        }
        .to_string()
    }
}

/// A submitted or stored answer: one string, or a list of strings.
///
/// Any other JSON value lands in `Other` so one bad answer cannot fail the
/// whole request body; the validator rejects it against its question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(String),
    Multiple(Vec<String>),
    Other(serde_json::Value),
}

impl AnswerValue {
    pub fn as_single(&self) -> Option<&str> {
        match self {
            AnswerValue::Single(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_multiple(&self) -> Option<&[String]> {
        match self {
            AnswerValue::Multiple(values) => Some(values),
            _ => None,
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            AnswerValue::Single(_) => "a single value",
            AnswerValue::Multiple(_) => "a list of values",
            AnswerValue::Other(_) => "an unsupported value",
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(s: &str) -> Self {
        AnswerValue::Single(s.to_string())
    }
}

impl From<Vec<&str>> for AnswerValue {
    fn from(values: Vec<&str>) -> Self {
        AnswerValue::Multiple(values.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: String,
    pub value: AnswerValue,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl SubmittedAnswer {
    pub fn new(question_id: impl Into<String>, value: impl Into<AnswerValue>) -> Self {
        Self {
            question_id: question_id.into(),
            value: value.into(),
            session_id: None,
        }
    }
}

/// An answer that passed validation against a visible question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedAnswer {
    pub question_id: String,
    pub value: AnswerValue,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// A row of the answer history as the storage layer returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnswer {
    pub question_id: String,
    pub value: AnswerValue,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredAnswer {
    /// `user_id` takes precedence over `session_id`.
    pub fn respondent(&self) -> Option<RespondentIdentity> {
        match (&self.user_id, &self.session_id) {
            (Some(user), _) => Some(RespondentIdentity::User(user.clone())),
            (None, Some(session)) => Some(RespondentIdentity::Session(session.clone())),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RespondentIdentity {
    User(String),
    Session(String),
}

impl RespondentIdentity {
    /// The raw identifier, as `COALESCE(user_id, session_id)` would yield it.
    pub fn key(&self) -> &str {
        match self {
            RespondentIdentity::User(id) | RespondentIdentity::Session(id) => id,
        }
    }
}

/// Body of a poll submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub answers: Vec<SubmittedAnswer>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub allow_anonymous: bool,
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "conditionalLogic")]
    pub condition: Option<ConditionalRule>,
}

/// Owner edits to a poll. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub allow_anonymous: Option<bool>,
}

impl PollUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
            && self.expires_at.is_none()
            && self.allow_anonymous.is_none()
    }
}

impl Poll {
    pub fn new(draft: PollDraft, creator_id: String) -> Self {
        let questions = draft
            .questions
            .into_iter()
            .enumerate()
            .map(|(index, q)| Question {
                id: q.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                text: q.text,
                kind: q.kind,
                options: q.options,
                order: q.order.unwrap_or(index as i64),
                required: q.required,
                condition: q.condition,
            })
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            creator_id,
            questions,
            is_active: true,
            allow_anonymous: draft.allow_anonymous,
            created_at: Utc::now(),
            expires_at: draft.expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    pub fn apply(&mut self, update: PollUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        if let Some(expires_at) = update.expires_at {
            self.expires_at = Some(expires_at);
        }
        if let Some(allow_anonymous) = update.allow_anonymous {
            self.allow_anonymous = allow_anonymous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_defaults_to_equals() {
        let rule: ConditionalRule =
            serde_json::from_str(r#"{"dependsOnQuestionId":"q1","expectedAnswer":"Yes"}"#).unwrap();
        assert_eq!(rule.operator, RuleOperator::Equals);

        let rule: ConditionalRule = serde_json::from_str(
            r#"{"dependsOnQuestionId":"q1","expectedAnswer":"Yes","operator":null}"#,
        )
        .unwrap();
        assert_eq!(rule.operator, RuleOperator::Equals);

        let rule: ConditionalRule = serde_json::from_str(
            r#"{"dependsOnQuestionId":"q1","expectedAnswer":"Yes","operator":"greater_than"}"#,
        )
        .unwrap();
        assert_eq!(rule.operator, RuleOperator::Equals);
    }

    #[test]
    fn operator_parses_known_names() {
        let rule: ConditionalRule = serde_json::from_str(
            r#"{"dependsOnQuestionId":"q1","expectedAnswer":"x","operator":"not_equals"}"#,
        )
        .unwrap();
        assert_eq!(rule.operator, RuleOperator::NotEquals);
        assert_eq!(
            serde_json::to_value(RuleOperator::Contains).unwrap(),
            serde_json::json!("contains")
        );
    }

    #[test]
    fn answer_value_is_untagged() {
        let single: AnswerValue = serde_json::from_str(r#""Yes""#).unwrap();
        assert_eq!(single, AnswerValue::Single("Yes".into()));
        let multiple: AnswerValue = serde_json::from_str(r#"["A","B"]"#).unwrap();
        assert_eq!(multiple, AnswerValue::from(vec!["A", "B"]));
    }

    #[test]
    fn unexpected_answer_values_still_parse() {
        let request: SubmissionRequest = serde_json::from_str(
            r#"{"answers":[{"questionId":"q1","value":"Yes"},{"questionId":"q2","value":5}]}"#,
        )
        .unwrap();
        assert_eq!(request.answers[1].value, AnswerValue::Other(serde_json::json!(5)));
        assert_eq!(request.answers[1].value.as_single(), None);

        let mixed: AnswerValue = serde_json::from_str(r#"["A", 1]"#).unwrap();
        assert!(matches!(mixed, AnswerValue::Other(_)));
    }

    #[test]
    fn update_touches_only_given_fields() {
        let draft: PollDraft = serde_json::from_str(
            r#"{"title": "Lunch", "description": "Fridays", "questions": []}"#,
        )
        .unwrap();
        let mut poll = Poll::new(draft, "creator".into());
        poll.is_active = false;

        let update: PollUpdate =
            serde_json::from_str(r#"{"isActive": true, "allowAnonymous": true}"#).unwrap();
        assert!(!update.is_empty());
        poll.apply(update);

        assert!(poll.is_active);
        assert!(poll.allow_anonymous);
        assert_eq!(poll.title, "Lunch");
        assert_eq!(poll.description.as_deref(), Some("Fridays"));
        assert!(PollUpdate::default().is_empty());
    }

    #[test]
    fn question_reads_wire_format() {
        let q: Question = serde_json::from_str(
            r#"{
                "id": "q2",
                "text": "Why?",
                "type": "text",
                "order": 1,
                "required": true,
                "conditionalLogic": {"dependsOnQuestionId": "q1", "expectedAnswer": "Yes"}
            }"#,
        )
        .unwrap();
        assert_eq!(q.kind, QuestionType::FreeText);
        assert!(q.options.is_empty());
        assert_eq!(q.condition.unwrap().depends_on_question_id, "q1");
    }

    #[test]
    fn new_poll_defaults_order_to_position() {
        let draft: PollDraft = serde_json::from_str(
            r#"{
                "title": "Lunch",
                "questions": [
                    {"id": "a", "text": "Hungry?", "type": "single", "options": ["Yes", "No"]},
                    {"text": "What?", "type": "text", "order": 7}
                ]
            }"#,
        )
        .unwrap();
        let poll = Poll::new(draft, "creator".into());
        assert_eq!(poll.questions[0].id, "a");
        assert_eq!(poll.questions[0].order, 0);
        assert_eq!(poll.questions[1].order, 7);
        assert!(!poll.questions[1].id.is_empty());
        assert!(poll.is_active);
        assert!(!poll.allow_anonymous);
    }

    #[test]
    fn respondent_prefers_user() {
        let answer = StoredAnswer {
            question_id: "q".into(),
            value: "x".into(),
            user_id: Some("u1".into()),
            session_id: Some("s1".into()),
            created_at: Utc::now(),
        };
        assert_eq!(answer.respondent(), Some(RespondentIdentity::User("u1".into())));
        assert_eq!(answer.respondent().unwrap().key(), "u1");
    }
}
