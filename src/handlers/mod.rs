mod poll;
mod results;
mod submit;

pub use poll::{close_poll, create_poll, delete_poll, get_poll, list_polls, update_poll};
pub use results::{ResultsResponse, get_results, join_poll};
pub use submit::{SubmissionOutcome, check_submittable, submit_response};

use crate::db::StorageError;
use crate::validation::{DefinitionError, RejectionError};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Poll not found: {0}")]
    PollNotFound(String),

    #[error("{0}")]
    PollNotSubmittable(NotSubmittableReason),

    #[error("You can only {action} your own polls")]
    Forbidden { action: &'static str },

    #[error(transparent)]
    Rejected(#[from] RejectionError),

    #[error("Invalid poll definition: {0}")]
    InvalidPoll(#[from] DefinitionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Why a poll refuses submissions before any answer is looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotSubmittableReason {
    Inactive,
    Expired,
    AuthenticationRequired,
}

impl fmt::Display for NotSubmittableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotSubmittableReason::Inactive => "Poll is not active",
            NotSubmittableReason::Expired => "Poll has expired",
            NotSubmittableReason::AuthenticationRequired => "Authentication required for this poll",
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::db::Database;
    use crate::models::{ConditionalRule, PollDraft, QuestionDraft, QuestionType, RuleOperator};

    pub async fn memory_db() -> Database {
        Database::new("sqlite::memory:", 1).await.unwrap()
    }

    // "Any issues?" yes/no, then a required "What went wrong?" shown only after "Yes".
    pub fn follow_up_draft(allow_anonymous: bool) -> PollDraft {
        PollDraft {
            title: "Retro".into(),
            description: None,
            expires_at: None,
            allow_anonymous,
            questions: vec![
                QuestionDraft {
                    id: Some("Q1".into()),
                    text: "Any issues?".into(),
                    kind: QuestionType::SingleChoice,
                    options: vec!["Yes".into(), "No".into()],
                    order: None,
                    required: true,
                    condition: None,
                },
                QuestionDraft {
                    id: Some("Q2".into()),
                    text: "What went wrong?".into(),
                    kind: QuestionType::FreeText,
                    options: vec![],
                    order: None,
                    required: true,
                    condition: Some(ConditionalRule {
                        depends_on_question_id: "Q1".into(),
                        expected_answer: "Yes".into(),
                        operator: RuleOperator::Equals,
                    }),
                },
            ],
        }
    }
}
