use super::{HandlerError, NotSubmittableReason, get_results};
use crate::db::Database;
use crate::live::ResultsNotifier;
use crate::models::{Poll, SubmissionRequest};
use crate::validation;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub session_id: String,
    pub accepted: usize,
}

/// Gatekeeping done before the validator runs: the poll must be active,
/// unexpired, and anonymous unless a user id is present.
pub fn check_submittable(
    poll: &Poll,
    user_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), HandlerError> {
    let reason = if !poll.is_active {
        NotSubmittableReason::Inactive
    } else if poll.is_expired(now) {
        NotSubmittableReason::Expired
    } else if !poll.allow_anonymous && user_id.is_none() {
        NotSubmittableReason::AuthenticationRequired
    } else {
        return Ok(());
    };
    Err(HandlerError::PollNotSubmittable(reason))
}

/// Validates a respondent's answers and, if every check passes, appends them
/// in one batch. Subscribers are notified with fresh results afterwards.
pub async fn submit_response(
    database: &Database,
    notifier: Option<&dyn ResultsNotifier>,
    poll_id: &str,
    request: SubmissionRequest,
    user_id: Option<&str>,
) -> Result<SubmissionOutcome, HandlerError> {
    let poll = database
        .get_poll(poll_id)
        .await?
        .ok_or_else(|| HandlerError::PollNotFound(poll_id.to_string()))?;

    check_submittable(&poll, user_id, Utc::now())?;

    let session_id = request
        .session_id
        .clone()
        .or_else(|| request.answers.iter().find_map(|a| a.session_id.clone()))
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let validated = validation::validate(&poll.questions, &request.answers).map_err(|e| {
        if e.is_definition_error() {
            error!("Poll {} has a broken definition: {}", poll.id, e);
        } else {
            info!(
                "Rejected submission to poll {} at question {}: {}",
                poll.id,
                e.question_id(),
                e
            );
        }
        HandlerError::Rejected(e)
    })?;

    database
        .save_answers(&poll.id, user_id, &session_id, &validated)
        .await?;
    info!(
        "Accepted {} answer(s) for poll {} (session {})",
        validated.len(),
        poll.id,
        session_id
    );

    if let Some(notifier) = notifier {
        match get_results(database, &poll.id).await {
            Ok(response) => notifier.notify_new_response(&poll.id, &response.results).await,
            Err(e) => warn!("Could not refresh results for poll {}: {}", poll.id, e),
        }
    }

    Ok(SubmissionOutcome {
        session_id,
        accepted: validated.len(),
    })
}
