use super::HandlerError;
use crate::db::Database;
use crate::live::{BroadcastNotifier, PollEvent, PollSubscription};
use crate::models::Poll;
use crate::results::{self, PollResults};
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub poll: Poll,
    #[serde(flatten)]
    pub results: PollResults,
}

/// Loads the poll and its whole answer history and aggregates them.
pub async fn get_results(database: &Database, poll_id: &str) -> Result<ResultsResponse, HandlerError> {
    let poll = database
        .get_poll(poll_id)
        .await?
        .ok_or_else(|| HandlerError::PollNotFound(poll_id.to_string()))?;
    let answers = database.get_poll_answers(poll_id).await?;
    debug!("Aggregating {} answer(s) for poll {}", answers.len(), poll_id);

    let results = results::aggregate(&poll.questions, &answers);
    Ok(ResultsResponse { poll, results })
}

/// Subscribes to one poll's live events. The current results are delivered
/// first so a new subscriber does not wait for the next submission.
pub async fn join_poll(
    database: &Database,
    notifier: &BroadcastNotifier,
    poll_id: &str,
) -> Result<PollSubscription, HandlerError> {
    // Subscribe before reading so nothing published in between is lost.
    let events = notifier.subscribe(poll_id);
    let response = get_results(database, poll_id).await?;
    debug!("Subscriber joined poll {}", poll_id);

    let snapshot = PollEvent::Results {
        poll_id: response.poll.id,
        results: response.results,
    };
    Ok(PollSubscription::new(snapshot, events))
}
