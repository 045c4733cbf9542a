use super::HandlerError;
use crate::db::Database;
use crate::models::{Poll, PollDraft, PollUpdate};
use crate::validation::check_definition;
use log::{info, warn};

// Loads a poll and refuses anyone but its creator.
async fn owned_poll(
    database: &Database,
    poll_id: &str,
    user_id: &str,
    action: &'static str,
) -> Result<Poll, HandlerError> {
    let poll = get_poll(database, poll_id).await?;
    if poll.creator_id != user_id {
        warn!("User {} tried to {} poll {} owned by {}", user_id, action, poll_id, poll.creator_id);
        return Err(HandlerError::Forbidden { action });
    }
    Ok(poll)
}

/// Builds a poll from `draft`, checks its definition and stores it.
pub async fn create_poll(
    database: &Database,
    draft: PollDraft,
    creator_id: &str,
) -> Result<Poll, HandlerError> {
    let poll = Poll::new(draft, creator_id.to_string());

    if let Err(e) = check_definition(&poll.questions) {
        warn!("Rejected definition for poll \"{}\": {}", poll.title, e);
        return Err(e.into());
    }

    database.create_poll(&poll).await?;
    info!(
        "Created poll {} with {} question(s)",
        poll.id,
        poll.questions.len()
    );
    Ok(poll)
}

pub async fn get_poll(database: &Database, poll_id: &str) -> Result<Poll, HandlerError> {
    database
        .get_poll(poll_id)
        .await?
        .ok_or_else(|| HandlerError::PollNotFound(poll_id.to_string()))
}

pub async fn list_polls(database: &Database) -> Result<Vec<Poll>, HandlerError> {
    Ok(database.list_polls().await?)
}

/// Applies an owner's edits. Setting `is_active` reopens or closes the poll.
pub async fn update_poll(
    database: &Database,
    poll_id: &str,
    update: PollUpdate,
    user_id: &str,
) -> Result<Poll, HandlerError> {
    let mut poll = owned_poll(database, poll_id, user_id, "update").await?;
    if update.is_empty() {
        return Ok(poll);
    }

    poll.apply(update);
    if !database.update_poll(&poll).await? {
        return Err(HandlerError::PollNotFound(poll_id.to_string()));
    }
    info!("Updated poll {}", poll_id);
    Ok(poll)
}

/// Deletes a poll together with its questions and answers.
pub async fn delete_poll(database: &Database, poll_id: &str, user_id: &str) -> Result<(), HandlerError> {
    owned_poll(database, poll_id, user_id, "delete").await?;
    if !database.delete_poll(poll_id).await? {
        return Err(HandlerError::PollNotFound(poll_id.to_string()));
    }
    info!("Deleted poll {}", poll_id);
    Ok(())
}

pub async fn close_poll(database: &Database, poll_id: &str) -> Result<bool, HandlerError> {
    get_poll(database, poll_id).await?;
    let changed = database.end_poll(poll_id).await?;
    if changed {
        info!("Closed poll {}", poll_id);
    }
    Ok(changed)
}
