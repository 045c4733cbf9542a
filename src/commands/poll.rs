use super::CommandResult;
use crate::db::Database;
use crate::handlers::{self, HandlerError};
use crate::live::{BroadcastNotifier, PollEvent};
use crate::models::{PollDraft, PollUpdate, SubmissionRequest};
use crate::results::summary::render_summary;
use log::{error, info};
use std::path::Path;

async fn read_json<T: serde::de::DeserializeOwned>(
    file: &Path,
) -> Result<T, Box<dyn std::error::Error + Send + Sync>> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    let value = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse {}: {}", file.display(), e))?;
    Ok(value)
}

pub async fn handle_create(database: &Database, file: &Path, creator: &str) -> CommandResult {
    let draft: PollDraft = read_json(file).await?;
    let poll = handlers::create_poll(database, draft, creator).await?;
    println!("{}", poll.id);
    Ok(())
}

pub async fn handle_submit(
    database: &Database,
    notifier: &BroadcastNotifier,
    poll_id: &str,
    file: &Path,
    user: Option<String>,
    session: Option<String>,
) -> CommandResult {
    let mut request: SubmissionRequest = read_json(file).await?;
    if session.is_some() {
        request.session_id = session;
    }

    let mut subscription = handlers::join_poll(database, notifier, poll_id).await?;
    match handlers::submit_response(database, Some(notifier), poll_id, request, user.as_deref()).await {
        Ok(outcome) => {
            println!(
                "Accepted {} answer(s) (session {})",
                outcome.accepted, outcome.session_id
            );
        }
        Err(HandlerError::Rejected(rejection)) => {
            // Shown to the respondent as-is.
            println!("Submission rejected: {}", rejection);
            return Err(rejection.into());
        }
        Err(e) => {
            error!("Submission to poll {} failed: {}", poll_id, e);
            return Err(e.into());
        }
    }

    // The join snapshot comes first; the last results event is the fresh one.
    let mut latest = None;
    while let Some(event) = subscription.try_recv() {
        if let PollEvent::Results { results, .. } = event {
            latest = Some(results);
        }
    }
    if let Some(results) = latest {
        println!(
            "Poll now has {} respondent(s), {} answer(s)",
            results.distinct_respondents, results.total_answers
        );
    }
    Ok(())
}

pub async fn handle_results(
    database: &Database,
    poll_id: &str,
    json: bool,
    text_preview: usize,
) -> CommandResult {
    let response = handlers::get_results(database, poll_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render_summary(&response.poll, &response.results, text_preview));
    }
    Ok(())
}

pub async fn handle_close(database: &Database, poll_id: &str) -> CommandResult {
    if handlers::close_poll(database, poll_id).await? {
        info!("Poll {} is now closed", poll_id);
        println!("Closed {}", poll_id);
    } else {
        println!("{} was already closed", poll_id);
    }
    Ok(())
}

pub async fn handle_list(database: &Database) -> CommandResult {
    let polls = handlers::list_polls(database).await?;
    if polls.is_empty() {
        println!("No polls yet.");
    }
    for poll in polls {
        println!(
            "{}  {}  [{}] {} question(s), by {}",
            poll.id,
            poll.title,
            if poll.is_active { "open" } else { "closed" },
            poll.questions.len(),
            poll.creator_id
        );
    }
    Ok(())
}

pub async fn handle_show(database: &Database, poll_id: &str) -> CommandResult {
    let poll = handlers::get_poll(database, poll_id).await?;
    println!("{}", serde_json::to_string_pretty(&poll)?);
    Ok(())
}

pub async fn handle_update(
    database: &Database,
    poll_id: &str,
    update: PollUpdate,
    user: &str,
) -> CommandResult {
    if update.is_empty() {
        println!("Nothing to change");
        return Ok(());
    }
    let poll = handlers::update_poll(database, poll_id, update, user).await?;
    println!(
        "Updated {} ({})",
        poll.id,
        if poll.is_active { "open" } else { "closed" }
    );
    Ok(())
}

pub async fn handle_delete(database: &Database, poll_id: &str, user: &str) -> CommandResult {
    handlers::delete_poll(database, poll_id, user).await?;
    info!("Poll {} deleted by {}", poll_id, user);
    println!("Deleted {}", poll_id);
    Ok(())
}
