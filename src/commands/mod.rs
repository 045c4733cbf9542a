mod poll;

use crate::config::Config;
use crate::db::Database;
use crate::live::BroadcastNotifier;
use crate::models::PollUpdate;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "trusty-poll", about = "Conditional polls with live result tallies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a poll from a JSON definition
    Create {
        file: PathBuf,
        #[arg(long)]
        creator: String,
    },
    /// Submit a JSON response to a poll
    Submit {
        poll_id: String,
        file: PathBuf,
        /// Authenticated respondent
        #[arg(long)]
        user: Option<String>,
        /// Anonymous session id, generated when omitted
        #[arg(long)]
        session: Option<String>,
    },
    /// Show aggregated results
    Results {
        poll_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Stop a poll from accepting submissions
    Close { poll_id: String },
    /// List polls, newest first
    List,
    /// Print a poll definition as JSON
    Show { poll_id: String },
    /// Edit a poll you created
    Update {
        poll_id: String,
        #[arg(long = "as")]
        user: String,
        #[command(flatten)]
        changes: UpdateArgs,
    },
    /// Delete a poll you created, with all of its answers
    Delete {
        poll_id: String,
        #[arg(long = "as")]
        user: String,
    },
    /// Keep closing polls as they expire
    Sweep,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// `true` reopens the poll, `false` closes it
    #[arg(long)]
    pub active: Option<bool>,
    /// RFC 3339 timestamp
    #[arg(long)]
    pub expires_at: Option<DateTime<Utc>>,
    #[arg(long)]
    pub allow_anonymous: Option<bool>,
}

impl From<UpdateArgs> for PollUpdate {
    fn from(args: UpdateArgs) -> Self {
        PollUpdate {
            title: args.title,
            description: args.description,
            is_active: args.active,
            expires_at: args.expires_at,
            allow_anonymous: args.allow_anonymous,
        }
    }
}

pub type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub async fn handle_command(config: &Config, database: Arc<Database>, command: Command) -> CommandResult {
    match command {
        Command::Create { file, creator } => poll::handle_create(&database, &file, &creator).await,
        Command::Submit {
            poll_id,
            file,
            user,
            session,
        } => {
            let notifier = BroadcastNotifier::default();
            poll::handle_submit(&database, &notifier, &poll_id, &file, user, session).await
        }
        Command::Results { poll_id, json } => {
            poll::handle_results(&database, &poll_id, json, config.results_text_preview).await
        }
        Command::Close { poll_id } => poll::handle_close(&database, &poll_id).await,
        Command::List => poll::handle_list(&database).await,
        Command::Show { poll_id } => poll::handle_show(&database, &poll_id).await,
        Command::Update {
            poll_id,
            user,
            changes,
        } => poll::handle_update(&database, &poll_id, changes.into(), &user).await,
        Command::Delete { poll_id, user } => poll::handle_delete(&database, &poll_id, &user).await,
        Command::Sweep => {
            crate::tasks::poll_ender::check_expired_polls_task(database, config.expiry_check_seconds)
                .await;
            Ok(())
        }
    }
}
