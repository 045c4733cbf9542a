//! trusty-poll - polls whose questions appear conditionally, with live tallies.
//!
//! The two pure pieces are [`validation::validate`], which resolves which
//! questions a respondent could see and checks their answers, and
//! [`results::aggregate`], which rebuilds per-question tallies and the distinct
//! respondent count from the stored answer history. Everything else is
//! plumbing around them: SQLite storage, the submission handler, in-process
//! live updates and the expiry sweep.

pub mod commands;
pub mod config;
pub mod db;
pub mod handlers;
pub mod live;
pub mod models;
pub mod results;
pub mod tasks;
pub mod validation;

pub use config::Config;
pub use db::Database;
pub use models::{Poll, Question, QuestionType, StoredAnswer, SubmittedAnswer, ValidatedAnswer};
pub use results::{PollResults, Tally, aggregate};
pub use validation::{RejectionError, validate};
