pub mod choice;
pub mod free_text;
pub mod summary;

use crate::models::{Question, StoredAnswer};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

// Aggregated results for one poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub tallies: BTreeMap<String, Tally>,
    pub distinct_respondents: usize,
    pub total_answers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "camelCase")]
pub enum Tally {
    /// One bucket per declared option, in declaration order.
    Choice(Vec<OptionCount>),
    /// Non-empty free-text responses in storage order.
    Text(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCount {
    pub option: String,
    pub count: u64,
}

impl Tally {
    pub fn count_for(&self, option: &str) -> Option<u64> {
        match self {
            Tally::Choice(counts) => counts.iter().find(|c| c.option == option).map(|c| c.count),
            Tally::Text(_) => None,
        }
    }
}

/// Recomputes every question's tally and the distinct respondent count from
/// the full answer history. Never fails: answers that do not fit the poll are
/// logged and left out.
pub fn aggregate(questions: &[Question], answers: &[StoredAnswer]) -> PollResults {
    let mut by_question: HashMap<&str, Vec<&StoredAnswer>> = HashMap::new();
    for answer in answers {
        by_question.entry(answer.question_id.as_str()).or_default().push(answer);
    }

    let mut tallies = BTreeMap::new();
    for question in questions {
        let answered = by_question.remove(question.id.as_str()).unwrap_or_default();
        let tally = if question.kind.is_choice() {
            choice::tally_choices(question, &answered)
        } else {
            free_text::collect_text(question, &answered)
        };
        tallies.insert(question.id.clone(), tally);
    }

    for (question_id, orphans) in &by_question {
        warn!(
            "{} stored answer(s) reference unknown question {}, excluded from tallies",
            orphans.len(),
            question_id
        );
    }

    PollResults {
        tallies,
        distinct_respondents: count_respondents(answers),
        total_answers: answers.len(),
    }
}

/// Number of distinct `COALESCE(user_id, session_id)` values. Answers with
/// neither are not counted, so unrelated anonymous answers never merge.
pub fn count_respondents(answers: &[StoredAnswer]) -> usize {
    let mut seen = HashSet::new();
    let mut unidentified = 0usize;
    for answer in answers {
        match answer.respondent() {
            Some(identity) => {
                seen.insert(identity.key().to_string());
            }
            None => unidentified += 1,
        }
    }
    if unidentified > 0 {
        warn!("{} stored answer(s) carry no respondent identity", unidentified);
    }
    seen.len()
}
