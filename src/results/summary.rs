use crate::models::{Poll, QuestionType};
use crate::results::{PollResults, Tally};

/// Renders results as plain text, one block per question in poll order.
/// At most `text_preview` free-text responses are listed per question.
pub fn render_summary(poll: &Poll, results: &PollResults, text_preview: usize) -> String {
    let mut summary = String::new();

    summary.push_str(&poll.title);
    summary.push('\n');
    summary.push_str(&format!(
        "{} respondent(s), {} answer(s){}\n",
        results.distinct_respondents,
        results.total_answers,
        if poll.is_active { "" } else { " (closed)" }
    ));

    let mut questions: Vec<_> = poll.questions.iter().collect();
    questions.sort_by_key(|q| q.order);

    for (index, question) in questions.iter().enumerate() {
        summary.push_str(&format!("\nQ{}. {}\n", index + 1, question.text));

        match results.tallies.get(&question.id) {
            Some(Tally::Choice(counts)) => {
                // Multiple choice counts share of respondents, not of selections.
                let total: u64 = match question.kind {
                    QuestionType::MultipleChoice => results.distinct_respondents as u64,
                    _ => counts.iter().map(|c| c.count).sum(),
                };
                for c in counts {
                    let percentage = if total > 0 {
                        (c.count as f64 * 100.0 / total as f64).round()
                    } else {
                        0.0
                    };
                    summary.push_str(&format!("  {}: {} ({}%)\n", c.option, c.count, percentage));
                }
            }
            Some(Tally::Text(responses)) if responses.is_empty() => {
                summary.push_str("  No responses yet.\n");
            }
            Some(Tally::Text(responses)) => {
                for response in responses.iter().take(text_preview) {
                    summary.push_str(&format!("  - {}\n", response));
                }
                if responses.len() > text_preview {
                    summary.push_str(&format!(
                        "  ... and {} more\n",
                        responses.len() - text_preview
                    ));
                }
            }
            None => summary.push_str("  No responses yet.\n"),
        }
    }

    summary
}
