use crate::models::{AnswerValue, Question, QuestionType, StoredAnswer};
use crate::results::{OptionCount, Tally};
use log::warn;

/// Counts answers per declared option. A single-choice answer counts for the
/// option it equals; a multiple-choice answer counts once for every option it
/// lists, so the counts may add up to more than the number of respondents.
pub fn tally_choices(question: &Question, answers: &[&StoredAnswer]) -> Tally {
    let mut counts: Vec<OptionCount> = question
        .options
        .iter()
        .map(|option| OptionCount {
            option: option.clone(),
            count: 0,
        })
        .collect();

    for answer in answers {
        match (question.kind, &answer.value) {
            (QuestionType::SingleChoice, AnswerValue::Single(selected)) => {
                if let Some(bucket) = counts.iter_mut().find(|c| &c.option == selected) {
                    bucket.count += 1;
                }
            }
            (QuestionType::MultipleChoice, AnswerValue::Multiple(selected)) => {
                for bucket in counts.iter_mut() {
                    if selected.contains(&bucket.option) {
                        bucket.count += 1;
                    }
                }
            }
            (kind, value) => warn!(
                "Stored answer to {} question {} is {}, skipping",
                kind.as_str(),
                question.id,
                value.shape()
            ),
        }
    }

    Tally::Choice(counts)
}
