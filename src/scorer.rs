use crate::error::QuizError;
use crate::models::{MissedQuestion, SelectionRecord, SessionQuestion, SessionResult};
use std::collections::BTreeSet;

// No partial credit: the selected set must equal the answer set.
pub fn score(questions: &[SessionQuestion], selections: &SelectionRecord) -> Result<SessionResult, QuizError> {
    if questions.is_empty() {
        return Err(QuizError::DegenerateSession);
    }

    let mut correct_count = 0;
    let mut missed = Vec::new();
    for (i, sq) in questions.iter().enumerate() {
        let expected: BTreeSet<usize> = sq.question.answer.iter().copied().collect();
        let selected = selections.get(i).cloned().unwrap_or_default();
        if selected == expected {
            correct_count += 1;
        } else {
            missed.push(MissedQuestion {
                question: sq.question.clone(),
                selected: selected.into_iter().collect(),
            });
        }
    }

    let total = questions.len();
    Ok(SessionResult {
        score: correct_count,
        total,
        percent: percent(correct_count, total),
        missed,
    })
}

/// `score / total * 100` to two decimals, exact halves going to the even
/// digit. `total` must be non-zero.
pub fn percent(score: usize, total: usize) -> f64 {
    let raw = score as f64 / total as f64 * 100.0;
    (raw * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Question, QuestionType};

    fn sq(q_type: QuestionType, options: &[&str], answer: &[usize]) -> SessionQuestion {
        SessionQuestion {
            bank_index: 0,
            question: Question {
                q_type,
                question: "q".into(),
                options: options.iter().map(|o| o.to_string()).collect(),
                answer: answer.to_vec(),
            },
        }
    }

    fn set(positions: &[usize]) -> BTreeSet<usize> {
        positions.iter().copied().collect()
    }

    #[test]
    fn exact_set_match_scores() {
        let questions = vec![
            sq(QuestionType::Single, &["a", "b", "c"], &[2]),
            sq(QuestionType::Multi, &["a", "b", "c"], &[1, 3]),
            sq(QuestionType::Multi, &["a", "b", "c"], &[1, 2]),
        ];
        let mut record = SelectionRecord::new();
        record.set(0, set(&[2]));
        record.set(1, set(&[3, 1]));
        record.set(2, set(&[1]));

        let result = score(&questions, &record).unwrap();
        assert_eq!(result.score, 2);
        assert_eq!(result.total, 3);
        assert_eq!(result.percent, 66.67);
        assert_eq!(result.missed.len(), 1);
        assert_eq!(result.missed[0].selected, vec![1]);
        assert_eq!(result.missed[0].question.answer, vec![1, 2]);
    }

    #[test]
    fn unanswered_questions_are_missed() {
        let questions = vec![
            sq(QuestionType::Single, &["a", "b"], &[1]),
            sq(QuestionType::Multi, &["a", "b"], &[1, 2]),
        ];
        let mut record = SelectionRecord::new();
        record.set(1, BTreeSet::new());

        let result = score(&questions, &record).unwrap();
        assert_eq!(result.score, 0);
        assert_eq!(result.percent, 0.0);
        assert!(result.missed.iter().all(|m| m.selected.is_empty()));
    }

    #[test]
    fn exact_half_percent_rounds_to_even() {
        let questions: Vec<_> = (0..32)
            .map(|_| sq(QuestionType::Single, &["a", "b"], &[1]))
            .collect();
        let mut record = SelectionRecord::new();
        record.set(0, set(&[1]));

        let result = score(&questions, &record).unwrap();
        assert_eq!(result.score, 1);
        assert_eq!(result.percent, 3.12);
    }

    #[test]
    fn all_correct_has_no_missed() {
        let questions = vec![sq(QuestionType::Single, &["x", "y"], &[2])];
        let mut record = SelectionRecord::new();
        record.set(0, set(&[2]));
        let result = score(&questions, &record).unwrap();
        assert!(result.missed.is_empty());
        assert_eq!(result.percent, 100.0);
    }

    #[test]
    fn empty_session_is_degenerate() {
        let err = score(&[], &SelectionRecord::new()).unwrap_err();
        assert!(matches!(err, QuizError::DegenerateSession));
    }

    #[test]
    fn percent_rounds_to_two_places() {
        assert_eq!(percent(1, 3), 33.33);
        assert_eq!(percent(5, 7), 71.43);
        assert_eq!(percent(3, 3), 100.0);
        assert_eq!(percent(1, 32), 3.12);
        assert_eq!(percent(3, 32), 9.38);
    }
}
