use crate::bank::QuestionBank;
use crate::error::QuizError;
use crate::models::{Question, QuestionType, SessionQuestion};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPlan {
    pub single: usize,
    pub multi: usize,
}

// A JSON number or the raw text of an input box; anything else is kept for
// the error message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CountInput {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

/// Accepts a trimmed base-10 non-negative integer with an optional leading `+`.
pub fn parse_count(field: &'static str, input: &CountInput) -> Result<usize, QuizError> {
    let invalid = |value: String| QuizError::InvalidCount { field, value };
    match input {
        CountInput::Number(n) => usize::try_from(*n).map_err(|_| invalid(n.to_string())),
        CountInput::Text(raw) => {
            let trimmed = raw.trim();
            let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid(raw.clone()));
            }
            digits.parse().map_err(|_| invalid(raw.clone()))
        }
        CountInput::Other(value) => Err(invalid(value.to_string())),
    }
}

impl SessionPlan {
    pub fn from_inputs(
        single: Option<&CountInput>,
        multi: Option<&CountInput>,
        defaults: SessionPlan,
    ) -> Result<Self, QuizError> {
        let single = match single {
            Some(input) => parse_count("single", input)?,
            None => defaults.single,
        };
        let multi = match multi {
            Some(input) => parse_count("multi", input)?,
            None => defaults.multi,
        };
        Ok(Self { single, multi })
    }

    pub fn total(&self) -> usize {
        self.single + self.multi
    }
}

pub fn build_session<R: Rng + ?Sized>(
    bank: &QuestionBank,
    plan: SessionPlan,
    rng: &mut R,
) -> Result<Vec<SessionQuestion>, QuizError> {
    if plan.total() == 0 {
        return Err(QuizError::DegenerateSession);
    }

    let single_pool = bank.pool(QuestionType::Single);
    let multi_pool = bank.pool(QuestionType::Multi);
    if plan.single > single_pool.len() || plan.multi > multi_pool.len() {
        return Err(QuizError::InsufficientInventory {
            requested_single: plan.single,
            available_single: single_pool.len(),
            requested_multi: plan.multi,
            available_multi: multi_pool.len(),
        });
    }

    let mut drawn: Vec<(usize, &Question)> = single_pool
        .choose_multiple(rng, plan.single)
        .chain(multi_pool.choose_multiple(rng, plan.multi))
        .copied()
        .collect();
    drawn.shuffle(rng);

    Ok(drawn
        .into_iter()
        .map(|(bank_index, question)| SessionQuestion {
            bank_index,
            question: shuffle_options(question, rng),
        })
        .collect())
}

pub fn shuffle_options<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> Question {
    let mut order: Vec<usize> = (0..question.options.len()).collect();
    order.shuffle(rng);
    permute_options(question, &order)
}

/// `order[new] = old`, both 0-based.
fn permute_options(question: &Question, order: &[usize]) -> Question {
    let options = order.iter().map(|&old| question.options[old].clone()).collect();
    let answer = order
        .iter()
        .enumerate()
        .filter(|(_, old)| question.answer.contains(&(**old + 1)))
        .map(|(new, _)| new + 1)
        .collect();
    Question {
        q_type: question.q_type,
        question: question.question.clone(),
        options,
        answer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn q(q_type: QuestionType, text: &str, options: &[&str], answer: &[usize]) -> Question {
        Question {
            q_type,
            question: text.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            answer: answer.to_vec(),
        }
    }

    fn sample_bank() -> QuestionBank {
        QuestionBank::new(vec![
            q(QuestionType::Single, "s1", &["a", "b", "c"], &[1]),
            q(QuestionType::Multi, "m1", &["a", "b", "c", "d"], &[2, 4]),
            q(QuestionType::Single, "s2", &["a", "b"], &[2]),
            q(QuestionType::Single, "s3", &["a", "b", "c", "d"], &[3]),
            q(QuestionType::Multi, "m2", &["a", "b", "c"], &[1, 2, 3]),
        ])
    }

    #[test]
    fn permutation_remaps_answer_positions() {
        let question = q(QuestionType::Single, "pick", &["A", "B", "C"], &[2]);
        // C, A, B
        let shuffled = permute_options(&question, &[2, 0, 1]);
        assert_eq!(shuffled.options, vec!["C", "A", "B"]);
        assert_eq!(shuffled.answer, vec![3]);
    }

    #[test]
    fn shuffled_answers_keep_the_same_texts() {
        let mut rng = StdRng::seed_from_u64(7);
        let question = q(QuestionType::Multi, "pick", &["w", "x", "y", "z"], &[4, 1]);
        for _ in 0..50 {
            let shuffled = shuffle_options(&question, &mut rng);
            let mut before = question.correct_texts();
            let mut after = shuffled.correct_texts();
            before.sort();
            after.sort();
            assert_eq!(before, after);
            assert!(shuffled.answer.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn build_session_draws_requested_counts_without_repeats() {
        let bank = sample_bank();
        let plan = SessionPlan { single: 2, multi: 1 };
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let session = build_session(&bank, plan, &mut rng).unwrap();
            assert_eq!(session.len(), 3);
            let singles = session
                .iter()
                .filter(|s| s.question.q_type == QuestionType::Single)
                .count();
            assert_eq!(singles, 2);
            let ids: HashSet<_> = session.iter().map(|s| s.bank_index).collect();
            assert_eq!(ids.len(), 3);
            for s in &session {
                assert_eq!(bank.questions()[s.bank_index].question, s.question.question);
            }
        }
    }

    #[test]
    fn build_session_can_take_whole_pools() {
        let bank = sample_bank();
        let mut rng = StdRng::seed_from_u64(1);
        let session = build_session(&bank, SessionPlan { single: 3, multi: 2 }, &mut rng).unwrap();
        let mut ids: Vec<_> = session.iter().map(|s| s.bank_index).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn build_session_allows_one_empty_pool() {
        let bank = sample_bank();
        let mut rng = StdRng::seed_from_u64(3);
        let session = build_session(&bank, SessionPlan { single: 0, multi: 2 }, &mut rng).unwrap();
        assert!(session.iter().all(|s| s.question.q_type == QuestionType::Multi));
    }

    #[test]
    fn build_session_rejects_insufficient_inventory() {
        let bank = sample_bank();
        let mut rng = StdRng::seed_from_u64(0);
        let err = build_session(&bank, SessionPlan { single: 4, multi: 1 }, &mut rng).unwrap_err();
        match err {
            QuizError::InsufficientInventory {
                requested_single,
                available_single,
                requested_multi,
                available_multi,
            } => {
                assert_eq!((requested_single, available_single), (4, 3));
                assert_eq!((requested_multi, available_multi), (1, 2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn build_session_rejects_zero_questions() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = build_session(&sample_bank(), SessionPlan { single: 0, multi: 0 }, &mut rng);
        assert!(matches!(err, Err(QuizError::DegenerateSession)));
    }

    #[test]
    fn parse_count_accepts_digits_only() {
        assert_eq!(parse_count("single", &CountInput::Text(" 5 ".into())).unwrap(), 5);
        assert_eq!(parse_count("single", &CountInput::Number(0)).unwrap(), 0);
        assert_eq!(parse_count("multi", &CountInput::Text("+3".into())).unwrap(), 3);
        for bad in ["", "abc", "-1", "2.5", "+", "++3", "+ 3"] {
            let err = parse_count("multi", &CountInput::Text(bad.into())).unwrap_err();
            assert!(matches!(err, QuizError::InvalidCount { field: "multi", .. }), "{bad}");
        }
        assert!(parse_count("single", &CountInput::Number(-2)).is_err());
        assert!(parse_count("single", &CountInput::Other(serde_json::json!(2.5))).is_err());
    }

    #[test]
    fn plan_falls_back_to_defaults() {
        let defaults = SessionPlan { single: 5, multi: 2 };
        let plan = SessionPlan::from_inputs(Some(&CountInput::Text("1".into())), None, defaults).unwrap();
        assert_eq!(plan, SessionPlan { single: 1, multi: 2 });
    }
}
