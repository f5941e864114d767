use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Single,
    Multi,
}

/// `answer` holds 1-based positions into `options`. Unknown fields such as
/// an exported `selected` are dropped on input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    #[serde(rename = "type")]
    pub q_type: QuestionType,
    pub question: String,
    pub options: Vec<String>,
    pub answer: Vec<usize>,
}

impl Question {
    pub fn correct_texts(&self) -> Vec<&str> {
        self.answer
            .iter()
            .filter_map(|pos| pos.checked_sub(1).and_then(|i| self.options.get(i)))
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionQuestion {
    pub bank_index: usize,
    #[serde(flatten)]
    pub question: Question,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissedQuestion {
    #[serde(flatten)]
    pub question: Question,
    pub selected: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionResult {
    pub score: usize,
    pub total: usize,
    pub percent: f64,
    pub missed: Vec<MissedQuestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionRecord {
    entries: BTreeMap<usize, BTreeSet<usize>>,
}

impl SelectionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&BTreeSet<usize>> {
        self.entries.get(&index)
    }

    pub fn selected(&self, index: usize) -> Vec<usize> {
        self.entries
            .get(&index)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn set(&mut self, index: usize, positions: BTreeSet<usize>) {
        self.entries.insert(index, positions);
    }

    // An empty set is a visited but unanswered question.
    pub fn answered(&self) -> usize {
        self.entries.values().filter(|set| !set.is_empty()).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub issue: String,
}

fn issue(field: String, text: &str) -> ValidationIssue {
    ValidationIssue {
        field,
        issue: text.into(),
    }
}

pub fn validate_questions(questions: &[Question]) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    for (i, q) in questions.iter().enumerate() {
        if q.answer.is_empty() {
            issues.push(issue(format!("[{i}].answer"), "must not be empty"));
        }
        if q.q_type == QuestionType::Single && q.answer.len() > 1 {
            issues.push(issue(
                format!("[{i}].answer"),
                "single question must have exactly one answer",
            ));
        }

        let mut seen = HashSet::new();
        for (k, pos) in q.answer.iter().enumerate() {
            if !seen.insert(*pos) {
                issues.push(issue(format!("[{i}].answer[{k}]"), "must be unique"));
            }
            if *pos == 0 || *pos > q.options.len() {
                issues.push(ValidationIssue {
                    field: format!("[{i}].answer[{k}]"),
                    issue: format!("must be within [1, {}]", q.options.len()),
                });
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
