use crate::error::QuizError;
use crate::models::{validate_questions, Question, QuestionType, ValidationIssue};
use serde::Serialize;
use tracing::{info, warn};

static BANK_SCHEMA: &str = include_str!("../contracts/question_bank.schema.json");

#[derive(Debug, Clone)]
pub struct BankSource {
    pub name: String,
    pub content: Vec<u8>,
}

impl BankSource {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BankSummary {
    pub total: usize,
    pub single: usize,
    pub multi: usize,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn pool(&self, q_type: QuestionType) -> Vec<(usize, &Question)> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, q)| q.q_type == q_type)
            .collect()
    }

    pub fn summary(&self) -> BankSummary {
        let single = self
            .questions
            .iter()
            .filter(|q| q.q_type == QuestionType::Single)
            .count();
        BankSummary {
            total: self.questions.len(),
            single,
            multi: self.questions.len() - single,
        }
    }
}

pub struct BankLoader {
    validator: jsonschema::Validator,
}

impl BankLoader {
    pub fn new(schema: &serde_json::Value) -> anyhow::Result<Self> {
        let validator = jsonschema::draft202012::new(schema)
            .map_err(|e| anyhow::anyhow!("question bank schema is invalid: {}", e))?;
        Ok(Self { validator })
    }

    pub fn bundled() -> anyhow::Result<Self> {
        let schema: serde_json::Value = serde_json::from_str(BANK_SCHEMA)?;
        Self::new(&schema)
    }

    // All sources or none; order is kept and duplicates stay.
    pub fn load(&self, sources: &[BankSource]) -> Result<QuestionBank, QuizError> {
        if sources.is_empty() {
            return Err(QuizError::EmptyUpload);
        }

        let mut questions = Vec::new();
        for source in sources {
            match self.parse_source(source) {
                Ok(parsed) => questions.extend(parsed),
                Err(err) => {
                    warn!("rejected question bank upload: {}", err);
                    return Err(err);
                }
            }
        }

        let bank = QuestionBank::new(questions);
        let summary = bank.summary();
        info!(
            files = sources.len(),
            total = summary.total,
            single = summary.single,
            multi = summary.multi,
            "question bank loaded"
        );
        Ok(bank)
    }

    pub fn parse_source(&self, source: &BankSource) -> Result<Vec<Question>, QuizError> {
        let fail = |reason: String, details: Vec<ValidationIssue>| QuizError::BankParse {
            source_name: source.name.clone(),
            reason,
            details,
        };

        let text = std::str::from_utf8(&source.content)
            .map_err(|e| fail(format!("not valid UTF-8: {}", e), Vec::new()))?;
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| fail(format!("not valid JSON: {}", e), Vec::new()))?;

        if !self.validator.is_valid(&value) {
            let details = self
                .validator
                .iter_errors(&value)
                .map(|e| ValidationIssue {
                    field: pointer_to_field(&e.instance_path.to_string()),
                    issue: e.to_string(),
                })
                .collect();
            return Err(fail("does not match the question bank format".into(), details));
        }

        let questions: Vec<Question> = serde_json::from_value(value)
            .map_err(|e| fail(format!("cannot decode questions: {}", e), Vec::new()))?;
        validate_questions(&questions)
            .map_err(|issues| fail("question validation failed".into(), issues))?;
        Ok(questions)
    }
}

/// `/3/answer/0` becomes `[3].answer[0]`.
fn pointer_to_field(pointer: &str) -> String {
    let mut field = String::new();
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        if segment.chars().all(|c| c.is_ascii_digit()) {
            field.push('[');
            field.push_str(segment);
            field.push(']');
        } else {
            if !field.is_empty() {
                field.push('.');
            }
            field.push_str(segment);
        }
    }
    if field.is_empty() {
        field.push('$');
    }
    field
}
