use crate::bank::{BankLoader, BankSummary, QuestionBank};
use crate::builder::{build_session, SessionPlan};
use crate::config::{clamp_font_size, AppConfig};
use crate::error::QuizError;
use crate::session::QuizSession;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Preferences {
    pub font_size: u32,
    pub report_prefix: String,
}

impl Preferences {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            font_size: config.font_size,
            report_prefix: config.report_prefix.clone(),
        }
    }

    pub fn set_font_size(&mut self, size: i64) {
        self.font_size = clamp_font_size(size);
    }
}

#[derive(Debug, Clone)]
pub struct UserContext {
    pub bank: Option<QuestionBank>,
    pub session: QuizSession,
    pub preferences: Preferences,
}

impl UserContext {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            bank: None,
            session: QuizSession::new(),
            preferences,
        }
    }

    pub fn set_bank(&mut self, bank: QuestionBank) -> BankSummary {
        let summary = bank.summary();
        self.bank = Some(bank);
        summary
    }

    pub fn require_bank(&self) -> Result<&QuestionBank, QuizError> {
        self.bank.as_ref().ok_or(QuizError::NoBankLoaded)
    }

    pub fn bank_summary(&self) -> Option<BankSummary> {
        self.bank.as_ref().map(QuestionBank::summary)
    }

    pub fn start_quiz(&mut self, plan: SessionPlan) -> Result<(), QuizError> {
        let bank = self.require_bank()?;
        let questions = build_session(bank, plan, &mut rand::thread_rng())?;
        self.session.start(questions)?;
        info!(single = plan.single, multi = plan.multi, "quiz started");
        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub loader: Arc<BankLoader>,
    contexts: Arc<DashMap<String, UserContext>>,
}

impl AppState {
    pub fn new(config: AppConfig, loader: BankLoader) -> Self {
        Self {
            config: Arc::new(config),
            loader: Arc::new(loader),
            contexts: Arc::new(DashMap::new()),
        }
    }

    pub fn new_context_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Runs `f` against the context for `id`, creating it on first use.
    pub fn with_context<T>(&self, id: &str, f: impl FnOnce(&mut UserContext) -> T) -> T {
        let mut entry = self
            .contexts
            .entry(id.to_string())
            .or_insert_with(|| UserContext::new(Preferences::from_config(&self.config)));
        f(entry.value_mut())
    }

    /// Like `with_context`, but without a stored context `f` runs against a
    /// throwaway one and nothing is inserted.
    pub fn with_context_or_scratch<T>(&self, id: Option<&str>, f: impl FnOnce(&mut UserContext) -> T) -> T {
        if let Some(mut entry) = id.and_then(|id| self.contexts.get_mut(id)) {
            return f(entry.value_mut());
        }
        let mut scratch = UserContext::new(Preferences::from_config(&self.config));
        f(&mut scratch)
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }
}
