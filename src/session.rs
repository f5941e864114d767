use crate::error::QuizError;
use crate::models::{QuestionType, SelectionRecord, SessionQuestion, SessionResult};
use crate::scorer;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub enum QuizPhase {
    #[default]
    NotStarted,
    InProgress(ActiveQuiz),
    Finished(SessionResult),
}

impl QuizPhase {
    pub fn name(&self) -> &'static str {
        match self {
            QuizPhase::NotStarted => "not_started",
            QuizPhase::InProgress(_) => "in_progress",
            QuizPhase::Finished(_) => "finished",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActiveQuiz {
    questions: Vec<SessionQuestion>,
    selections: SelectionRecord,
    position: usize,
}

impl ActiveQuiz {
    pub fn selections(&self) -> &SelectionRecord {
        &self.selections
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn last(&self) -> usize {
        self.questions.len() - 1
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OptionView {
    pub position: usize,
    pub text: String,
}

// Never carries the answer key.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QuestionView {
    pub position: usize,
    pub total: usize,
    #[serde(rename = "type")]
    pub q_type: QuestionType,
    pub question: String,
    pub options: Vec<OptionView>,
    pub selected: Vec<usize>,
    pub answered: usize,
    pub can_prev: bool,
    pub can_next: bool,
    pub is_last: bool,
}

/// `NotStarted -> InProgress -> Finished`, back to `NotStarted` on reset.
/// Failed calls leave the session untouched.
#[derive(Debug, Clone, Default)]
pub struct QuizSession {
    phase: QuizPhase,
}

impl QuizSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &QuizPhase {
        &self.phase
    }

    pub fn start(&mut self, questions: Vec<SessionQuestion>) -> Result<(), QuizError> {
        if questions.is_empty() {
            return Err(QuizError::DegenerateSession);
        }
        self.phase = QuizPhase::InProgress(ActiveQuiz {
            questions,
            selections: SelectionRecord::new(),
            position: 0,
        });
        Ok(())
    }

    pub fn record_selection(&mut self, position: usize, selected: &[usize]) -> Result<(), QuizError> {
        let active = self.active_mut()?;
        let question = active.questions.get(position).ok_or_else(|| {
            QuizError::InvalidSelection(format!(
                "question {} does not exist (quiz has {})",
                position,
                active.questions.len()
            ))
        })?;
        let set = normalize_selection(question, selected)?;
        active.selections.set(position, set);
        Ok(())
    }

    pub fn prev(&mut self, pending: Option<&[usize]>) -> Result<usize, QuizError> {
        self.capture_pending(pending)?;
        let active = self.active_mut()?;
        if active.position > 0 {
            active.position -= 1;
        }
        Ok(active.position)
    }

    pub fn next(&mut self, pending: Option<&[usize]>) -> Result<usize, QuizError> {
        self.capture_pending(pending)?;
        let active = self.active_mut()?;
        if active.position < active.last() {
            active.position += 1;
        }
        Ok(active.position)
    }

    pub fn finish(&mut self, pending: Option<&[usize]>) -> Result<&SessionResult, QuizError> {
        let active = self.active_mut()?;
        let mut selections = active.selections.clone();
        if let Some(selected) = pending {
            let set = normalize_selection(&active.questions[active.position], selected)?;
            selections.set(active.position, set);
        }
        let result = scorer::score(&active.questions, &selections)?;
        info!(
            score = result.score,
            total = result.total,
            percent = result.percent,
            "quiz finished"
        );
        self.phase = QuizPhase::Finished(result);
        self.result()
    }

    pub fn reset(&mut self) {
        self.phase = QuizPhase::NotStarted;
    }

    pub fn result(&self) -> Result<&SessionResult, QuizError> {
        match &self.phase {
            QuizPhase::Finished(result) => Ok(result),
            other => Err(QuizError::InvalidTransition {
                expected: "finished",
                actual: other.name(),
            }),
        }
    }

    pub fn active(&self) -> Result<&ActiveQuiz, QuizError> {
        match &self.phase {
            QuizPhase::InProgress(active) => Ok(active),
            other => Err(QuizError::InvalidTransition {
                expected: "in_progress",
                actual: other.name(),
            }),
        }
    }

    pub fn view(&self) -> Option<QuestionView> {
        let QuizPhase::InProgress(active) = &self.phase else {
            return None;
        };
        let p = active.position;
        let current = &active.questions[p].question;
        Some(QuestionView {
            position: p,
            total: active.questions.len(),
            q_type: current.q_type,
            question: current.question.clone(),
            options: current
                .options
                .iter()
                .enumerate()
                .map(|(i, text)| OptionView {
                    position: i + 1,
                    text: text.clone(),
                })
                .collect(),
            selected: active.selections.selected(p),
            answered: active.selections.answered(),
            can_prev: p > 0,
            can_next: p < active.last(),
            is_last: p == active.last(),
        })
    }

    fn active_mut(&mut self) -> Result<&mut ActiveQuiz, QuizError> {
        match &mut self.phase {
            QuizPhase::InProgress(active) => Ok(active),
            other => Err(QuizError::InvalidTransition {
                expected: "in_progress",
                actual: other.name(),
            }),
        }
    }

    fn capture_pending(&mut self, pending: Option<&[usize]>) -> Result<(), QuizError> {
        match pending {
            Some(selected) => {
                let position = self.active()?.position;
                self.record_selection(position, selected)
            }
            None => self.active().map(|_| ()),
        }
    }
}

fn normalize_selection(question: &SessionQuestion, selected: &[usize]) -> Result<BTreeSet<usize>, QuizError> {
    let count = question.question.options.len();
    if let Some(bad) = selected.iter().find(|&&pos| pos == 0 || pos > count) {
        return Err(QuizError::InvalidSelection(format!(
            "option {} is out of range [1, {}]",
            bad, count
        )));
    }
    let set: BTreeSet<usize> = selected.iter().copied().collect();
    if question.question.q_type == QuestionType::Single && set.len() > 1 {
        return Err(QuizError::InvalidSelection(
            "single-choice questions accept at most one option".into(),
        ));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Question;

    fn sq(q_type: QuestionType, answer: &[usize]) -> SessionQuestion {
        SessionQuestion {
            bank_index: 0,
            question: Question {
                q_type,
                question: format!("{:?}", answer),
                options: vec!["a".into(), "b".into(), "c".into()],
                answer: answer.to_vec(),
            },
        }
    }

    fn started() -> QuizSession {
        let mut session = QuizSession::new();
        session
            .start(vec![
                sq(QuestionType::Single, &[1]),
                sq(QuestionType::Multi, &[2, 3]),
                sq(QuestionType::Single, &[3]),
            ])
            .unwrap();
        session
    }

    #[test]
    fn start_enters_first_question() {
        let session = started();
        let view = session.view().unwrap();
        assert_eq!(view.position, 0);
        assert_eq!(view.total, 3);
        assert!(!view.can_prev);
        assert!(view.can_next);
        assert_eq!(view.options[2], OptionView { position: 3, text: "c".into() });
    }

    #[test]
    fn start_rejects_empty_question_list() {
        let mut session = QuizSession::new();
        assert!(matches!(session.start(vec![]), Err(QuizError::DegenerateSession)));
        assert_eq!(session.phase().name(), "not_started");
    }

    #[test]
    fn navigation_clamps_at_the_ends() {
        let mut session = started();
        assert_eq!(session.prev(None).unwrap(), 0);
        assert_eq!(session.next(None).unwrap(), 1);
        assert_eq!(session.next(None).unwrap(), 2);
        assert_eq!(session.next(None).unwrap(), 2);
        assert!(session.view().unwrap().is_last);
    }

    #[test]
    fn prev_then_next_keeps_position_and_selections() {
        let mut session = started();
        session.next(Some(&[1])).unwrap();
        session.record_selection(1, &[3, 2]).unwrap();
        let before = session.active().unwrap().selections().clone();

        session.prev(None).unwrap();
        assert_eq!(session.next(None).unwrap(), 1);
        assert_eq!(session.active().unwrap().selections(), &before);
        assert_eq!(session.view().unwrap().selected, vec![2, 3]);
    }

    #[test]
    fn pending_selection_is_captured_before_moving() {
        let mut session = started();
        session.next(Some(&[2])).unwrap();
        session.prev(Some(&[1, 3])).unwrap();
        let active = session.active().unwrap();
        assert_eq!(active.selections().selected(0), vec![2]);
        assert_eq!(active.selections().selected(1), vec![1, 3]);
    }

    #[test]
    fn invalid_pending_selection_blocks_navigation() {
        let mut session = started();
        let err = session.next(Some(&[1, 2])).unwrap_err();
        assert!(matches!(err, QuizError::InvalidSelection(_)));
        assert_eq!(session.active().unwrap().position(), 0);
        assert_eq!(session.active().unwrap().selections().selected(0), Vec::<usize>::new());

        assert!(session.record_selection(0, &[4]).is_err());
        assert!(session.record_selection(0, &[0]).is_err());
    }

    #[test]
    fn empty_selection_records_unanswered() {
        let mut session = started();
        session.record_selection(0, &[1]).unwrap();
        session.record_selection(0, &[]).unwrap();
        let active = session.active().unwrap();
        assert!(active.selections().get(0).is_some());
        assert!(active.selections().selected(0).is_empty());
        assert_eq!(session.view().unwrap().answered, 0);
    }

    #[test]
    fn finish_commits_pending_and_scores() {
        let mut session = started();
        session.next(Some(&[1])).unwrap();
        session.next(Some(&[2, 3])).unwrap();
        let result = session.finish(Some(&[3])).unwrap();
        assert_eq!(result.score, 3);
        assert_eq!(result.percent, 100.0);
        assert!(result.missed.is_empty());
        assert_eq!(session.phase().name(), "finished");
    }

    #[test]
    fn finish_from_middle_keeps_existing_records() {
        let mut session = started();
        session.record_selection(2, &[3]).unwrap();
        session.next(Some(&[2])).unwrap();
        let result = session.finish(None).unwrap();
        assert_eq!(result.score, 1);
        assert_eq!(result.missed.len(), 2);
        assert_eq!(result.missed[0].selected, vec![2]);
        assert!(result.missed[1].selected.is_empty());
    }

    #[test]
    fn transitions_outside_progress_are_rejected() {
        let mut session = QuizSession::new();
        assert!(matches!(
            session.next(None),
            Err(QuizError::InvalidTransition { expected: "in_progress", actual: "not_started" })
        ));
        assert!(session.result().is_err());

        let mut session = started();
        session.finish(None).unwrap();
        assert!(session.record_selection(0, &[1]).is_err());
        assert!(session.finish(None).is_err());
        assert!(session.view().is_none());
    }

    #[test]
    fn reset_returns_to_not_started() {
        let mut session = started();
        session.finish(None).unwrap();
        session.reset();
        assert_eq!(session.phase().name(), "not_started");
        assert!(session.result().is_err());
    }
}
