use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::bank::QuestionBank;
use super::domain::{
    Domain, ExamMode, ExamSession, QuestionId, QuestionView, SessionAssignment, SessionId,
};
use super::repository::{RepositoryError, SessionRepository};
use super::selector::{QuestionSelector, SelectionError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("session not found: {}", (.0).0)]
    SessionNotFound(SessionId),
    #[error("no question at position {position} in session {}", session.0)]
    PositionNotFound { session: SessionId, position: u32 },
    #[error("question not found: {}", (.0).0)]
    QuestionNotFound(QuestionId),
}

/// Session store: runs the selector once per session and persists the
/// resulting position order as a write-once container. Every read of the
/// order is repeatable; a learner must see the same question at the same
/// position for the lifetime of the session.
pub struct SessionService<B, R> {
    bank: Arc<B>,
    repository: Arc<R>,
}

impl<B, R> SessionService<B, R>
where
    B: QuestionBank + 'static,
    R: SessionRepository + 'static,
{
    pub fn new(bank: Arc<B>, repository: Arc<R>) -> Self {
        Self { bank, repository }
    }

    /// Create a session from a fresh random seed. A repository constraint
    /// violation here means the selector produced a defective draw and is
    /// surfaced as a fatal creation error; callers may retry from scratch
    /// but the store never reshuffles internally.
    pub fn start_session(
        &self,
        mode: ExamMode,
        total_questions: u32,
        locale: &str,
        domains: &[Domain],
        percentages: Option<&BTreeMap<Domain, u8>>,
    ) -> Result<SessionId, SessionError> {
        self.start_session_with_seed(
            rand::random(),
            mode,
            total_questions,
            locale,
            domains,
            percentages,
        )
    }

    /// Seeded variant used by tests and audit replays; the seed is stored
    /// on the session so any draw can be reproduced later.
    pub fn start_session_with_seed(
        &self,
        seed: u64,
        mode: ExamMode,
        total_questions: u32,
        locale: &str,
        domains: &[Domain],
        percentages: Option<&BTreeMap<Domain, u8>>,
    ) -> Result<SessionId, SessionError> {
        let id = SessionId(Uuid::new_v4().to_string());
        tracing::info!(
            session = %id.0,
            mode = mode.label(),
            total_questions,
            locale,
            seed,
            "starting session"
        );

        let mut selector = QuestionSelector::with_seed(seed);
        let selected = selector.draw(self.bank.as_ref(), domains, total_questions, percentages)?;

        let assignments = selected
            .iter()
            .enumerate()
            .map(|(index, question)| SessionAssignment {
                position: index as u32 + 1,
                question_id: question.id,
            })
            .collect();

        let session = ExamSession {
            id: id.clone(),
            mode,
            total_questions,
            locale: locale.to_string(),
            seed,
            created_at: Utc::now(),
            completed_at: None,
            assignments,
        };

        self.repository.insert(session)?;
        tracing::info!(session = %id.0, total_questions, "session created");
        Ok(id)
    }

    pub fn session(&self, id: &SessionId) -> Result<ExamSession, SessionError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| SessionError::SessionNotFound(id.clone()))
    }

    /// Resolve a 1-indexed position to a question view. Correct answers are
    /// flagged only when the session was created in practice mode.
    pub fn question_at_position(
        &self,
        id: &SessionId,
        position: u32,
        lang: Option<&str>,
    ) -> Result<QuestionView, SessionError> {
        let session = self.session(id)?;
        let question_id =
            session
                .question_id_at(position)
                .ok_or(SessionError::PositionNotFound {
                    session: id.clone(),
                    position,
                })?;
        let record = self
            .bank
            .find_by_id(question_id)
            .ok_or(SessionError::QuestionNotFound(question_id))?;

        let lang = lang.unwrap_or(&session.locale);
        Ok(QuestionView::project(
            &record,
            position,
            session.mode.reveals_answers(),
            lang,
        ))
    }

    /// Idempotent read of the session's question order.
    pub fn ordered_question_ids(&self, id: &SessionId) -> Result<Vec<QuestionId>, SessionError> {
        Ok(self.session(id)?.ordered_question_ids())
    }

    /// Position-ordered views for the review page. Never reveals
    /// correctness, regardless of mode.
    pub fn session_summary(
        &self,
        id: &SessionId,
        lang: Option<&str>,
    ) -> Result<Vec<(u32, QuestionView)>, SessionError> {
        let session = self.session(id)?;
        let lang = lang.unwrap_or(&session.locale);

        session
            .assignments
            .iter()
            .map(|assignment| {
                let record = self
                    .bank
                    .find_by_id(assignment.question_id)
                    .ok_or(SessionError::QuestionNotFound(assignment.question_id))?;
                Ok((
                    assignment.position,
                    QuestionView::project(&record, assignment.position, false, lang),
                ))
            })
            .collect()
    }

    /// Stamp `completed_at` if unset. Sessions are reusable containers, so
    /// completing twice is a no-op returning the original timestamp.
    pub fn complete_session(&self, id: &SessionId) -> Result<DateTime<Utc>, SessionError> {
        let mut session = self.session(id)?;
        if let Some(completed_at) = session.completed_at {
            return Ok(completed_at);
        }

        let completed_at = Utc::now();
        session.completed_at = Some(completed_at);
        self.repository.update(session)?;
        tracing::info!(session = %id.0, "session completed");
        Ok(completed_at)
    }

    pub fn is_active(&self, id: &SessionId) -> Result<bool, SessionError> {
        match self.repository.fetch(id)? {
            Some(session) => Ok(session.completed_at.is_none()),
            None => Ok(false),
        }
    }
}
