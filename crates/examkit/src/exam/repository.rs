use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use super::domain::{Attempt, AttemptId, ExamMode, ExamSession, SessionId, StudentId};

/// Error enumeration for persistence failures. Constraint violations on
/// creation indicate a selector or tracker defect upstream and are treated
/// as fatal, never as a retry condition.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("uniqueness constraint violated: {0}")]
    ConstraintViolation(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Storage contract for write-once exam sessions. `insert` persists the
/// session metadata and its full position assignment as one atomic batch:
/// either every row becomes visible or none does.
pub trait SessionRepository: Send + Sync {
    fn insert(&self, session: ExamSession) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &SessionId) -> Result<Option<ExamSession>, RepositoryError>;
    fn update(&self, session: ExamSession) -> Result<(), RepositoryError>;
}

/// Storage contract for attempts and their answer slots. Slot updates go
/// through whole-record `update`; last write wins on a racing slot.
pub trait AttemptRepository: Send + Sync {
    fn insert(&self, attempt: Attempt) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &AttemptId) -> Result<Option<Attempt>, RepositoryError>;
    fn update(&self, attempt: Attempt) -> Result<(), RepositoryError>;
    /// Completed attempts for a student, newest first, truncated to `limit`.
    fn completed_for_student(
        &self,
        student_id: &StudentId,
        mode: Option<ExamMode>,
        limit: usize,
    ) -> Result<Vec<Attempt>, RepositoryError>;
}

/// Enforce the session uniqueness contract: distinct question ids, and
/// positions forming exactly `1..=total` with no gaps or repeats.
pub(crate) fn validate_session(session: &ExamSession) -> Result<(), RepositoryError> {
    if session.assignments.len() as u32 != session.total_questions {
        return Err(RepositoryError::ConstraintViolation(format!(
            "session {} has {} assignments for {} requested questions",
            session.id.0,
            session.assignments.len(),
            session.total_questions
        )));
    }

    let mut question_ids = BTreeSet::new();
    let mut positions = BTreeSet::new();
    for assignment in &session.assignments {
        if !question_ids.insert(assignment.question_id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "question {} assigned twice in session {}",
                assignment.question_id.0, session.id.0
            )));
        }
        if !positions.insert(assignment.position) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "position {} assigned twice in session {}",
                assignment.position, session.id.0
            )));
        }
    }

    let contiguous = positions
        .iter()
        .zip(1..=session.total_questions)
        .all(|(have, want)| *have == want);
    if !contiguous {
        return Err(RepositoryError::ConstraintViolation(format!(
            "session {} positions are not contiguous from 1",
            session.id.0
        )));
    }

    Ok(())
}

/// Enforce the attempt uniqueness contract: distinct question ids, and slot
/// positions forming exactly `0..total` with no gaps or repeats.
pub(crate) fn validate_attempt(attempt: &Attempt) -> Result<(), RepositoryError> {
    if attempt.slots.len() as u32 != attempt.total_questions {
        return Err(RepositoryError::ConstraintViolation(format!(
            "attempt {} has {} slots for {} questions",
            attempt.id.0,
            attempt.slots.len(),
            attempt.total_questions
        )));
    }

    let mut question_ids = BTreeSet::new();
    let mut positions = BTreeSet::new();
    for slot in &attempt.slots {
        if !question_ids.insert(slot.question_id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "question {} has two slots in attempt {}",
                slot.question_id.0, attempt.id.0
            )));
        }
        if !positions.insert(slot.position) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "position {} has two slots in attempt {}",
                slot.position, attempt.id.0
            )));
        }
    }

    let contiguous = positions
        .iter()
        .zip(0..attempt.total_questions)
        .all(|(have, want)| *have == want);
    if !contiguous {
        return Err(RepositoryError::ConstraintViolation(format!(
            "attempt {} slot positions are not contiguous from 0",
            attempt.id.0
        )));
    }

    Ok(())
}

/// Mutex-guarded map store. Validation runs before any state changes, so a
/// rejected batch never becomes partially visible.
#[derive(Default, Clone)]
pub struct InMemorySessionRepository {
    sessions: Arc<Mutex<BTreeMap<SessionId, ExamSession>>>,
}

impl SessionRepository for InMemorySessionRepository {
    fn insert(&self, session: ExamSession) -> Result<(), RepositoryError> {
        validate_session(&session)?;
        let mut guard = self.sessions.lock().expect("session repository mutex poisoned");
        if guard.contains_key(&session.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(session.id.clone(), session);
        Ok(())
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<ExamSession>, RepositoryError> {
        let guard = self.sessions.lock().expect("session repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, session: ExamSession) -> Result<(), RepositoryError> {
        let mut guard = self.sessions.lock().expect("session repository mutex poisoned");
        if !guard.contains_key(&session.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(session.id.clone(), session);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAttemptRepository {
    attempts: Arc<Mutex<BTreeMap<AttemptId, Attempt>>>,
}

impl AttemptRepository for InMemoryAttemptRepository {
    fn insert(&self, attempt: Attempt) -> Result<(), RepositoryError> {
        validate_attempt(&attempt)?;
        let mut guard = self.attempts.lock().expect("attempt repository mutex poisoned");
        if guard.contains_key(&attempt.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(attempt.id.clone(), attempt);
        Ok(())
    }

    fn fetch(&self, id: &AttemptId) -> Result<Option<Attempt>, RepositoryError> {
        let guard = self.attempts.lock().expect("attempt repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, attempt: Attempt) -> Result<(), RepositoryError> {
        let mut guard = self.attempts.lock().expect("attempt repository mutex poisoned");
        if !guard.contains_key(&attempt.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(attempt.id.clone(), attempt);
        Ok(())
    }

    fn completed_for_student(
        &self,
        student_id: &StudentId,
        mode: Option<ExamMode>,
        limit: usize,
    ) -> Result<Vec<Attempt>, RepositoryError> {
        let guard = self.attempts.lock().expect("attempt repository mutex poisoned");
        let mut attempts: Vec<Attempt> = guard
            .values()
            .filter(|attempt| attempt.completed && attempt.student_id == *student_id)
            .filter(|attempt| mode.map_or(true, |wanted| attempt.mode == wanted))
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        attempts.truncate(limit);
        Ok(attempts)
    }
}
