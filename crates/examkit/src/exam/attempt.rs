use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bank::QuestionBank;
use super::blueprint::{BlueprintError, ExamBlueprint};
use super::domain::{
    AnswerSlot, Attempt, AttemptId, OptionId, QuestionId, QuestionView, SlotState, StudentId,
};
use super::repository::{AttemptRepository, RepositoryError, SessionRepository};
use super::scoring::{score_attempt, ResultSummary};
use super::session::{SessionError, SessionService};

#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error(transparent)]
    Blueprint(#[from] BlueprintError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("attempt not found: {}", (.0).0)]
    AttemptNotFound(AttemptId),
    #[error("no slot for question {} in attempt {}", question.0, attempt.0)]
    SlotNotFound {
        attempt: AttemptId,
        question: QuestionId,
    },
    #[error("no question at index {index} in attempt {}", attempt.0)]
    IndexOutOfRange { attempt: AttemptId, index: u32 },
    #[error("question not found: {}", (.0).0)]
    QuestionNotFound(QuestionId),
    #[error("attempt {} is already completed", (.0).0)]
    AlreadyCompleted(AttemptId),
    #[error("attempt {} is not completed yet", (.0).0)]
    NotCompleted(AttemptId),
}

/// One answer submission for a single slot. A non-empty selection replaces
/// the previous one wholesale; an empty selection reverts the slot to
/// unanswered. The marked flag only changes when explicitly provided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    #[serde(default)]
    pub selected_option_ids: Vec<OptionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marked: Option<bool>,
}

/// Progress counters for the navigation palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStatus {
    pub total_questions: u32,
    pub answered: u32,
    pub unanswered: u32,
    pub marked: u32,
    pub current_index: u32,
}

/// Per-learner state machine over a session's positions: captures
/// selections and marks, tracks the navigation pointer, and finalizes the
/// attempt exactly once.
pub struct AttemptService<B, SR, AR> {
    sessions: Arc<SessionService<B, SR>>,
    repository: Arc<AR>,
    bank: Arc<B>,
}

impl<B, SR, AR> AttemptService<B, SR, AR>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    pub fn new(sessions: Arc<SessionService<B, SR>>, repository: Arc<AR>, bank: Arc<B>) -> Self {
        Self {
            sessions,
            repository,
            bank,
        }
    }

    /// Create an attempt backed by a fresh session so the question list is
    /// unique by construction. Slots are created with sequential positions
    /// starting at 0, empty selections, and `marked = false`.
    pub fn create_attempt(
        &self,
        blueprint: &ExamBlueprint,
        student_id: StudentId,
    ) -> Result<Attempt, AttemptError> {
        self.create_with(blueprint, student_id, None)
    }

    /// Seeded variant for deterministic reproduction in tests and audits.
    pub fn create_attempt_with_seed(
        &self,
        blueprint: &ExamBlueprint,
        student_id: StudentId,
        seed: u64,
    ) -> Result<Attempt, AttemptError> {
        self.create_with(blueprint, student_id, Some(seed))
    }

    fn create_with(
        &self,
        blueprint: &ExamBlueprint,
        student_id: StudentId,
        seed: Option<u64>,
    ) -> Result<Attempt, AttemptError> {
        blueprint.validate()?;

        let domains = blueprint.effective_domains();
        let session_id = match seed {
            Some(seed) => self.sessions.start_session_with_seed(
                seed,
                blueprint.mode,
                blueprint.total_questions,
                &blueprint.locale,
                &domains,
                blueprint.percentages.as_ref(),
            )?,
            None => self.sessions.start_session(
                blueprint.mode,
                blueprint.total_questions,
                &blueprint.locale,
                &domains,
                blueprint.percentages.as_ref(),
            )?,
        };

        let question_ids = self.sessions.ordered_question_ids(&session_id)?;

        let config_json = match serde_json::to_string(blueprint) {
            Ok(json) => Some(json),
            Err(err) => {
                tracing::error!(%err, "failed to serialize attempt configuration");
                None
            }
        };

        let slots = question_ids
            .iter()
            .enumerate()
            .map(|(index, question_id)| AnswerSlot::empty(index as u32, *question_id))
            .collect::<Vec<_>>();

        let attempt = Attempt {
            id: AttemptId(Uuid::new_v4().to_string()),
            session_id: session_id.clone(),
            student_id,
            mode: blueprint.mode,
            total_questions: question_ids.len() as u32,
            started_at: Utc::now(),
            ended_at: None,
            duration_seconds: None,
            score_percentage: None,
            current_index: 0,
            completed: false,
            config_json,
            slots,
        };

        self.repository.insert(attempt.clone())?;
        tracing::info!(
            attempt = %attempt.id.0,
            session = %session_id.0,
            questions = attempt.total_questions,
            "attempt created"
        );
        Ok(attempt)
    }

    pub fn attempt(&self, id: &AttemptId) -> Result<Attempt, AttemptError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| AttemptError::AttemptNotFound(id.clone()))
    }

    /// Question ids in stable position order.
    pub fn question_ids(&self, id: &AttemptId) -> Result<Vec<QuestionId>, AttemptError> {
        let attempt = self.attempt(id)?;
        let mut slots = attempt.slots;
        slots.sort_by_key(|slot| slot.position);
        Ok(slots.into_iter().map(|slot| slot.question_id).collect())
    }

    /// Resolve a 0-indexed position to a view joined with bank content and
    /// the slot's current selection and marked state. Repeated calls with
    /// unchanged state return identical views.
    pub fn question_view(
        &self,
        id: &AttemptId,
        index: u32,
        lang: Option<&str>,
    ) -> Result<QuestionView, AttemptError> {
        let attempt = self.attempt(id)?;
        let slot = attempt
            .slot_at(index)
            .ok_or(AttemptError::IndexOutOfRange {
                attempt: id.clone(),
                index,
            })?;
        let record = self
            .bank
            .find_by_id(slot.question_id)
            .ok_or(AttemptError::QuestionNotFound(slot.question_id))?;

        let locale = self.locale_of(&attempt);
        let lang = lang.unwrap_or(&locale);
        Ok(
            QuestionView::project(&record, index, attempt.mode.reveals_answers(), lang)
                .with_slot_state(slot),
        )
    }

    /// Record a submission. The slot is located by question id, not by
    /// position. Concurrent submissions to the same slot resolve as last
    /// write wins; there is no optimistic versioning.
    pub fn submit_answer(
        &self,
        id: &AttemptId,
        submission: &AnswerSubmission,
    ) -> Result<(), AttemptError> {
        let mut attempt = self.attempt(id)?;
        if attempt.completed {
            return Err(AttemptError::AlreadyCompleted(id.clone()));
        }

        let slot = attempt
            .slot_for_question_mut(submission.question_id)
            .ok_or(AttemptError::SlotNotFound {
                attempt: id.clone(),
                question: submission.question_id,
            })?;

        if submission.selected_option_ids.is_empty() {
            slot.selected_json = None;
            slot.answered_at = None;
        } else {
            match serde_json::to_string(&submission.selected_option_ids) {
                Ok(json) => {
                    slot.selected_json = Some(json);
                    slot.answered_at = Some(Utc::now());
                }
                Err(err) => {
                    tracing::error!(%err, "failed to serialize selection, slot left unchanged");
                }
            }
        }

        if let Some(marked) = submission.marked {
            slot.marked = marked;
        }

        self.repository.update(attempt)?;
        Ok(())
    }

    /// Persist the navigation pointer. Out-of-range indexes are handled
    /// leniently by redirecting to position 0 rather than failing.
    pub fn navigate(&self, id: &AttemptId, index: i64) -> Result<u32, AttemptError> {
        let mut attempt = self.attempt(id)?;
        let clamped = if index < 0 || index >= i64::from(attempt.total_questions) {
            0
        } else {
            index as u32
        };
        attempt.current_index = clamped;
        self.repository.update(attempt)?;
        Ok(clamped)
    }

    pub fn status(&self, id: &AttemptId) -> Result<AttemptStatus, AttemptError> {
        let attempt = self.attempt(id)?;
        let answered = attempt.answered_count();
        Ok(AttemptStatus {
            total_questions: attempt.total_questions,
            answered,
            unanswered: attempt.total_questions - answered,
            marked: attempt.marked_count(),
            current_index: attempt.current_index,
        })
    }

    /// Combined answered/marked state per slot, in position order.
    pub fn slot_states(&self, id: &AttemptId) -> Result<Vec<SlotState>, AttemptError> {
        let attempt = self.attempt(id)?;
        let mut slots = attempt.slots;
        slots.sort_by_key(|slot| slot.position);
        Ok(slots.iter().map(AnswerSlot::state).collect())
    }

    /// Finalize the attempt exactly once: stamp `ended_at`, derive the
    /// duration, grade, and store the rounded score percentage. A second
    /// completion is an invalid state, unlike the idempotent session
    /// counterpart, because an attempt is a one-shot gradable event.
    pub fn complete_attempt(&self, id: &AttemptId) -> Result<ResultSummary, AttemptError> {
        let mut attempt = self.attempt(id)?;
        if attempt.completed {
            return Err(AttemptError::AlreadyCompleted(id.clone()));
        }

        let ended_at = Utc::now();
        attempt.ended_at = Some(ended_at);
        attempt.duration_seconds = Some((ended_at - attempt.started_at).num_seconds());

        let summary = score_attempt(&attempt, self.bank.as_ref());
        attempt.score_percentage = Some(summary.score_percentage);
        attempt.completed = true;
        self.repository.update(attempt)?;

        tracing::info!(
            attempt = %id.0,
            score = summary.score_percentage,
            correct = summary.correct_count,
            "attempt completed"
        );
        Ok(summary)
    }

    /// Grade the completed attempt again on demand. Requesting results
    /// before completion is an invalid state.
    pub fn results(&self, id: &AttemptId) -> Result<ResultSummary, AttemptError> {
        let attempt = self.attempt(id)?;
        if !attempt.completed {
            return Err(AttemptError::NotCompleted(id.clone()));
        }
        Ok(score_attempt(&attempt, self.bank.as_ref()))
    }

    /// The blueprint the attempt was created with. A missing or malformed
    /// stored payload degrades to a default blueprint for the attempt's
    /// mode and size instead of failing the exam flow.
    pub fn attempt_config(&self, id: &AttemptId) -> Result<ExamBlueprint, AttemptError> {
        let attempt = self.attempt(id)?;
        Ok(decode_config(&attempt))
    }

    fn locale_of(&self, attempt: &Attempt) -> String {
        decode_config(attempt).locale
    }
}

pub(crate) fn decode_config(attempt: &Attempt) -> ExamBlueprint {
    let Some(raw) = attempt.config_json.as_deref() else {
        return ExamBlueprint::fallback(attempt.mode, attempt.total_questions);
    };
    match serde_json::from_str(raw) {
        Ok(blueprint) => blueprint,
        Err(err) => {
            tracing::warn!(
                attempt = %attempt.id.0,
                %err,
                "malformed stored configuration, using defaults"
            );
            ExamBlueprint::fallback(attempt.mode, attempt.total_questions)
        }
    }
}
