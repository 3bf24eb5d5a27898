use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attempt::decode_config;
use super::bank::QuestionBank;
use super::domain::{
    Attempt, AttemptId, Difficulty, Domain, ExamMode, OptionId, QuestionId, QuestionType,
    StudentId,
};
use super::repository::{AttemptRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("attempt not found: {}", (.0).0)]
    AttemptNotFound(AttemptId),
    #[error("attempt {} is not completed yet", (.0).0)]
    NotCompleted(AttemptId),
    #[error("question not found: {}", (.0).0)]
    QuestionNotFound(QuestionId),
}

/// One row of a learner's completed-attempt history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptHistory {
    pub id: AttemptId,
    pub mode: ExamMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub total_questions: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub unanswered_count: u32,
    pub marked_count: u32,
    pub score_percentage: u8,
    pub locale: String,
}

/// Option row on the review page: correctness and the learner's selection
/// side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionReview {
    pub id: OptionId,
    pub label: String,
    pub text: String,
    pub is_correct: bool,
    pub is_selected: bool,
}

/// Full review of one answered position, 1-indexed for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionReview {
    pub question_id: QuestionId,
    pub position: u32,
    pub domain: Domain,
    pub difficulty: Difficulty,
    pub qtype: QuestionType,
    pub stem: String,
    pub explanation: String,
    pub options: Vec<OptionReview>,
    pub selected_option_ids: Vec<OptionId>,
    pub correct_option_ids: Vec<OptionId>,
    pub is_correct: bool,
    pub is_answered: bool,
    pub marked: bool,
}

/// Read-only service over a learner's completed attempts. An attempt that
/// belongs to a different student is reported as not found rather than as
/// a permission error, so the endpoint leaks nothing about other learners.
pub struct HistoryService<B, AR> {
    repository: Arc<AR>,
    bank: Arc<B>,
}

impl<B, AR> HistoryService<B, AR>
where
    B: QuestionBank + 'static,
    AR: AttemptRepository + 'static,
{
    pub fn new(repository: Arc<AR>, bank: Arc<B>) -> Self {
        Self { repository, bank }
    }

    /// Completed attempts for a student, newest first.
    pub fn attempt_history(
        &self,
        student_id: &StudentId,
        mode: Option<ExamMode>,
        limit: usize,
    ) -> Result<Vec<AttemptHistory>, HistoryError> {
        let attempts = self
            .repository
            .completed_for_student(student_id, mode, limit)?;
        Ok(attempts.iter().map(|attempt| self.build_row(attempt)).collect())
    }

    pub fn attempt_summary(
        &self,
        attempt_id: &AttemptId,
        student_id: &StudentId,
    ) -> Result<AttemptHistory, HistoryError> {
        let attempt = self.owned_attempt(attempt_id, student_id)?;
        Ok(self.build_row(&attempt))
    }

    /// Position-ordered question reviews for a completed attempt.
    pub fn attempt_detail(
        &self,
        attempt_id: &AttemptId,
        student_id: &StudentId,
        lang: Option<&str>,
    ) -> Result<Vec<QuestionReview>, HistoryError> {
        let attempt = self.owned_attempt(attempt_id, student_id)?;
        if !attempt.completed {
            return Err(HistoryError::NotCompleted(attempt_id.clone()));
        }

        let locale = decode_config(&attempt).locale;
        let lang = lang.unwrap_or(&locale);

        let mut slots = attempt.slots.clone();
        slots.sort_by_key(|slot| slot.position);

        slots
            .iter()
            .map(|slot| {
                let question = self
                    .bank
                    .find_by_id(slot.question_id)
                    .ok_or(HistoryError::QuestionNotFound(slot.question_id))?;

                let selected = slot.selected_option_ids();
                let correct = question.correct_option_ids();
                let is_answered = !selected.is_empty();

                let options = question
                    .options
                    .iter()
                    .map(|option| OptionReview {
                        id: option.id,
                        label: option.label.clone(),
                        text: option.text.resolve(lang).to_string(),
                        is_correct: option.is_correct,
                        is_selected: selected.contains(&option.id),
                    })
                    .collect();

                Ok(QuestionReview {
                    question_id: question.id,
                    position: slot.position + 1,
                    domain: question.domain,
                    difficulty: question.difficulty,
                    qtype: question.qtype,
                    stem: question.stem.resolve(lang).to_string(),
                    explanation: question.explanation.resolve(lang).to_string(),
                    options,
                    selected_option_ids: selected.iter().copied().collect(),
                    correct_option_ids: correct.iter().copied().collect(),
                    is_correct: is_answered && selected == correct,
                    is_answered,
                    marked: slot.marked,
                })
            })
            .collect()
    }

    fn owned_attempt(
        &self,
        attempt_id: &AttemptId,
        student_id: &StudentId,
    ) -> Result<Attempt, HistoryError> {
        let attempt = self
            .repository
            .fetch(attempt_id)?
            .ok_or_else(|| HistoryError::AttemptNotFound(attempt_id.clone()))?;
        if attempt.student_id != *student_id {
            tracing::warn!(
                attempt = %attempt_id.0,
                "attempt requested by a student it does not belong to"
            );
            return Err(HistoryError::AttemptNotFound(attempt_id.clone()));
        }
        Ok(attempt)
    }

    fn build_row(&self, attempt: &Attempt) -> AttemptHistory {
        let mut correct_count = 0u32;
        let mut incorrect_count = 0u32;
        let mut unanswered_count = 0u32;

        for slot in &attempt.slots {
            let selected = slot.selected_option_ids();
            if selected.is_empty() {
                unanswered_count += 1;
                continue;
            }
            let correct = self
                .bank
                .find_by_id(slot.question_id)
                .map(|question| question.correct_option_ids());
            if correct.is_some_and(|correct| correct == selected) {
                correct_count += 1;
            } else {
                incorrect_count += 1;
            }
        }

        let score_percentage = attempt.score_percentage.unwrap_or_else(|| {
            if attempt.total_questions == 0 {
                0
            } else {
                (f64::from(correct_count) * 100.0 / f64::from(attempt.total_questions)).round()
                    as u8
            }
        });

        AttemptHistory {
            id: attempt.id.clone(),
            mode: attempt.mode,
            started_at: attempt.started_at,
            completed_at: attempt.ended_at,
            duration_seconds: attempt.duration_seconds,
            total_questions: attempt.total_questions,
            correct_count,
            incorrect_count,
            unanswered_count,
            marked_count: attempt.marked_count(),
            score_percentage,
            locale: decode_config(attempt).locale,
        }
    }
}
