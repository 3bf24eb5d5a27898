use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for a question in the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub u64);

/// Identifier for an answer option within a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OptionId(pub u64);

/// Identifier wrapper for exam sessions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Identifier wrapper for attempts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub String);

/// Opaque learner identifier supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StudentId(pub String);

/// Delivery mode deciding whether correct answers are revealed while the
/// exam is in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamMode {
    #[default]
    Exam,
    Practice,
}

impl ExamMode {
    pub const fn label(self) -> &'static str {
        match self {
            ExamMode::Exam => "exam",
            ExamMode::Practice => "practice",
        }
    }

    /// Practice mode reveals correctness flags on in-flight question views.
    pub const fn reveals_answers(self) -> bool {
        matches!(self, ExamMode::Practice)
    }
}

/// Subject-matter category used both for content organization and for
/// quota-based sampling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    IdentityGovernance,
    Storage,
    Compute,
    Networking,
    MonitorMaintain,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::IdentityGovernance,
        Domain::Storage,
        Domain::Compute,
        Domain::Networking,
        Domain::MonitorMaintain,
    ];

    pub const fn display_name(self) -> &'static str {
        match self {
            Domain::IdentityGovernance => "Identity & Governance",
            Domain::Storage => "Storage",
            Domain::Compute => "Compute",
            Domain::Networking => "Networking",
            Domain::MonitorMaintain => "Monitor & Maintain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Question shapes the bank can hold. `Matching` and `Ordering` are
/// reserved for future content and never emitted by the fixture generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Single,
    Multi,
    YesNo,
    Matching,
    Ordering,
}

/// Text with a required default rendition plus optional translations.
/// Resolution falls back to the default when the requested language tag is
/// missing or maps to an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub translations: BTreeMap<String, String>,
}

impl LocalizedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            translations: BTreeMap::new(),
        }
    }

    pub fn with_translation(mut self, lang: impl Into<String>, text: impl Into<String>) -> Self {
        self.translations.insert(lang.into(), text.into());
        self
    }

    pub fn resolve(&self, lang: &str) -> &str {
        match self.translations.get(lang) {
            Some(text) if !text.is_empty() => text,
            _ => &self.text,
        }
    }
}

/// One answer option owned by a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionRecord {
    pub id: OptionId,
    pub label: String,
    pub text: LocalizedText,
    pub is_correct: bool,
}

/// Immutable bank record for a single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: QuestionId,
    pub domain: Domain,
    pub difficulty: Difficulty,
    pub qtype: QuestionType,
    pub stem: LocalizedText,
    pub explanation: LocalizedText,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub options: Vec<OptionRecord>,
}

impl QuestionRecord {
    pub fn correct_option_ids(&self) -> BTreeSet<OptionId> {
        self.options
            .iter()
            .filter(|option| option.is_correct)
            .map(|option| option.id)
            .collect()
    }
}

/// One position row of a session's write-once question assignment.
/// Positions are 1-indexed and contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAssignment {
    pub position: u32,
    pub question_id: QuestionId,
}

/// Write-once, position-ordered question list generated by the selector and
/// reusable for delivery. Only `completed_at` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: SessionId,
    pub mode: ExamMode,
    pub total_questions: u32,
    pub locale: String,
    pub seed: u64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assignments: Vec<SessionAssignment>,
}

impl ExamSession {
    pub fn question_id_at(&self, position: u32) -> Option<QuestionId> {
        self.assignments
            .iter()
            .find(|assignment| assignment.position == position)
            .map(|assignment| assignment.question_id)
    }

    pub fn ordered_question_ids(&self) -> Vec<QuestionId> {
        self.assignments
            .iter()
            .map(|assignment| assignment.question_id)
            .collect()
    }
}

/// Per-position record holding a learner's current selection and marked
/// flag within an attempt. Positions are 0-indexed.
///
/// The selection is persisted as a JSON array payload. A payload that fails
/// to decode is treated as "no selection" so a single corrupt row cannot
/// take the exam flow down; the decode failure is logged instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSlot {
    pub position: u32,
    pub question_id: QuestionId,
    pub selected_json: Option<String>,
    pub marked: bool,
    pub answered_at: Option<DateTime<Utc>>,
}

impl AnswerSlot {
    pub fn empty(position: u32, question_id: QuestionId) -> Self {
        Self {
            position,
            question_id,
            selected_json: None,
            marked: false,
            answered_at: None,
        }
    }

    pub fn selected_option_ids(&self) -> BTreeSet<OptionId> {
        let Some(raw) = self.selected_json.as_deref() else {
            return BTreeSet::new();
        };
        match serde_json::from_str::<Vec<OptionId>>(raw) {
            Ok(ids) => ids.into_iter().collect(),
            Err(err) => {
                tracing::warn!(
                    position = self.position,
                    question_id = self.question_id.0,
                    %err,
                    "malformed stored selection, treating as unanswered"
                );
                BTreeSet::new()
            }
        }
    }

    pub fn is_answered(&self) -> bool {
        !self.selected_option_ids().is_empty()
    }

    pub fn state(&self) -> SlotState {
        match (self.is_answered(), self.marked) {
            (true, true) => SlotState::AnsweredMarked,
            (true, false) => SlotState::Answered,
            (false, true) => SlotState::Marked,
            (false, false) => SlotState::Unanswered,
        }
    }
}

/// Combined answered/marked state of a slot. The two axes are orthogonal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Unanswered,
    Answered,
    Marked,
    AnsweredMarked,
}

impl SlotState {
    pub const fn label(self) -> &'static str {
        match self {
            SlotState::Unanswered => "unanswered",
            SlotState::Answered => "answered",
            SlotState::Marked => "marked",
            SlotState::AnsweredMarked => "answered marked",
        }
    }
}

/// One-shot gradable instance of answering a session's questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub mode: ExamMode,
    pub total_questions: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub score_percentage: Option<u8>,
    pub current_index: u32,
    pub completed: bool,
    pub config_json: Option<String>,
    pub slots: Vec<AnswerSlot>,
}

impl Attempt {
    pub fn slot_for_question(&self, question_id: QuestionId) -> Option<&AnswerSlot> {
        self.slots.iter().find(|slot| slot.question_id == question_id)
    }

    pub fn slot_for_question_mut(&mut self, question_id: QuestionId) -> Option<&mut AnswerSlot> {
        self.slots
            .iter_mut()
            .find(|slot| slot.question_id == question_id)
    }

    pub fn slot_at(&self, position: u32) -> Option<&AnswerSlot> {
        self.slots.iter().find(|slot| slot.position == position)
    }

    pub fn answered_count(&self) -> u32 {
        self.slots.iter().filter(|slot| slot.is_answered()).count() as u32
    }

    pub fn marked_count(&self) -> u32 {
        self.slots.iter().filter(|slot| slot.marked).count() as u32
    }
}

/// Sanitized option representation for delivery. Correctness is only
/// populated when the view is built in practice mode or for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionView {
    pub id: OptionId,
    pub label: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

/// Question joined with bank content and, for attempts, the learner's
/// current selection and marked flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub question_id: QuestionId,
    pub position: u32,
    pub domain: Domain,
    pub difficulty: Difficulty,
    pub qtype: QuestionType,
    pub stem: String,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub options: Vec<OptionView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_option_ids: Vec<OptionId>,
    pub answered: bool,
    pub marked: bool,
}

impl QuestionView {
    /// Project a bank record into a delivery view. `reveal_answers` drives
    /// whether per-option correctness is exposed.
    pub fn project(
        record: &QuestionRecord,
        position: u32,
        reveal_answers: bool,
        lang: &str,
    ) -> Self {
        let options = record
            .options
            .iter()
            .map(|option| OptionView {
                id: option.id,
                label: option.label.clone(),
                text: option.text.resolve(lang).to_string(),
                is_correct: reveal_answers.then_some(option.is_correct),
            })
            .collect();

        Self {
            question_id: record.id,
            position,
            domain: record.domain,
            difficulty: record.difficulty,
            qtype: record.qtype,
            stem: record.stem.resolve(lang).to_string(),
            explanation: record.explanation.resolve(lang).to_string(),
            tags: record.tags.clone(),
            options,
            selected_option_ids: Vec::new(),
            answered: false,
            marked: false,
        }
    }

    pub fn with_slot_state(mut self, slot: &AnswerSlot) -> Self {
        self.selected_option_ids = slot.selected_option_ids().into_iter().collect();
        self.answered = !self.selected_option_ids.is_empty();
        self.marked = slot.marked;
        self
    }
}
