//! Exam delivery engine: question selection, session assignment, attempt
//! tracking, and scoring.
//!
//! The central contract the whole module protects is read stability: two
//! reads of a session's order, an attempt's status, or a question view with
//! no intervening write return identical results. A failure there shows up
//! as a learner seeing a different question at the same index.

pub mod attempt;
pub mod bank;
pub mod blueprint;
pub mod domain;
pub mod history;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod selector;
pub mod session;

#[cfg(test)]
mod tests;

pub use attempt::{AnswerSubmission, AttemptError, AttemptService, AttemptStatus};
pub use bank::{generate_fixture_bank, InMemoryQuestionBank, QuestionBank};
pub use blueprint::{BlueprintError, ExamBlueprint};
pub use domain::{
    AnswerSlot, Attempt, AttemptId, Difficulty, Domain, ExamMode, ExamSession, LocalizedText,
    OptionId, OptionRecord, OptionView, QuestionId, QuestionRecord, QuestionType, QuestionView,
    SessionAssignment, SessionId, SlotState, StudentId,
};
pub use history::{AttemptHistory, HistoryError, HistoryService, OptionReview, QuestionReview};
pub use repository::{
    AttemptRepository, InMemoryAttemptRepository, InMemorySessionRepository, RepositoryError,
    SessionRepository,
};
pub use router::{exam_router, ExamEngine};
pub use scoring::{score_attempt, DomainBreakdown, QuestionResult, ResultSummary};
pub use selector::{QuestionSelector, SelectionError};
pub use session::{SessionError, SessionService};
