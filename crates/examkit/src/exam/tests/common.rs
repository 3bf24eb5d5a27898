use std::collections::BTreeMap;
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::exam::bank::{generate_fixture_bank, InMemoryQuestionBank};
use crate::exam::blueprint::ExamBlueprint;
use crate::exam::domain::{
    AnswerSlot, Difficulty, Domain, ExamMode, LocalizedText, OptionId, OptionRecord, QuestionId,
    QuestionRecord, QuestionType, StudentId,
};
use crate::exam::repository::{InMemoryAttemptRepository, InMemorySessionRepository};
use crate::exam::router::ExamEngine;

pub(super) type MemoryEngine =
    ExamEngine<InMemoryQuestionBank, InMemorySessionRepository, InMemoryAttemptRepository>;

pub(super) fn fixture_bank(questions_per_domain: usize) -> Arc<InMemoryQuestionBank> {
    Arc::new(generate_fixture_bank(questions_per_domain))
}

pub(super) fn build_engine(
    bank: Arc<InMemoryQuestionBank>,
) -> (
    MemoryEngine,
    Arc<InMemorySessionRepository>,
    Arc<InMemoryAttemptRepository>,
) {
    let session_repository = Arc::new(InMemorySessionRepository::default());
    let attempt_repository = Arc::new(InMemoryAttemptRepository::default());
    let engine = ExamEngine::new(bank, session_repository.clone(), attempt_repository.clone());
    (engine, session_repository, attempt_repository)
}

/// Question with explicit option ids and correctness, for grading tests.
pub(super) fn question_with_options(
    id: u64,
    domain: Domain,
    qtype: QuestionType,
    options: &[(u64, bool)],
) -> QuestionRecord {
    QuestionRecord {
        id: QuestionId(id),
        domain,
        difficulty: Difficulty::Medium,
        qtype,
        stem: LocalizedText::new(format!("Question {id}"))
            .with_translation("es", format!("Pregunta {id}")),
        explanation: LocalizedText::new(format!("Explanation {id}")),
        tags: Vec::new(),
        options: options
            .iter()
            .map(|(option_id, is_correct)| OptionRecord {
                id: OptionId(*option_id),
                label: format!("O{option_id}"),
                text: LocalizedText::new(format!("Option {option_id}")),
                is_correct: *is_correct,
            })
            .collect(),
    }
}

pub(super) fn slot_with_selection(position: u32, question_id: u64, selected: &[u64]) -> AnswerSlot {
    let mut slot = AnswerSlot::empty(position, QuestionId(question_id));
    if !selected.is_empty() {
        let ids: Vec<OptionId> = selected.iter().map(|id| OptionId(*id)).collect();
        slot.selected_json = Some(serde_json::to_string(&ids).expect("selection serializes"));
        slot.answered_at = Some(chrono::Utc::now());
    }
    slot
}

pub(super) fn exam_blueprint(total_questions: u32) -> ExamBlueprint {
    ExamBlueprint {
        mode: ExamMode::Exam,
        total_questions,
        locale: "en".to_string(),
        domains: Domain::ALL.to_vec(),
        percentages: None,
        time_limit_minutes: 100,
    }
}

pub(super) fn practice_blueprint(total_questions: u32) -> ExamBlueprint {
    ExamBlueprint {
        mode: ExamMode::Practice,
        ..exam_blueprint(total_questions)
    }
}

pub(super) fn percentages(shares: &[(Domain, u8)]) -> BTreeMap<Domain, u8> {
    shares.iter().copied().collect()
}

pub(super) fn student(name: &str) -> StudentId {
    StudentId(name.to_string())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is json")
}
