use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::exam::domain::{
    Domain, ExamMode, ExamSession, QuestionId, SessionAssignment, SessionId,
};
use crate::exam::repository::{
    InMemorySessionRepository, RepositoryError, SessionRepository,
};
use crate::exam::session::{SessionError, SessionService};

use super::common::{build_engine, fixture_bank};

#[test]
fn session_positions_are_contiguous_from_one() {
    let (engine, _, _) = build_engine(fixture_bank(20));

    let id = engine
        .sessions
        .start_session_with_seed(9, ExamMode::Exam, 10, "en", &Domain::ALL, None)
        .expect("session starts");
    let session = engine.sessions.session(&id).expect("session exists");

    let positions: Vec<u32> = session
        .assignments
        .iter()
        .map(|assignment| assignment.position)
        .collect();
    assert_eq!(positions, (1..=10).collect::<Vec<u32>>());

    let ids: BTreeSet<QuestionId> = session
        .assignments
        .iter()
        .map(|assignment| assignment.question_id)
        .collect();
    assert_eq!(ids.len(), 10);
}

#[test]
fn question_order_is_stable_across_reads() {
    let (engine, _, _) = build_engine(fixture_bank(20));

    let id = engine
        .sessions
        .start_session_with_seed(14, ExamMode::Exam, 12, "en", &Domain::ALL, None)
        .expect("session starts");

    let first = engine.sessions.ordered_question_ids(&id).expect("reads");
    for _ in 0..20 {
        let again = engine.sessions.ordered_question_ids(&id).expect("reads");
        assert_eq!(first, again);
    }

    let view = engine
        .sessions
        .question_at_position(&id, 1, None)
        .expect("position 1 exists");
    for _ in 0..20 {
        let again = engine
            .sessions
            .question_at_position(&id, 1, None)
            .expect("position 1 exists");
        assert_eq!(view, again);
    }
}

#[test]
fn practice_mode_reveals_correctness_and_exam_mode_hides_it() {
    let (engine, _, _) = build_engine(fixture_bank(20));

    let practice = engine
        .sessions
        .start_session_with_seed(3, ExamMode::Practice, 5, "en", &Domain::ALL, None)
        .expect("session starts");
    let view = engine
        .sessions
        .question_at_position(&practice, 1, None)
        .expect("position exists");
    assert!(view.options.iter().all(|option| option.is_correct.is_some()));

    let exam = engine
        .sessions
        .start_session_with_seed(3, ExamMode::Exam, 5, "en", &Domain::ALL, None)
        .expect("session starts");
    let view = engine
        .sessions
        .question_at_position(&exam, 1, None)
        .expect("position exists");
    assert!(view.options.iter().all(|option| option.is_correct.is_none()));
}

#[test]
fn summary_never_reveals_correctness() {
    let (engine, _, _) = build_engine(fixture_bank(20));

    let id = engine
        .sessions
        .start_session_with_seed(8, ExamMode::Practice, 6, "en", &Domain::ALL, None)
        .expect("session starts");

    let summary = engine.sessions.session_summary(&id, None).expect("summary");
    assert_eq!(summary.len(), 6);
    for (index, (position, view)) in summary.iter().enumerate() {
        assert_eq!(*position, index as u32 + 1);
        assert!(view.options.iter().all(|option| option.is_correct.is_none()));
    }
}

#[test]
fn unknown_position_is_not_found() {
    let (engine, _, _) = build_engine(fixture_bank(20));

    let id = engine
        .sessions
        .start_session_with_seed(2, ExamMode::Exam, 5, "en", &Domain::ALL, None)
        .expect("session starts");

    let err = engine
        .sessions
        .question_at_position(&id, 6, None)
        .expect_err("position 6 does not exist");
    assert!(matches!(err, SessionError::PositionNotFound { position: 6, .. }));

    let err = engine
        .sessions
        .question_at_position(&id, 0, None)
        .expect_err("positions are 1-indexed");
    assert!(matches!(err, SessionError::PositionNotFound { position: 0, .. }));
}

#[test]
fn unknown_session_is_not_found() {
    let (engine, _, _) = build_engine(fixture_bank(20));

    let missing = SessionId("missing".to_string());
    let err = engine.sessions.session(&missing).expect_err("no such session");
    assert!(matches!(err, SessionError::SessionNotFound(id) if id == missing));
}

#[test]
fn completing_twice_returns_the_original_timestamp() {
    let (engine, _, _) = build_engine(fixture_bank(20));

    let id = engine
        .sessions
        .start_session_with_seed(6, ExamMode::Exam, 5, "en", &Domain::ALL, None)
        .expect("session starts");
    assert!(engine.sessions.is_active(&id).expect("session exists"));

    let first = engine.sessions.complete_session(&id).expect("completes");
    let second = engine.sessions.complete_session(&id).expect("idempotent");
    assert_eq!(first, second);
    assert!(!engine.sessions.is_active(&id).expect("session exists"));

    // The assignment order survives completion untouched.
    let session = engine.sessions.session(&id).expect("session exists");
    assert_eq!(session.assignments.len(), 5);
}

#[test]
fn selection_failure_creates_nothing() {
    let (engine, session_repository, _) = build_engine(fixture_bank(2));

    let err = engine
        .sessions
        .start_session_with_seed(1, ExamMode::Exam, 50, "en", &Domain::ALL, None)
        .expect_err("10 questions cannot satisfy 50");
    assert!(matches!(err, SessionError::Selection(_)));

    let missing = SessionId("anything".to_string());
    assert!(session_repository.fetch(&missing).expect("fetch works").is_none());
}

#[test]
fn repository_rejects_defective_assignments() {
    let repository = InMemorySessionRepository::default();
    let base = ExamSession {
        id: SessionId("s-dup".to_string()),
        mode: ExamMode::Exam,
        total_questions: 2,
        locale: "en".to_string(),
        seed: 0,
        created_at: Utc::now(),
        completed_at: None,
        assignments: vec![
            SessionAssignment {
                position: 1,
                question_id: QuestionId(1),
            },
            SessionAssignment {
                position: 2,
                question_id: QuestionId(1),
            },
        ],
    };
    let err = repository.insert(base.clone()).expect_err("duplicate question id");
    assert!(matches!(err, RepositoryError::ConstraintViolation(_)));

    let mut gapped = base.clone();
    gapped.assignments = vec![
        SessionAssignment {
            position: 1,
            question_id: QuestionId(1),
        },
        SessionAssignment {
            position: 3,
            question_id: QuestionId(2),
        },
    ];
    let err = repository.insert(gapped).expect_err("positions must be contiguous");
    assert!(matches!(err, RepositoryError::ConstraintViolation(_)));

    let mut zero_based = base;
    zero_based.assignments = vec![
        SessionAssignment {
            position: 0,
            question_id: QuestionId(1),
        },
        SessionAssignment {
            position: 1,
            question_id: QuestionId(2),
        },
    ];
    let err = repository
        .insert(zero_based)
        .expect_err("positions start at 1");
    assert!(matches!(err, RepositoryError::ConstraintViolation(_)));
}

#[test]
fn requested_language_resolves_translations_with_fallback() {
    let bank = fixture_bank(20);
    let repository = Arc::new(InMemorySessionRepository::default());
    let sessions = SessionService::new(bank, repository);

    let id = sessions
        .start_session_with_seed(5, ExamMode::Exam, 3, "en", &Domain::ALL, None)
        .expect("session starts");

    let spanish = sessions
        .question_at_position(&id, 1, Some("es"))
        .expect("position exists");
    assert!(spanish.stem.contains("Escenario"));

    let unknown = sessions
        .question_at_position(&id, 1, Some("fr"))
        .expect("position exists");
    assert!(unknown.stem.contains("Scenario"));
}
