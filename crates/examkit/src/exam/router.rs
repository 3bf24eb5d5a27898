use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;

use super::attempt::{AnswerSubmission, AttemptService, AttemptStatus};
use super::bank::QuestionBank;
use super::blueprint::ExamBlueprint;
use super::domain::{AttemptId, ExamMode, QuestionId, QuestionView, SessionId, StudentId};
use super::history::{AttemptHistory, HistoryService, QuestionReview};
use super::repository::{AttemptRepository, SessionRepository};
use super::scoring::ResultSummary;
use super::session::SessionService;

/// Bundle of the three engine services sharing one bank and repositories.
pub struct ExamEngine<B, SR, AR> {
    pub sessions: Arc<SessionService<B, SR>>,
    pub attempts: Arc<AttemptService<B, SR, AR>>,
    pub history: Arc<HistoryService<B, AR>>,
}

impl<B, SR, AR> ExamEngine<B, SR, AR>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    pub fn new(bank: Arc<B>, session_repository: Arc<SR>, attempt_repository: Arc<AR>) -> Self {
        let sessions = Arc::new(SessionService::new(bank.clone(), session_repository));
        let attempts = Arc::new(AttemptService::new(
            sessions.clone(),
            attempt_repository.clone(),
            bank.clone(),
        ));
        let history = Arc::new(HistoryService::new(attempt_repository, bank));
        Self {
            sessions,
            attempts,
            history,
        }
    }
}

// Manual Clone so the bank and repositories need no Clone bound.
impl<B, SR, AR> Clone for ExamEngine<B, SR, AR> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            attempts: self.attempts.clone(),
            history: self.history.clone(),
        }
    }
}

/// Router builder exposing the engine's caller-facing operations.
pub fn exam_router<B, SR, AR>(engine: ExamEngine<B, SR, AR>) -> Router
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    Router::new()
        .route("/api/v1/sessions", post(start_session::<B, SR, AR>))
        .route("/api/v1/sessions/:session_id", get(get_session::<B, SR, AR>))
        .route(
            "/api/v1/sessions/:session_id/questions",
            get(session_question_ids::<B, SR, AR>),
        )
        .route(
            "/api/v1/sessions/:session_id/questions/:position",
            get(session_question::<B, SR, AR>),
        )
        .route(
            "/api/v1/sessions/:session_id/summary",
            get(session_summary::<B, SR, AR>),
        )
        .route(
            "/api/v1/sessions/:session_id/complete",
            post(complete_session::<B, SR, AR>),
        )
        .route("/api/v1/attempts", post(create_attempt::<B, SR, AR>))
        .route(
            "/api/v1/attempts/:attempt_id/status",
            get(attempt_status::<B, SR, AR>),
        )
        .route(
            "/api/v1/attempts/:attempt_id/questions",
            get(attempt_question_ids::<B, SR, AR>),
        )
        .route(
            "/api/v1/attempts/:attempt_id/questions/:index",
            get(attempt_question::<B, SR, AR>),
        )
        .route(
            "/api/v1/attempts/:attempt_id/states",
            get(attempt_slot_states::<B, SR, AR>),
        )
        .route(
            "/api/v1/attempts/:attempt_id/answers",
            post(submit_answer::<B, SR, AR>),
        )
        .route(
            "/api/v1/attempts/:attempt_id/navigate",
            post(navigate::<B, SR, AR>),
        )
        .route(
            "/api/v1/attempts/:attempt_id/complete",
            post(complete_attempt::<B, SR, AR>),
        )
        .route(
            "/api/v1/attempts/:attempt_id/results",
            get(attempt_results::<B, SR, AR>),
        )
        .route(
            "/api/v1/students/:student_id/history",
            get(student_history::<B, SR, AR>),
        )
        .route(
            "/api/v1/students/:student_id/history/:attempt_id",
            get(history_detail::<B, SR, AR>),
        )
        .with_state(engine)
}

#[derive(Debug, Deserialize)]
pub(crate) struct LangParams {
    lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryParams {
    mode: Option<ExamMode>,
    limit: Option<usize>,
    lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateAttemptRequest {
    #[serde(flatten)]
    blueprint: ExamBlueprint,
    student_id: Option<String>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NavigateRequest {
    index: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionMetadata {
    session_id: SessionId,
    mode: ExamMode,
    total_questions: u32,
    locale: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SummaryEntry {
    position: u32,
    question: QuestionView,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptCreated {
    attempt_id: AttemptId,
    session_id: SessionId,
    student_id: StudentId,
    mode: ExamMode,
    total_questions: u32,
    started_at: DateTime<Utc>,
}

pub(crate) async fn start_session<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Json(blueprint): Json<ExamBlueprint>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    blueprint.validate().map_err(AppError::Blueprint)?;
    let domains = blueprint.effective_domains();
    let session_id = engine.sessions.start_session(
        blueprint.mode,
        blueprint.total_questions,
        &blueprint.locale,
        &domains,
        blueprint.percentages.as_ref(),
    )?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "session_id": session_id.0 })),
    ))
}

pub(crate) async fn get_session<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionMetadata>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let session = engine.sessions.session(&SessionId(session_id))?;
    Ok(Json(SessionMetadata {
        session_id: session.id,
        mode: session.mode,
        total_questions: session.total_questions,
        locale: session.locale,
        created_at: session.created_at,
        completed_at: session.completed_at,
    }))
}

pub(crate) async fn session_question_ids<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<QuestionId>>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let ids = engine
        .sessions
        .ordered_question_ids(&SessionId(session_id))?;
    Ok(Json(ids))
}

pub(crate) async fn session_question<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path((session_id, position)): Path<(String, u32)>,
    Query(params): Query<LangParams>,
) -> Result<Json<QuestionView>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let view = engine.sessions.question_at_position(
        &SessionId(session_id),
        position,
        params.lang.as_deref(),
    )?;
    Ok(Json(view))
}

pub(crate) async fn session_summary<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(session_id): Path<String>,
    Query(params): Query<LangParams>,
) -> Result<Json<Vec<SummaryEntry>>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let entries = engine
        .sessions
        .session_summary(&SessionId(session_id), params.lang.as_deref())?
        .into_iter()
        .map(|(position, question)| SummaryEntry { position, question })
        .collect();
    Ok(Json(entries))
}

pub(crate) async fn complete_session<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let completed_at = engine.sessions.complete_session(&SessionId(session_id))?;
    Ok(Json(json!({ "completed_at": completed_at })))
}

pub(crate) async fn create_attempt<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Json(request): Json<CreateAttemptRequest>,
) -> Result<(StatusCode, Json<AttemptCreated>), AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let student_id = StudentId(
        request
            .student_id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
    );
    let attempt = match request.seed {
        Some(seed) => {
            engine
                .attempts
                .create_attempt_with_seed(&request.blueprint, student_id, seed)?
        }
        None => engine.attempts.create_attempt(&request.blueprint, student_id)?,
    };
    Ok((
        StatusCode::CREATED,
        Json(AttemptCreated {
            attempt_id: attempt.id,
            session_id: attempt.session_id,
            student_id: attempt.student_id,
            mode: attempt.mode,
            total_questions: attempt.total_questions,
            started_at: attempt.started_at,
        }),
    ))
}

pub(crate) async fn attempt_status<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(attempt_id): Path<String>,
) -> Result<Json<AttemptStatus>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let status = engine.attempts.status(&AttemptId(attempt_id))?;
    Ok(Json(status))
}

pub(crate) async fn attempt_question_ids<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(attempt_id): Path<String>,
) -> Result<Json<Vec<QuestionId>>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let ids = engine.attempts.question_ids(&AttemptId(attempt_id))?;
    Ok(Json(ids))
}

pub(crate) async fn attempt_question<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path((attempt_id, index)): Path<(String, u32)>,
    Query(params): Query<LangParams>,
) -> Result<Json<QuestionView>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let view =
        engine
            .attempts
            .question_view(&AttemptId(attempt_id), index, params.lang.as_deref())?;
    Ok(Json(view))
}

pub(crate) async fn attempt_slot_states<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(attempt_id): Path<String>,
) -> Result<Json<Vec<&'static str>>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let states = engine.attempts.slot_states(&AttemptId(attempt_id))?;
    Ok(Json(states.into_iter().map(|state| state.label()).collect()))
}

pub(crate) async fn submit_answer<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(attempt_id): Path<String>,
    Json(submission): Json<AnswerSubmission>,
) -> Result<Json<serde_json::Value>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    engine
        .attempts
        .submit_answer(&AttemptId(attempt_id), &submission)?;
    Ok(Json(json!({ "status": "accepted" })))
}

pub(crate) async fn navigate<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(attempt_id): Path<String>,
    Json(request): Json<NavigateRequest>,
) -> Result<Json<serde_json::Value>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let current_index = engine
        .attempts
        .navigate(&AttemptId(attempt_id), request.index)?;
    Ok(Json(json!({ "current_index": current_index })))
}

pub(crate) async fn complete_attempt<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(attempt_id): Path<String>,
) -> Result<Json<ResultSummary>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let summary = engine.attempts.complete_attempt(&AttemptId(attempt_id))?;
    Ok(Json(summary))
}

pub(crate) async fn attempt_results<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(attempt_id): Path<String>,
) -> Result<Json<ResultSummary>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let summary = engine.attempts.results(&AttemptId(attempt_id))?;
    Ok(Json(summary))
}

pub(crate) async fn student_history<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path(student_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<AttemptHistory>>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let rows = engine.history.attempt_history(
        &StudentId(student_id),
        params.mode,
        params.limit.unwrap_or(20),
    )?;
    Ok(Json(rows))
}

pub(crate) async fn history_detail<B, SR, AR>(
    State(engine): State<ExamEngine<B, SR, AR>>,
    Path((student_id, attempt_id)): Path<(String, String)>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<QuestionReview>>, AppError>
where
    B: QuestionBank + 'static,
    SR: SessionRepository + 'static,
    AR: AttemptRepository + 'static,
{
    let reviews = engine.history.attempt_detail(
        &AttemptId(attempt_id),
        &StudentId(student_id),
        params.lang.as_deref(),
    )?;
    Ok(Json(reviews))
}
