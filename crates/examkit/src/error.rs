use crate::config::ConfigError;
use crate::exam::attempt::AttemptError;
use crate::exam::blueprint::BlueprintError;
use crate::exam::history::HistoryError;
use crate::exam::selector::SelectionError;
use crate::exam::session::SessionError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Blueprint(BlueprintError),
    Session(SessionError),
    Attempt(AttemptError),
    History(HistoryError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Blueprint(err) => write!(f, "invalid exam configuration: {}", err),
            AppError::Session(err) => write!(f, "session error: {}", err),
            AppError::Attempt(err) => write!(f, "attempt error: {}", err),
            AppError::History(err) => write!(f, "history error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Blueprint(err) => Some(err),
            AppError::Session(err) => Some(err),
            AppError::Attempt(err) => Some(err),
            AppError::History(err) => Some(err),
        }
    }
}

fn session_status(err: &SessionError) -> StatusCode {
    match err {
        // An exhausted bank is a conflict with current content, not a
        // server fault; the caller may retry with a smaller request.
        SessionError::Selection(SelectionError::InsufficientQuestions { .. }) => {
            StatusCode::CONFLICT
        }
        SessionError::SessionNotFound(_)
        | SessionError::PositionNotFound { .. }
        | SessionError::QuestionNotFound(_) => StatusCode::NOT_FOUND,
        SessionError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn attempt_status(err: &AttemptError) -> StatusCode {
    match err {
        AttemptError::Blueprint(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AttemptError::Session(inner) => session_status(inner),
        AttemptError::AttemptNotFound(_)
        | AttemptError::SlotNotFound { .. }
        | AttemptError::IndexOutOfRange { .. }
        | AttemptError::QuestionNotFound(_) => StatusCode::NOT_FOUND,
        AttemptError::AlreadyCompleted(_) => StatusCode::CONFLICT,
        AttemptError::NotCompleted(_) => StatusCode::BAD_REQUEST,
        AttemptError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn history_status(err: &HistoryError) -> StatusCode {
    match err {
        HistoryError::AttemptNotFound(_) | HistoryError::QuestionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        HistoryError::NotCompleted(_) => StatusCode::BAD_REQUEST,
        HistoryError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Blueprint(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Session(err) => session_status(err),
            AppError::Attempt(err) => attempt_status(err),
            AppError::History(err) => history_status(err),
            AppError::Config(_) | AppError::Telemetry(_) | AppError::Io(_) | AppError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<BlueprintError> for AppError {
    fn from(value: BlueprintError) -> Self {
        Self::Blueprint(value)
    }
}

impl From<SessionError> for AppError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

impl From<AttemptError> for AppError {
    fn from(value: AttemptError) -> Self {
        Self::Attempt(value)
    }
}

impl From<HistoryError> for AppError {
    fn from(value: HistoryError) -> Self {
        Self::History(value)
    }
}
