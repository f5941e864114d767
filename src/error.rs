use crate::models::ValidationIssue;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum QuizError {
    #[error("file {source_name} could not be loaded: {reason}")]
    BankParse {
        source_name: String,
        reason: String,
        details: Vec<ValidationIssue>,
    },
    #[error("no question bank files were uploaded")]
    EmptyUpload,
    #[error("no question bank is loaded")]
    NoBankLoaded,
    #[error(
        "not enough questions in the bank: single requested {requested_single} (available {available_single}), \
         multi requested {requested_multi} (available {available_multi})"
    )]
    InsufficientInventory {
        requested_single: usize,
        available_single: usize,
        requested_multi: usize,
        available_multi: usize,
    },
    #[error("{field} count must be a non-negative integer, got {value:?}")]
    InvalidCount { field: &'static str, value: String },
    #[error("a quiz needs at least one question")]
    DegenerateSession,
    #[error("{0}")]
    InvalidSelection(String),
    #[error("quiz is {actual}, expected {expected}")]
    InvalidTransition {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("settings are invalid")]
    InvalidSettings(Vec<ValidationIssue>),
    #[error("{0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub field: String,
    pub issue: String,
}

impl From<ValidationIssue> for ErrorDetail {
    fn from(value: ValidationIssue) -> Self {
        Self {
            field: value.field,
            issue: value.issue,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Vec::new(),
            request_id: request_id.into(),
        }
    }

    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = details;
        self
    }

    pub fn from_quiz(err: QuizError, request_id: impl Into<String>) -> Self {
        let message = err.to_string();
        let (status, code, details) = match err {
            QuizError::BankParse { details, .. } => (
                StatusCode::BAD_REQUEST,
                "BANK_PARSE_ERROR",
                details.into_iter().map(ErrorDetail::from).collect(),
            ),
            QuizError::EmptyUpload => (StatusCode::BAD_REQUEST, "BANK_PARSE_ERROR", Vec::new()),
            QuizError::NoBankLoaded => (StatusCode::CONFLICT, "NO_BANK", Vec::new()),
            QuizError::InsufficientInventory {
                requested_single,
                available_single,
                requested_multi,
                available_multi,
            } => (
                StatusCode::CONFLICT,
                "INSUFFICIENT_INVENTORY",
                vec![
                    ErrorDetail {
                        field: "single".into(),
                        issue: format!("requested {requested_single}, available {available_single}"),
                    },
                    ErrorDetail {
                        field: "multi".into(),
                        issue: format!("requested {requested_multi}, available {available_multi}"),
                    },
                ],
            ),
            QuizError::InvalidCount { field, .. } => (
                StatusCode::BAD_REQUEST,
                "INVALID_COUNT",
                vec![ErrorDetail {
                    field: field.into(),
                    issue: "must be a non-negative integer".into(),
                }],
            ),
            QuizError::DegenerateSession => (StatusCode::BAD_REQUEST, "DEGENERATE_SESSION", Vec::new()),
            QuizError::InvalidSelection(_) => (StatusCode::BAD_REQUEST, "INVALID_SELECTION", Vec::new()),
            QuizError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_STATE", Vec::new()),
            QuizError::InvalidSettings(issues) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                issues.into_iter().map(ErrorDetail::from).collect(),
            ),
            QuizError::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", Vec::new()),
        };
        AppError::new(status, code, message, request_id).with_details(details)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let payload = ErrorBody {
            error: ErrorPayload {
                code: self.code,
                message: self.message,
                details: self.details,
                request_id: self.request_id,
            },
        };
        (self.status, Json(payload)).into_response()
    }
}
