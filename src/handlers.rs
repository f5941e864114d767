use crate::bank::{BankSource, BankSummary};
use crate::builder::{CountInput, SessionPlan};
use crate::config::{MAX_FONT_SIZE, MIN_FONT_SIZE};
use crate::error::{AppError, QuizError};
use crate::exporter::{export_missed, report_filename};
use crate::models::{MissedQuestion, ValidationIssue};
use crate::session::QuestionView;
use crate::state::{AppState, Preferences, UserContext};
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Local;
use http::header;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

const CONTEXT_COOKIE: &str = "quiz_context";

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn context_id(jar: &CookieJar) -> Option<String> {
    jar.get(CONTEXT_COOKIE).map(|c| c.value().to_string())
}

fn ensure_context_id(jar: CookieJar, state: &AppState) -> (CookieJar, String) {
    if let Some(id) = context_id(&jar) {
        return (jar, id);
    }
    let id = state.new_context_id();
    let cookie = Cookie::build((CONTEXT_COOKIE, id.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    (jar.add(cookie), id)
}

#[derive(Debug, Serialize)]
pub struct DisplayOut {
    pub font_size: u32,
}

#[derive(Debug, Serialize)]
pub struct QuizStateResponse {
    pub phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    pub display: DisplayOut,
}

impl QuizStateResponse {
    fn from_context(ctx: &UserContext) -> Self {
        Self {
            phase: ctx.session.phase().name(),
            question: ctx.session.view(),
            display: DisplayOut {
                font_size: ctx.preferences.font_size,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub score: usize,
    pub total: usize,
    pub percent: f64,
    pub missed: Vec<MissedQuestion>,
    pub export_filename: String,
}

fn result_response(ctx: &UserContext) -> Result<ResultResponse, QuizError> {
    let result = ctx.session.result()?;
    Ok(ResultResponse {
        score: result.score,
        total: result.total,
        percent: result.percent,
        missed: result.missed.clone(),
        export_filename: report_filename(&ctx.preferences.report_prefix, &Local::now()),
    })
}

#[derive(Debug, Serialize)]
pub struct BankResponse {
    pub loaded: bool,
    pub total: usize,
    pub single: usize,
    pub multi: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl BankResponse {
    fn new(summary: Option<BankSummary>, files: Vec<String>) -> Self {
        match summary {
            Some(s) => Self {
                loaded: true,
                total: s.total,
                single: s.single,
                multi: s.multi,
                files,
            },
            None => Self {
                loaded: false,
                total: 0,
                single: 0,
                multi: 0,
                files,
            },
        }
    }
}

pub async fn upload_bank(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<(CookieJar, Json<BankResponse>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let upload_error = |err: axum::extract::multipart::MultipartError| {
        AppError::new(err.status(), "UPLOAD_ERROR", err.body_text(), req_id.clone())
    };

    let mut sources = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let name = field
            .file_name()
            .or_else(|| field.name())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("upload-{}", sources.len() + 1));
        let content = field.bytes().await.map_err(upload_error)?;
        sources.push(BankSource::new(name, content.to_vec()));
    }

    let files: Vec<String> = sources.iter().map(|s| s.name.clone()).collect();
    let bank = state
        .loader
        .load(&sources)
        .map_err(|e| AppError::from_quiz(e, req_id.clone()))?;

    let (jar, id) = ensure_context_id(jar, &state);
    let summary = state.with_context(&id, |ctx| ctx.set_bank(bank));
    Ok((jar, Json(BankResponse::new(Some(summary), files))))
}

pub async fn get_bank(State(state): State<AppState>, jar: CookieJar) -> Json<BankResponse> {
    let id = context_id(&jar);
    let summary = state.with_context_or_scratch(id.as_deref(), |ctx| ctx.bank_summary());
    Json(BankResponse::new(summary, Vec::new()))
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    #[serde(flatten)]
    pub preferences: Preferences,
    pub min_font_size: u32,
    pub max_font_size: u32,
}

impl From<Preferences> for SettingsResponse {
    fn from(preferences: Preferences) -> Self {
        Self {
            preferences,
            min_font_size: MIN_FONT_SIZE,
            max_font_size: MAX_FONT_SIZE,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SettingsPayload {
    pub font_size: Option<i64>,
    #[validate(length(min = 1, max = 64))]
    pub report_prefix: Option<String>,
}

fn settings_issues(errors: validator::ValidationErrors) -> Vec<ValidationIssue> {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| ValidationIssue {
                field: field.to_string(),
                issue: e.code.to_string(),
            })
        })
        .collect()
}

pub async fn get_settings(State(state): State<AppState>, jar: CookieJar) -> Json<SettingsResponse> {
    let id = context_id(&jar);
    let prefs = state.with_context_or_scratch(id.as_deref(), |ctx| ctx.preferences.clone());
    Json(prefs.into())
}

// Out-of-range font sizes are clamped, not rejected.
pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<SettingsPayload>,
) -> Result<(CookieJar, Json<SettingsResponse>), AppError> {
    let req_id = request_id_from_headers(&headers);
    if let Err(errors) = payload.validate() {
        return Err(AppError::from_quiz(QuizError::InvalidSettings(settings_issues(errors)), req_id));
    }

    let (jar, id) = ensure_context_id(jar, &state);
    let prefs = state.with_context(&id, |ctx| {
        if let Some(size) = payload.font_size {
            ctx.preferences.set_font_size(size);
        }
        if let Some(prefix) = payload.report_prefix {
            ctx.preferences.report_prefix = prefix;
        }
        ctx.preferences.clone()
    });
    Ok((jar, Json(prefs.into())))
}

#[derive(Debug, Deserialize)]
pub struct StartQuizPayload {
    pub single: Option<CountInput>,
    pub multi: Option<CountInput>,
}

pub async fn start_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<StartQuizPayload>,
) -> Result<(StatusCode, Json<QuizStateResponse>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let id = context_id(&jar);
    let response = state
        .with_context_or_scratch(id.as_deref(), |ctx| -> Result<QuizStateResponse, QuizError> {
            ctx.require_bank()?;
            let plan = SessionPlan::from_inputs(
                payload.single.as_ref(),
                payload.multi.as_ref(),
                state.config.default_plan,
            )?;
            ctx.start_quiz(plan)?;
            Ok(QuizStateResponse::from_context(ctx))
        })
        .map_err(|e| {
            warn!("quiz start rejected: {}", e);
            AppError::from_quiz(e, req_id)
        })?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_quiz(State(state): State<AppState>, jar: CookieJar) -> Json<QuizStateResponse> {
    let id = context_id(&jar);
    Json(state.with_context_or_scratch(id.as_deref(), |ctx| QuizStateResponse::from_context(ctx)))
}

#[derive(Debug, Deserialize)]
pub struct SelectionPayload {
    // Defaults to the question currently shown.
    pub position: Option<usize>,
    pub selected: Vec<usize>,
}

pub async fn record_selection(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<SelectionPayload>,
) -> Result<Json<QuizStateResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let id = context_id(&jar);
    state
        .with_context_or_scratch(id.as_deref(), |ctx| -> Result<QuizStateResponse, QuizError> {
            let position = match payload.position {
                Some(p) => p,
                None => ctx.session.active()?.position(),
            };
            ctx.session.record_selection(position, &payload.selected)?;
            Ok(QuizStateResponse::from_context(ctx))
        })
        .map(Json)
        .map_err(|e| AppError::from_quiz(e, req_id))
}

#[derive(Debug, Default, Deserialize)]
pub struct NavigatePayload {
    #[serde(default)]
    pub selected: Option<Vec<usize>>,
}

#[derive(Clone, Copy)]
enum Direction {
    Prev,
    Next,
}

fn navigate(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
    payload: NavigatePayload,
    direction: Direction,
) -> Result<Json<QuizStateResponse>, AppError> {
    let req_id = request_id_from_headers(headers);
    let id = context_id(jar);
    state
        .with_context_or_scratch(id.as_deref(), |ctx| -> Result<QuizStateResponse, QuizError> {
            let pending = payload.selected.as_deref();
            match direction {
                Direction::Prev => ctx.session.prev(pending)?,
                Direction::Next => ctx.session.next(pending)?,
            };
            Ok(QuizStateResponse::from_context(ctx))
        })
        .map(Json)
        .map_err(|e| AppError::from_quiz(e, req_id))
}

pub async fn prev_question(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<NavigatePayload>,
) -> Result<Json<QuizStateResponse>, AppError> {
    navigate(&state, &headers, &jar, payload, Direction::Prev)
}

pub async fn next_question(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<NavigatePayload>,
) -> Result<Json<QuizStateResponse>, AppError> {
    navigate(&state, &headers, &jar, payload, Direction::Next)
}

pub async fn finish_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<NavigatePayload>,
) -> Result<Json<ResultResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let id = context_id(&jar);
    state
        .with_context_or_scratch(id.as_deref(), |ctx| -> Result<ResultResponse, QuizError> {
            ctx.session.finish(payload.selected.as_deref())?;
            result_response(ctx)
        })
        .map(Json)
        .map_err(|e| AppError::from_quiz(e, req_id))
}

pub async fn reset_quiz(State(state): State<AppState>, jar: CookieJar) -> Json<QuizStateResponse> {
    let id = context_id(&jar);
    Json(state.with_context_or_scratch(id.as_deref(), |ctx| {
        ctx.session.reset();
        QuizStateResponse::from_context(ctx)
    }))
}

pub async fn quiz_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Json<ResultResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let id = context_id(&jar);
    state
        .with_context_or_scratch(id.as_deref(), |ctx| result_response(ctx))
        .map(Json)
        .map_err(|e| AppError::from_quiz(e, req_id))
}

pub async fn export_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let req_id = request_id_from_headers(&headers);
    let id = context_id(&jar);
    let (filename, body) = state
        .with_context_or_scratch(id.as_deref(), |ctx| -> Result<(String, Vec<u8>), QuizError> {
            let result = ctx.session.result()?;
            let body = export_missed(&result.missed)?;
            let filename = report_filename(&ctx.preferences.report_prefix, &Local::now());
            Ok((filename, body))
        })
        .map_err(|e| AppError::from_quiz(e, req_id.clone()))?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|_| {
            AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "export filename is not a valid header",
                req_id,
            )
        })?;
    info!(file = %filename, bytes = body.len(), "missed questions exported");

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
