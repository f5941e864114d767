use crate::handlers;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_credentials(true)
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::COOKIE,
            axum::http::HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([axum::http::header::CONTENT_DISPOSITION])
}

pub fn build_router(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes;
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/bank", post(handlers::upload_bank).get(handlers::get_bank))
        .route("/api/v1/settings", get(handlers::get_settings).put(handlers::update_settings))
        .route("/api/v1/quiz", get(handlers::get_quiz))
        .route("/api/v1/quiz/start", post(handlers::start_quiz))
        .route("/api/v1/quiz/selection", put(handlers::record_selection))
        .route("/api/v1/quiz/prev", post(handlers::prev_question))
        .route("/api/v1/quiz/next", post(handlers::next_question))
        .route("/api/v1/quiz/finish", post(handlers::finish_quiz))
        .route("/api/v1/quiz/reset", post(handlers::reset_quiz))
        .route("/api/v1/quiz/result", get(handlers::quiz_result))
        .route("/api/v1/quiz/result/export", get(handlers::export_result))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(max_upload))
                .map_response(|r: axum::http::Response<_>| r.map(axum::body::Body::new))
                .layer(RequestBodyLimitLayer::new(max_upload)),
        )
}
