//! Local HTTP control surface used by the web app.

pub mod error;
pub mod handlers;

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};

use crate::AppState;

pub use error::ApiError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/session",
            post(handlers::set_session).get(handlers::get_session),
        )
        .route("/collection", post(handlers::start_collection))
        .route("/stop_collection", post(handlers::stop_collection))
        .route("/checkPA", get(handlers::check_personal_analytics))
        .route("/feedback", get(handlers::recent_feedback))
        .layer(middleware::from_fn(allow_any_origin))
        .with_state(state)
}

/// The web app is served from another origin and calls the agent directly.
async fn allow_any_origin(request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    response
}
