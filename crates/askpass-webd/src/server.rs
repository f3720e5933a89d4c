//! HTTP routes.
//!
//! - `GET /`: list the current prompts, one form each
//! - `POST /pass`: answer (or cancel) a prompt by name
//! - `GET /robots.txt`: keep crawlers out
//!
//! Handlers hold no state of their own: every request re-enumerates the
//! prompt directory through the [`AnswerRelay`].

use askpass_web_core::{AnswerRelay, RelayError, Reply};
use axum::extract::rejection::FormRejection;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use secrecy::SecretString;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::idle::IdleSupervisor;
use crate::page;

const ROBOTS_TXT: &str = "User-Agent: *\nDisallow: /\n";

/// State shared by the handlers.
#[derive(Clone)]
pub struct AppState {
    relay: AnswerRelay,
}

/// Form submitted to `POST /pass`.
#[derive(Deserialize)]
struct PassForm {
    /// Opaque prompt name. Untrusted.
    ask: String,
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    answer: SecretString,
    #[serde(default)]
    cancel: bool,
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(SecretString::from(s))
}

/// Build the routes without any middleware.
pub fn router(relay: AnswerRelay) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/pass", post(serve_pass))
        .route("/robots.txt", get(serve_robots))
        .with_state(AppState { relay })
}

/// Build the full application: routes, idle tracking and request tracing.
pub fn app(relay: AnswerRelay, supervisor: IdleSupervisor) -> Router {
    router(relay)
        .layer(middleware::from_fn_with_state(supervisor, track_activity))
        .layer(TraceLayer::new_for_http())
}

/// Reset the idle timer on every request.
async fn track_activity(
    State(supervisor): State<IdleSupervisor>,
    request: Request,
    next: Next,
) -> Response {
    supervisor.touch();
    next.run(request).await
}

async fn serve_index(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.relay.prompts().await;
    (
        [(header::CACHE_CONTROL, "no-store")],
        Html(page::render_index(&registry)),
    )
}

async fn serve_pass(
    State(state): State<AppState>,
    form: Result<Form<PassForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let reply = if form.cancel {
        Reply::Cancel
    } else {
        Reply::Answer(form.answer)
    };

    match state.relay.relay(&form.ask, &reply).await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(RelayError::NotFound) => error_response(StatusCode::NOT_FOUND, "Not found"),
        Err(RelayError::Delivery(e)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn serve_robots() -> &'static str {
    warn!("/robots.txt was requested. This page must not be exposed to the internet");
    ROBOTS_TXT
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    warn!(status = status.as_u16(), error = %message, "Request failed");
    (status, message).into_response()
}
