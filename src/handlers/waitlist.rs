use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Json,
};

use crate::{
    error::AppError,
    models::signup::MessageResponse,
    validation::{self, Validated},
    waitlist, AppState,
};

pub const MAX_BODY_BYTES: usize = 10_000;
pub const SUCCESS_MESSAGE: &str = "Successfully joined the waitlist";

fn joined() -> (StatusCode, Json<MessageResponse>) {
    (
        StatusCode::CREATED,
        Json(MessageResponse {
            message: SUCCESS_MESSAGE.to_string(),
        }),
    )
}

pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    if !is_json {
        return Err(AppError::UnsupportedMediaType);
    }

    if body.len() > MAX_BODY_BYTES {
        return Err(AppError::PayloadTooLarge);
    }

    let payload: serde_json::Value =
        serde_json::from_slice(&body).map_err(|_| AppError::InvalidJson)?;

    let submission = match validation::validate_submission(&payload)? {
        Validated::Accepted(submission) => submission,
        Validated::Honeypot => {
            tracing::info!("honeypot field filled, discarding submission");
            return Ok(joined());
        }
    };

    let outcome = waitlist::submit(&state, &submission).await?;
    tracing::debug!(?outcome, "signup handled");

    Ok(joined())
}

/// Always answers with a redirect, whatever the query string looks like.
pub async fn verify(State(state): State<AppState>, RawQuery(query): RawQuery) -> Redirect {
    let token = query.as_deref().and_then(first_token);
    let outcome = waitlist::verify(&state, token.as_deref()).await;
    let target = state.config.status_url(outcome.status(), outcome.message());
    Redirect::temporary(target.as_str())
}

/// First `token` pair of a query string; later repeats are ignored.
fn first_token(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
}
