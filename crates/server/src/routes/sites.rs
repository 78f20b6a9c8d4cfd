use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use common::types::MessageBody;
use models::site_entry::{SiteEntry, SiteSubmission};
use tracing::{debug, info};

use crate::errors::ApiError;
use crate::metrics::{self, LIST_REQUESTS_TOTAL, REQUEST_DURATION, SUBMISSIONS_TOTAL};
use crate::state::AppState;

pub const SUBMITTED_MESSAGE: &str = "Site submitted successfully";

/// Accept one catalog entry.
#[utoipa::path(
    post,
    path = "/api/submit",
    tag = "sites",
    request_body = crate::openapi::SiteSubmissionDoc,
    responses(
        (status = 201, description = "Stored", body = crate::openapi::MessageDoc),
        (status = 400, description = "Malformed body, missing fields or rejected content", body = crate::openapi::ErrorDoc),
        (status = 405, description = "Wrong method", body = crate::openapi::ErrorDoc),
        (status = 409, description = "site_id already present (file backend)", body = crate::openapi::MessageDoc),
        (status = 413, description = "Body larger than the configured limit", body = crate::openapi::ErrorDoc),
        (status = 429, description = "Rate limited", body = crate::openapi::ErrorDoc),
        (status = 500, description = "Store unavailable", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn submit_site(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<MessageBody>), ApiError> {
    let timer = REQUEST_DURATION.with_label_values(&["submit"]).start_timer();
    let result = match body {
        Ok(body) => submit(&state, &body).await,
        Err(rejection) => Err(ApiError::from(rejection)),
    };
    timer.observe_duration();
    SUBMISSIONS_TOTAL.with_label_values(&[metrics::outcome(&result)]).inc();
    result
}

async fn submit(state: &AppState, body: &[u8]) -> Result<(StatusCode, Json<MessageBody>), ApiError> {
    let submission = decode_submission(body)?;
    let entry = state.index.submit(submission).await?;
    info!(site_id = %entry.site_id, backend = state.index.backend(), "site submitted");
    Ok((StatusCode::CREATED, Json(MessageBody::new(SUBMITTED_MESSAGE))))
}

/// Return every stored entry as a bare JSON array.
#[utoipa::path(
    get,
    path = "/api/list",
    tag = "sites",
    responses(
        (status = 200, description = "Full catalog", body = [crate::openapi::SiteEntryDoc]),
        (status = 405, description = "Wrong method", body = crate::openapi::ErrorDoc),
        (status = 429, description = "Rate limited", body = crate::openapi::ErrorDoc),
        (status = 500, description = "Store unavailable", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn list_sites(State(state): State<AppState>) -> Result<Json<Vec<SiteEntry>>, ApiError> {
    let timer = REQUEST_DURATION.with_label_values(&["list"]).start_timer();
    let result = state.index.list().await.map_err(ApiError::from);
    timer.observe_duration();
    LIST_REQUESTS_TOTAL.with_label_values(&[metrics::outcome(&result)]).inc();
    let entries = result?;
    debug!(count = entries.len(), "catalog listed");
    Ok(Json(entries))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// The body must be a JSON object; field presence is checked later.
fn decode_submission(body: &[u8]) -> Result<SiteSubmission, ApiError> {
    let invalid = || ApiError::BadRequest("invalid JSON payload".into());
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|_| invalid())?;
    if !value.is_object() {
        return Err(invalid());
    }
    serde_json::from_value(value).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_objects_with_missing_fields() {
        let s = decode_submission(br#"{"name":"n"}"#).unwrap();
        assert_eq!(s.name.as_deref(), Some("n"));
        assert!(s.site_id.is_none());
    }

    #[test]
    fn decode_rejects_non_objects_and_garbage() {
        for body in [&b"not json"[..], b"", b"[\"a\",\"b\",\"c\"]", b"42", br#"{"name": 5}"#] {
            assert!(matches!(decode_submission(body), Err(ApiError::BadRequest(_))));
        }
    }
}
