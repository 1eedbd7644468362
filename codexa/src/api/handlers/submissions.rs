use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
};
use tracing::info;

use crate::{
    AppState,
    api::{
        handlers::{json_body, query_params},
        models::{
            pagination::Pagination,
            submissions::{SubmissionCreatedResponse, SubmissionResponse, SubmitRequest},
            users::CurrentUser,
        },
    },
    auth::validation::ValidationError,
    db::models::submissions::SubmissionCreateDBRequest,
    errors::{Error, ErrorBody},
    types::abbrev_uuid,
};

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Record a submission for a problem
///
/// The submission is stored as `pending`; judging happens elsewhere.
#[utoipa::path(
    post,
    path = "/submission/submit/{problem_id}",
    request_body = SubmitRequest,
    tag = "submission",
    params(("problem_id" = String, Path, description = "Problem the code is submitted for")),
    responses(
        (status = 201, description = "Submission recorded", body = SubmissionCreatedResponse),
        (status = 400, description = "Missing code or language", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), problem_id = %problem_id))]
pub async fn submit(
    State(state): State<AppState>,
    Path(problem_id): Path<String>,
    current_user: CurrentUser,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionCreatedResponse>), Error> {
    let request = json_body(payload)?;
    let (Some(code), Some(language)) = (non_empty(request.code), non_empty(request.language)) else {
        return Err(ValidationError::MissingField.into());
    };

    let submission = state
        .store
        .record_submission(SubmissionCreateDBRequest {
            user_id: current_user.id,
            problem_id,
            language,
            code,
        })
        .await?;
    info!("Recorded submission {}", abbrev_uuid(&submission.id));

    Ok((
        StatusCode::CREATED,
        Json(SubmissionCreatedResponse {
            submission: submission.into(),
        }),
    ))
}

/// List the caller's submissions, newest first
#[utoipa::path(
    get,
    path = "/submission/history",
    tag = "submission",
    params(Pagination),
    responses(
        (status = 200, description = "The caller's submissions", body = [SubmissionResponse]),
        (status = 400, description = "Malformed pagination", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    query: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<Vec<SubmissionResponse>>, Error> {
    let (skip, limit) = query_params(query)?.params();

    let submissions = state.store.submissions_for_user(current_user.id, skip, limit).await?;
    Ok(Json(submissions.into_iter().map(SubmissionResponse::from).collect()))
}
