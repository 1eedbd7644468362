//! API models for submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::submissions::SubmissionDBResponse;
use crate::types::{SubmissionId, UserId};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SubmitRequest {
    pub code: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SubmissionResponse {
    #[serde(rename = "_id")]
    #[schema(value_type = String, format = "uuid")]
    pub id: SubmissionId,
    #[serde(rename = "userId")]
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[serde(rename = "problemId")]
    pub problem_id: String,
    pub language: String,
    pub code: String,
    pub status: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmissionCreatedResponse {
    pub submission: SubmissionResponse,
}

impl From<SubmissionDBResponse> for SubmissionResponse {
    fn from(db: SubmissionDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            problem_id: db.problem_id,
            language: db.language,
            code: db.code,
            status: db.status,
            created_at: db.created_at,
        }
    }
}
