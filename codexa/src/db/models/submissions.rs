//! Database models for submissions.

use crate::types::{SubmissionId, UserId};
use chrono::{DateTime, Utc};

/// Database request for recording a submission
#[derive(Debug, Clone)]
pub struct SubmissionCreateDBRequest {
    pub user_id: UserId,
    pub problem_id: String,
    pub language: String,
    pub code: String,
}

/// Database response for a submission
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubmissionDBResponse {
    pub id: SubmissionId,
    pub user_id: UserId,
    pub problem_id: String,
    pub language: String,
    pub code: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
