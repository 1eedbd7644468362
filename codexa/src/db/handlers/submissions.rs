//! Database repository for submissions.

use crate::types::{UserId, abbrev_uuid};
use crate::db::{
    errors::Result,
    models::submissions::{SubmissionCreateDBRequest, SubmissionDBResponse},
};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

const SUBMISSION_COLUMNS: &str = "id, user_id, problem_id, language, code, status, created_at";

/// Filter for listing a user's submissions
#[derive(Debug, Clone)]
pub struct SubmissionFilter {
    pub user_id: UserId,
    pub skip: i64,
    pub limit: i64,
}

pub struct Submissions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Submissions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Remove every submission owned by a user, returning how many were removed.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn delete_for_user(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM submissions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), problem_id = %request.problem_id), err)]
    pub async fn create(&mut self, request: &SubmissionCreateDBRequest) -> Result<SubmissionDBResponse> {
        let submission = sqlx::query_as::<_, SubmissionDBResponse>(&format!(
            r#"
            INSERT INTO submissions (id, user_id, problem_id, language, code)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SUBMISSION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.problem_id)
        .bind(&request.language)
        .bind(&request.code)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(submission)
    }

    /// A user's submissions, newest first.
    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id), limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &SubmissionFilter) -> Result<Vec<SubmissionDBResponse>> {
        let submissions = sqlx::query_as::<_, SubmissionDBResponse>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(filter.user_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(submissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_submissions_survive_without_user_row(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Submissions::new(&mut conn);
        let orphan_owner = Uuid::new_v4();

        let created = repo
            .create(&SubmissionCreateDBRequest {
                user_id: orphan_owner,
                problem_id: "two-sum".to_string(),
                language: "rust".to_string(),
                code: "fn main() {}".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.status, "pending");

        let listed = repo
            .list(&SubmissionFilter {
                user_id: orphan_owner,
                skip: 0,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        assert_eq!(listed[0].id, created.id);

        assert_eq!(repo.delete_for_user(orphan_owner).await.unwrap(), 1);
        let filter = SubmissionFilter {
            user_id: orphan_owner,
            skip: 0,
            limit: 10,
        };
        assert!(repo.list(&filter).await.unwrap().is_empty());
    }
}
