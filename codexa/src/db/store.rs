//! Application-facing storage seam.
//!
//! Handlers never talk to repositories directly; they go through [`Store`], which has a Postgres
//! backend ([`PgStore`]) for deployments and an in-memory backend ([`MemoryStore`]) used when
//! `database.type` is `memory` and throughout the HTTP tests.

use crate::db::{
    errors::{DbError, Result},
    handlers::{SubmissionFilter, Submissions, Users},
    models::{
        submissions::{SubmissionCreateDBRequest, SubmissionDBResponse},
        users::{UserCreateDBRequest, UserDBResponse},
    },
};
use crate::types::{UserId, abbrev_uuid};
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Insert a new user. Fails with a unique violation if the email is already taken.
    async fn create_user(&self, request: UserCreateDBRequest) -> Result<UserDBResponse>;

    async fn user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    async fn user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Delete a user. Returns false if no such user existed. Submissions are removed only when
    /// `cascade` is set.
    async fn delete_user(&self, id: UserId, cascade: bool) -> Result<bool>;

    async fn record_submission(&self, request: SubmissionCreateDBRequest) -> Result<SubmissionDBResponse>;

    /// A user's submissions, newest first.
    async fn submissions_for_user(&self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<SubmissionDBResponse>>;
}

/// Postgres-backed store, one pooled connection per call.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn create_user(&self, request: UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).create(&request).await
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_user_by_email(email).await
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_by_id(id).await
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete_user(&self, id: UserId, cascade: bool) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if cascade {
            let removed = Submissions::new(&mut tx).delete_for_user(id).await?;
            debug!(removed, "Cascaded submission deletion");
        }
        let deleted = Users::new(&mut tx).delete(id).await?;

        tx.commit().await?;
        Ok(deleted)
    }

    async fn record_submission(&self, request: SubmissionCreateDBRequest) -> Result<SubmissionDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Submissions::new(&mut conn).create(&request).await
    }

    async fn submissions_for_user(&self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<SubmissionDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Submissions::new(&mut conn)
            .list(&SubmissionFilter { user_id, skip, limit })
            .await
    }
}

/// Process-local store. Email uniqueness rests on the atomic entry API of the email index.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<UserId, UserDBResponse>,
    emails: DashMap<String, UserId>,
    // Insertion order per user; newest last
    submissions: DashMap<UserId, Vec<SubmissionDBResponse>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, request: UserCreateDBRequest) -> Result<UserDBResponse> {
        match self.emails.entry(request.email.clone()) {
            Entry::Occupied(_) => Err(DbError::duplicate_email()),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let user = UserDBResponse {
                    id: Uuid::new_v4(),
                    first_name: request.first_name,
                    email: request.email,
                    password_hash: request.password_hash,
                    role: request.role,
                    created_at: now,
                    updated_at: now,
                };
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let Some(id) = self.emails.get(email).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.value().clone()))
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.users.get(&id).map(|user| user.value().clone()))
    }

    async fn delete_user(&self, id: UserId, cascade: bool) -> Result<bool> {
        let Some((_, user)) = self.users.remove(&id) else {
            return Ok(false);
        };
        self.emails.remove(&user.email);
        if cascade {
            self.submissions.remove(&id);
        }
        Ok(true)
    }

    async fn record_submission(&self, request: SubmissionCreateDBRequest) -> Result<SubmissionDBResponse> {
        let submission = SubmissionDBResponse {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            problem_id: request.problem_id,
            language: request.language,
            code: request.code,
            status: "pending".to_string(),
            created_at: Utc::now(),
        };
        self.submissions
            .entry(submission.user_id)
            .or_default()
            .push(submission.clone());
        Ok(submission)
    }

    async fn submissions_for_user(&self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<SubmissionDBResponse>> {
        let Some(owned) = self.submissions.get(&user_id) else {
            return Ok(Vec::new());
        };
        Ok(owned
            .iter()
            .rev()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
