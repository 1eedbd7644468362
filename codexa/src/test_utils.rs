//! Helpers shared by the unit and HTTP tests.

use crate::{
    AppState,
    api::models::{auth::AuthResponse, users::{CurrentUser, Role, UserResponse}},
    auth::{
        revocation::{MemoryRevocationStore, RevocationError, RevocationStore},
        session::{self, RevocationTicket},
    },
    config::{Config, PasswordConfig},
    db::{models::users::UserCreateDBRequest, store::MemoryStore},
};
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use std::sync::Arc;

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: crate::config::AuthConfig {
            password: PasswordConfig {
                // Cheap hashing keeps the HTTP tests fast
                argon2_memory_kib: 1024,
                argon2_iterations: 1,
                argon2_parallelism: 1,
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Revocation list whose backing store cannot be reached.
pub struct UnreachableRevocationStore;

#[async_trait::async_trait]
impl RevocationStore for UnreachableRevocationStore {
    async fn revoke(&self, _ticket: &RevocationTicket) -> Result<(), RevocationError> {
        Err(RevocationError::Unavailable("connection refused".to_string()))
    }

    async fn is_revoked(&self, _key: &str) -> Result<bool, RevocationError> {
        Err(RevocationError::Unavailable("connection refused".to_string()))
    }
}

/// State over the in-memory user store and revocation list.
pub fn create_test_state(config: Config) -> AppState {
    let max_entries = config.revocation.max_entries;
    AppState::builder()
        .config(config)
        .store(Arc::new(MemoryStore::new()))
        .revocations(Arc::new(MemoryRevocationStore::new(max_entries)))
        .build()
}

pub fn create_test_server(config: Config) -> TestServer {
    create_test_server_with_state(create_test_state(config))
}

pub fn create_test_server_with_state(state: AppState) -> TestServer {
    TestServer::new(crate::build_router(&state)).expect("Failed to create test server")
}

/// Register through the API and return the created user.
pub async fn register_user(server: &TestServer, first_name: &str, email: &str, password: &str) -> UserResponse {
    let response = server
        .post("/user/register")
        .json(&json!({"firstName": first_name, "emailId": email, "password": password}))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<AuthResponse>().user
}

/// Log in through the API and return the session token from the body.
pub async fn login_token(server: &TestServer, email: &str, password: &str) -> String {
    let response = server
        .post("/user/login")
        .json(&json!({"emailId": email, "password": password}))
        .await;
    response.assert_status_ok();
    response.json::<AuthResponse>().token.expect("login should return a token")
}

/// Insert an admin straight into the store and mint a session for it.
pub async fn create_admin_session(state: &AppState) -> String {
    let admin = state
        .store
        .create_user(UserCreateDBRequest {
            first_name: "Admin".to_string(),
            email: format!("admin-{}@test.com", uuid::Uuid::new_v4()),
            password_hash: "unused".to_string(),
            role: Role::Admin,
        })
        .await
        .expect("Failed to create admin");
    session::create_session_token(&CurrentUser::from(&admin), &state.config).expect("Failed to mint admin session")
}
