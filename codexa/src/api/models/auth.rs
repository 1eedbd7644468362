//! Request and response payloads for the `/user` endpoints.
//!
//! Field names on the wire follow the web client (`firstName`, `emailId`); request fields are
//! optional so that absence can be reported as a validation failure rather than a parse error.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::users::{Role, UserResponse};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "emailId")]
    pub email: Option<String>,
    pub password: Option<String>,
    /// Only honoured on admin registration; self-registration always creates a `user`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(rename = "emailId")]
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Response after successful login or registration
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub message: String,
    /// Present on login when body delivery is enabled; on register only when no cookie is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Generic success response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

fn with_cookie<T: Serialize>(status: StatusCode, cookie: Option<String>, body: T) -> Response {
    match cookie {
        Some(cookie) => (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response(),
        None => (status, Json(body)).into_response(),
    }
}

/// Structured response for successful registration
pub struct RegisterResponse {
    pub auth_response: AuthResponse,
    pub cookie: Option<String>,
}

impl IntoResponse for RegisterResponse {
    fn into_response(self) -> Response {
        with_cookie(StatusCode::CREATED, self.cookie, self.auth_response)
    }
}

/// Structured response for successful login
pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookie: Option<String>,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        with_cookie(StatusCode::OK, self.cookie, self.auth_response)
    }
}

/// Response that ends the browser session: logout and account deletion
pub struct SessionEndedResponse {
    pub body: MessageResponse,
    pub cookie: Option<String>,
}

impl IntoResponse for SessionEndedResponse {
    fn into_response(self) -> Response {
        with_cookie(StatusCode::OK, self.cookie, self.body)
    }
}
