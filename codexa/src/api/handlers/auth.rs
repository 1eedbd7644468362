use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use tracing::{debug, info, warn};

use crate::{
    AppState,
    api::{
        handlers::json_body,
        models::{
            auth::{AuthResponse, LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse, SessionEndedResponse},
            users::{CurrentUser, Role, UserResponse},
        },
    },
    auth::{
        current_user::presented_token,
        password, session,
        validation::{self, NewAccount},
    },
    config::Config,
    db::models::users::{UserCreateDBRequest, UserDBResponse},
    errors::{Error, ErrorBody},
    types::abbrev_uuid,
};

const INVALID_CREDENTIALS: &str = "Invalid Credentials";

/// Register a new user account
#[utoipa::path(
    post,
    path = "/user/register",
    request_body = RegisterRequest,
    tag = "user",
    responses(
        (status = 201, description = "User registered and signed in", body = AuthResponse),
        (status = 400, description = "Missing field, invalid email, weak password or email taken", body = ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<RegisterResponse, Error> {
    let request = json_body(payload)?;
    let account = validation::validate_registration(request, &state.config.auth.password.policy())?;

    let created_user = create_account(&state, account, Role::User).await?;
    info!("Registered user {}", abbrev_uuid(&created_user.id));

    let (cookie, token) = issue_session(&CurrentUser::from(&created_user), &state.config)?;
    // Register answers `{user, message}`; the body token is only a fallback when cookies are off
    let token = token.filter(|_| cookie.is_none());
    let auth_response = AuthResponse {
        user: UserResponse::from(created_user),
        message: "Registered Successfully".to_string(),
        token,
    };

    Ok(RegisterResponse { auth_response, cookie })
}

/// Register a user with a chosen role (admin only)
#[utoipa::path(
    post,
    path = "/user/admin/register",
    request_body = RegisterRequest,
    tag = "user",
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Missing field, invalid email, weak password or email taken", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(admin_id = %abbrev_uuid(&admin.id)))]
pub async fn admin_register(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), Error> {
    let request = json_body(payload)?;
    let role = request.role.unwrap_or_default();
    let account = validation::validate_registration(request, &state.config.auth.password.policy())?;

    let created_user = create_account(&state, account, role).await?;
    info!(role = %role, "Admin registered user {}", abbrev_uuid(&created_user.id));

    // The admin keeps their own session; no token is minted for the new account
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserResponse::from(created_user),
            message: "User Registered Successfully".to_string(),
            token: None,
        }),
    ))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    tag = "user",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, payload: Result<Json<LoginRequest>, JsonRejection>) -> Result<LoginResponse, Error> {
    let invalid_credentials = || Error::Unauthenticated {
        message: Some(INVALID_CREDENTIALS.to_string()),
    };

    let Ok(Json(request)) = payload else {
        return Err(invalid_credentials());
    };
    let (Some(email), Some(password)) = (request.email, request.password) else {
        return Err(invalid_credentials());
    };
    if email.trim().is_empty() || password.is_empty() {
        return Err(invalid_credentials());
    }

    // Unknown email and wrong password must be indistinguishable to the caller
    let user = state
        .store
        .user_by_email(&validation::normalize_email(&email))
        .await?
        .ok_or_else(invalid_credentials)?;

    let is_valid = password::verify_password_blocking(password, user.password_hash.clone()).await?;
    if !is_valid {
        debug!("Wrong password for user {}", abbrev_uuid(&user.id));
        return Err(invalid_credentials());
    }

    let (cookie, token) = issue_session(&CurrentUser::from(&user), &state.config)?;
    let auth_response = AuthResponse {
        user: UserResponse::from(user),
        message: "Login Successfully".to_string(),
        token,
    };

    Ok(LoginResponse { auth_response, cookie })
}

/// Logout (revoke the presented token and clear the cookie)
#[utoipa::path(
    post,
    path = "/user/logout",
    tag = "user",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 503, description = "Revocation store unavailable", body = ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<SessionEndedResponse, Error> {
    match presented_token(&headers, &state.config.auth.session).and_then(session::revocation_ticket) {
        Some(ticket) => {
            state.revocations.revoke(&ticket).await?;
            info!(expires_at = %ticket.expires_at, "Session token revoked");
        }
        None => debug!("Logout without a revocable token"),
    }

    Ok(SessionEndedResponse {
        body: MessageResponse::new("Logged Out Successfully"),
        cookie: clear_session_cookie(&state.config),
    })
}

/// Return the signed-in user
#[utoipa::path(
    get,
    path = "/user/check",
    tag = "user",
    responses(
        (status = 200, description = "Session is valid", body = AuthResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn check(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<AuthResponse>, Error> {
    let user = state
        .store
        .user_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("User Doesn't Exist".to_string()),
        })?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(user),
        message: "Valid User".to_string(),
        token: None,
    }))
}

/// Delete the signed-in user's account
#[utoipa::path(
    delete,
    path = "/user/profile",
    tag = "user",
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 404, description = "Account already deleted", body = ErrorBody),
        (status = 500, description = "Deletion failed", body = ErrorBody),
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn delete_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    current_user: CurrentUser,
) -> Result<SessionEndedResponse, Error> {
    let cascade = state.config.users.cascade_delete_submissions;
    let deleted = state.store.delete_user(current_user.id, cascade).await?;
    if !deleted {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: current_user.id.to_string(),
        });
    }
    info!(cascade, "Deleted user account");

    // The account is gone either way, so a failed revocation only leaves a dangling token
    if let Some(ticket) = presented_token(&headers, &state.config.auth.session).and_then(session::revocation_ticket)
        && let Err(e) = state.revocations.revoke(&ticket).await
    {
        warn!("Could not revoke session of deleted user: {e}");
    }

    Ok(SessionEndedResponse {
        body: MessageResponse::new("Deleted Successfully"),
        cookie: clear_session_cookie(&state.config),
    })
}

/// Hash the password and store the account. A taken email is a 400, like any other bad input.
async fn create_account(state: &AppState, account: NewAccount, role: Role) -> Result<UserDBResponse, Error> {
    let password_hash = password::hash_password_blocking(account.password, state.config.auth.password.argon2_params()).await?;

    state
        .store
        .create_user(UserCreateDBRequest {
            first_name: account.first_name,
            email: account.email,
            password_hash,
            role,
        })
        .await
        .map_err(|e| {
            if e.is_duplicate_email() {
                Error::BadRequest {
                    message: "An account with this email address already exists".to_string(),
                }
            } else {
                Error::Database(e)
            }
        })
}

/// Mint a session token and package it for the configured delivery mode: the `Set-Cookie`
/// value and the body `token`, each present only if that channel is enabled.
fn issue_session(user: &CurrentUser, config: &Config) -> Result<(Option<String>, Option<String>), Error> {
    let token = session::create_session_token(user, config)?;
    let delivery = config.auth.session.delivery;

    let cookie = delivery.uses_cookie().then(|| create_session_cookie(&token, config));
    let token = delivery.uses_body().then_some(token);
    Ok((cookie, token))
}

fn cookie_attributes(config: &Config) -> String {
    let session_config = &config.auth.session;
    let secure = if session_config.cookie_secure { "; Secure" } else { "" };
    format!("Path=/; HttpOnly{secure}; SameSite={}", session_config.cookie_same_site)
}

fn create_session_cookie(token: &str, config: &Config) -> String {
    let session_config = &config.auth.session;
    format!(
        "{}={}; {}; Max-Age={}",
        session_config.cookie_name,
        token,
        cookie_attributes(config),
        session_config.ttl.as_secs()
    )
}

fn clear_session_cookie(config: &Config) -> Option<String> {
    let session_config = &config.auth.session;
    session_config.delivery.uses_cookie().then(|| {
        format!(
            "{}=; {}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            session_config.cookie_name,
            cookie_attributes(config)
        )
    })
}
