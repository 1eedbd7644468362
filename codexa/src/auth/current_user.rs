use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    config::SessionConfig,
    errors::{Error, Result},
    types::abbrev_uuid,
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use tracing::{debug, error, instrument, trace};

/// Value of the named cookie, if the request carries it.
pub(crate) fn token_from_cookie<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value)
}

pub(crate) fn token_from_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The session token presented with a request: the cookie first, then the bearer header, each
/// only if the configured delivery mode hands tokens out that way.
pub(crate) fn presented_token<'a>(headers: &'a HeaderMap, session: &SessionConfig) -> Option<&'a str> {
    let from_cookie = session
        .delivery
        .uses_cookie()
        .then(|| token_from_cookie(headers, &session.cookie_name))
        .flatten();
    from_cookie.or_else(|| session.delivery.uses_body().then(|| token_from_bearer(headers)).flatten())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Some(token) = presented_token(&parts.headers, &state.config.auth.session) else {
            trace!("No session token found in request");
            return Err(Error::Unauthenticated {
                message: Some("Token is not present".to_string()),
            });
        };

        let user = session::verify_session_token(token, &state.config).map_err(|e| {
            match &e {
                Error::Internal { .. } => error!("Session verification failed: {e}"),
                _ => trace!("Session token rejected: {e:?}"),
            }
            Error::Unauthenticated {
                message: Some("Invalid Token".to_string()),
            }
        })?;

        match state.revocations.is_revoked(&session::revocation_key(token)).await {
            Ok(false) => {}
            Ok(true) => {
                debug!("Rejected revoked token for user {}", abbrev_uuid(&user.id));
                return Err(Error::Unauthenticated {
                    message: Some("Token has been revoked".to_string()),
                });
            }
            Err(e) => {
                // Fail closed
                error!("Revocation check failed, rejecting request: {e}");
                return Err(Error::Unauthenticated { message: None });
            }
        }

        debug!("Found JWT session authenticated user: {}", abbrev_uuid(&user.id));
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::users::Role,
        auth::{
            revocation::RevocationStore,
            session::{create_session_token, revocation_ticket},
        },
        config::TokenDelivery,
        test_utils::{UnreachableRevocationStore, create_test_config, create_test_state},
    };
    use axum::http::Request;
    use std::sync::Arc;
    use uuid::Uuid;

    fn parts_with_header(name: &str, value: &str) -> Parts {
        let request = Request::builder()
            .uri("http://localhost/test")
            .header(name, value)
            .body(())
            .unwrap();
        request.into_parts().0
    }

    fn test_user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "jane@x.com".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn test_cookie_parsing() {
        let parts = parts_with_header("cookie", "theme=dark; token=abc.def.ghi; other=1");
        assert_eq!(token_from_cookie(&parts.headers, "token"), Some("abc.def.ghi"));
        assert_eq!(token_from_cookie(&parts.headers, "missing"), None);

        let empty = parts_with_header("cookie", "token=");
        assert_eq!(token_from_cookie(&empty.headers, "token"), None);
    }

    #[test]
    fn test_bearer_only_when_body_delivery_enabled() {
        let parts = parts_with_header("authorization", "Bearer abc.def.ghi");
        let mut session = create_test_config().auth.session;

        session.delivery = TokenDelivery::Both;
        assert_eq!(presented_token(&parts.headers, &session), Some("abc.def.ghi"));

        session.delivery = TokenDelivery::Cookie;
        assert_eq!(presented_token(&parts.headers, &session), None);
    }

    #[tokio::test]
    async fn test_valid_cookie_authenticates() {
        let state = create_test_state(create_test_config());
        let user = test_user();
        let token = create_session_token(&user, &state.config).unwrap();

        let mut parts = parts_with_header("cookie", &format!("token={token}"));
        let extracted = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(extracted, user);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthenticated() {
        let state = create_test_state(create_test_config());
        let mut parts = parts_with_header("x-unrelated", "1");

        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_revoked_token_is_unauthenticated() {
        let state = create_test_state(create_test_config());
        let token = create_session_token(&test_user(), &state.config).unwrap();
        state.revocations.revoke(&revocation_ticket(&token).unwrap()).await.unwrap();

        let mut parts = parts_with_header("cookie", &format!("token={token}"));
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_revocation_store_failure_fails_closed() {
        let mut state = create_test_state(create_test_config());
        state.revocations = Arc::new(UnreachableRevocationStore);
        let token = create_session_token(&test_user(), &state.config).unwrap();

        let mut parts = parts_with_header("cookie", &format!("token={token}"));
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }
}
