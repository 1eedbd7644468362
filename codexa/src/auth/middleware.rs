use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::Error,
    types::Operation,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace};

/// Reject anyone who is not an authenticated admin. The admin's [`CurrentUser`] is left in the
/// request extensions for the handler.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    let (mut parts, body) = request.into_parts();
    let current_user = CurrentUser::from_request_parts(&mut parts, &state).await?;

    if !current_user.is_admin() {
        debug!("Non-admin {} refused at {}", current_user.email, parts.uri.path());
        return Err(Error::InsufficientPermissions {
            required: Role::Admin,
            action: Operation::CreateAll,
            resource: "users".to_string(),
        });
    }
    trace!("Admin check passed for {}", current_user.email);

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(current_user);
    Ok(next.run(request).await)
}
