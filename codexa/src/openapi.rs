//! OpenAPI document for the `/user` and `/submission` surfaces, served at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, errors::ErrorBody};

/// Session token as the `token` cookie, or as a bearer token when body delivery is enabled.
struct SessionSecurityAddon;

impl Modify for SessionSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "token",
                    "Session cookie set by `/user/register` and `/user/login`.",
                ))),
            );
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "The `token` returned in the login body:\n\n```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Codexa API", description = "Accounts, sessions and submissions for the Codexa coding platform."),
    modifiers(&SessionSecurityAddon),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::admin_register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::check,
        api::handlers::auth::delete_profile,
        api::handlers::submissions::submit,
        api::handlers::submissions::history,
    ),
    components(schemas(
        api::models::auth::RegisterRequest,
        api::models::auth::LoginRequest,
        api::models::auth::AuthResponse,
        api::models::auth::MessageResponse,
        api::models::users::UserResponse,
        api::models::users::Role,
        api::models::submissions::SubmitRequest,
        api::models::submissions::SubmissionResponse,
        api::models::submissions::SubmissionCreatedResponse,
        ErrorBody,
    )),
    tags(
        (name = "user", description = "Registration, login, logout and account management"),
        (name = "submission", description = "Recording and listing code submissions"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes_and_security() {
        let doc = ApiDoc::openapi();

        for path in ["/user/register", "/user/admin/register", "/user/login", "/user/profile", "/submission/history"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }

        let schemes = &doc.components.expect("components").security_schemes;
        assert!(schemes.contains_key("CookieAuth"));
        assert!(schemes.contains_key("BearerAuth"));
    }
}
