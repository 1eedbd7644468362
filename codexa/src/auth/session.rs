//! JWT session token creation and verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    api::models::users::{CurrentUser, Role},
    config::Config,
    errors::Error,
    types::UserId,
};

/// JWT session claims
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "_id")]
    pub sub: UserId,
    #[serde(rename = "emailId")]
    pub email: String,
    pub role: Role,
    pub exp: i64, // Expiration time
    pub iat: i64, // Issued at
}

impl SessionClaims {
    pub fn new(user: &CurrentUser, config: &Config) -> Self {
        let now = Utc::now();
        let exp = now + config.auth.session.ttl;

        Self {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

impl From<SessionClaims> for CurrentUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

fn secret_key(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "JWT sessions: secret_key is required".to_string(),
    })
}

/// Create a JWT token for a user session
pub fn create_session_token(user: &CurrentUser, config: &Config) -> Result<String, Error> {
    let claims = SessionClaims::new(user, config);
    let key = EncodingKey::from_secret(secret_key(config)?.as_bytes());

    encode(&Header::new(Algorithm::HS256), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify and decode a JWT session token. Expiry is checked with no leeway.
pub fn verify_session_token(token: &str, config: &Config) -> Result<CurrentUser, Error> {
    let key = DecodingKey::from_secret(secret_key(config)?.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::InvalidAudience
        | jsonwebtoken::errors::ErrorKind::InvalidSubject
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::Json(_)
        | jsonwebtoken::errors::ErrorKind::Utf8(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

        // Server errors (500) - key issues, internal failures
        jsonwebtoken::errors::ErrorKind::InvalidEcdsaKey
        | jsonwebtoken::errors::ErrorKind::InvalidRsaKey(_)
        | jsonwebtoken::errors::ErrorKind::RsaFailedSigning
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName
        | jsonwebtoken::errors::ErrorKind::InvalidKeyFormat
        | jsonwebtoken::errors::ErrorKind::MissingAlgorithm
        | jsonwebtoken::errors::ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    })?;

    Ok(CurrentUser::from(token_data.claims))
}

/// What logout needs to block a token: the store key and when the entry may be forgotten.
///
/// Carries no identity, so it cannot be used to authorize anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationTicket {
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ExpiryOnly {
    exp: i64,
}

/// Read a token's `exp` without checking its signature or expiry.
///
/// Returns None for anything that is not a structurally valid JWT with a numeric `exp`.
pub fn revocation_ticket(token: &str) -> Option<RevocationTicket> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = match decode::<ExpiryOnly>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data,
        Err(e) => {
            debug!("Token not revocable: {e}");
            return None;
        }
    };

    let expires_at = DateTime::from_timestamp(data.claims.exp, 0)?;
    Some(RevocationTicket {
        key: revocation_key(token),
        expires_at,
    })
}

/// Store key under which a revoked token is remembered.
pub fn revocation_key(token: &str) -> String {
    format!("token:{token}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;
    use uuid::Uuid;

    fn create_test_user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            role: Role::User,
        }
    }

    fn encode_claims(claims: &SessionClaims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_create_and_verify_session_token() {
        let config = create_test_config();
        let user = create_test_user();

        let token = create_session_token(&user, &config).unwrap();
        assert!(!token.is_empty());

        let verified_user = verify_session_token(&token, &config).unwrap();
        assert_eq!(verified_user, user);
    }

    #[test]
    fn test_claims_use_wire_names() {
        let config = create_test_config();
        let user = create_test_user();
        let claims = serde_json::to_value(SessionClaims::new(&user, &config)).unwrap();

        assert_eq!(claims["_id"], user.id.to_string());
        assert_eq!(claims["emailId"], "test@example.com");
        assert_eq!(claims["role"], "user");
        assert_eq!(
            claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
            config.auth.session.ttl.as_secs() as i64
        );
    }

    #[test]
    fn test_verify_token_wrong_secret() {
        let mut config = create_test_config();
        let token = create_session_token(&create_test_user(), &config).unwrap();

        config.secret_key = Some("different-secret".to_string());
        let result = verify_session_token(&token, &config);
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_verify_expired_token_has_no_leeway() {
        let config = create_test_config();
        let user = create_test_user();
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.id,
            email: user.email,
            role: user.role,
            // Well inside jsonwebtoken's default 60s leeway
            exp: (now - chrono::Duration::seconds(5)).timestamp(),
            iat: (now - chrono::Duration::seconds(3605)).timestamp(),
        };
        let token = encode_claims(&claims, config.secret_key.as_deref().unwrap());

        let result = verify_session_token(&token, &config);
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_verify_malformed_token() {
        let config = create_test_config();

        for token in ["not.a.token", "invalid", "", "too.many.parts.in.this.token"] {
            let result = verify_session_token(token, &config);
            assert!(
                matches!(result.unwrap_err(), Error::Unauthenticated { .. }),
                "Expected Unauthenticated error for token: {token}"
            );
        }
    }

    #[test]
    fn test_revocation_ticket_ignores_signature_and_expiry() {
        let config = create_test_config();
        let user = create_test_user();
        let exp = (Utc::now() - chrono::Duration::seconds(30)).timestamp();
        let claims = SessionClaims {
            sub: user.id,
            email: user.email,
            role: user.role,
            exp,
            iat: exp - 3600,
        };
        let token = encode_claims(&claims, "some-other-secret");
        assert!(verify_session_token(&token, &config).is_err());

        let ticket = revocation_ticket(&token).unwrap();
        assert_eq!(ticket.key, format!("token:{token}"));
        assert_eq!(ticket.expires_at.timestamp(), exp);
    }

    #[test]
    fn test_revocation_ticket_rejects_garbage() {
        assert!(revocation_ticket("").is_none());
        assert!(revocation_ticket("garbage").is_none());
        assert!(revocation_ticket("a.b.c").is_none());
    }
}
