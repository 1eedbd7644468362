//! Authentication and authorization.
//!
//! Sessions are HS256 JWTs carrying `{_id, emailId, role}`. They are handed to the browser as an
//! `HttpOnly` cookie and, depending on `auth.session.delivery`, in the JSON body for clients that
//! send `Authorization: Bearer <token>` instead.
//!
//! A token is accepted when its signature checks out, it has not expired, and it is absent from
//! the revocation list that logout writes to. Failing any of those is a 401 and the handler
//! never runs.
//!
//! # Modules
//!
//! - [`current_user`]: [`CurrentUser`](crate::api::models::users::CurrentUser) extractor for protected handlers
//! - [`middleware`]: admin-only route guard
//! - [`password`]: Argon2 hashing and verification
//! - [`revocation`]: the logged-out token list and its backends
//! - [`session`]: token minting, verification, and the unverified expiry read used by logout
//! - [`validation`]: registration input checks
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use codexa::api::models::users::CurrentUser;
//!
//! async fn protected_handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.email)
//! }
//! ```

pub mod current_user;
pub mod middleware;
pub mod password;
pub mod revocation;
pub mod session;
pub mod validation;
