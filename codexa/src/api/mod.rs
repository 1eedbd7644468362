//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Accounts** (`/user/*`): registration, login, logout, session check, account deletion
//! - **Submissions** (`/submission/*`): record a submission, list your own
//!
//! All endpoints carry `utoipa` annotations; the rendered reference is served at `/docs`.

pub mod handlers;
pub mod models;
