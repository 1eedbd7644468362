//! API request and response data models.
//!
//! API models are distinct from database models so the wire format can keep the web client's
//! field names (`_id`, `firstName`, `emailId`) while storage uses its own.
//!
//! - [`auth`]: registration, login and logout payloads
//! - [`pagination`]: `skip`/`limit` query parameters
//! - [`submissions`]: submission records
//! - [`users`]: roles, the public user view and the authenticated identity

pub mod auth;
pub mod pagination;
pub mod submissions;
pub mod users;
