//! Persistence layer.
//!
//! - [`handlers`]: Postgres repositories ([`handlers::Users`], [`handlers::Submissions`])
//! - [`models`]: row types read from and written to the database
//! - [`store`]: the [`store::Store`] seam used by the HTTP handlers, with Postgres and in-memory backends
//! - [`errors`]: [`errors::DbError`], the classified storage error

pub mod errors;
pub mod handlers;
pub mod models;
pub mod store;
