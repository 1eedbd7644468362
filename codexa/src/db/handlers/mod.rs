//! Repositories over a single Postgres connection.

pub mod submissions;
pub mod users;

pub use submissions::{SubmissionFilter, Submissions};
pub use users::Users;
