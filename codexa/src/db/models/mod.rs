//! Database record structures matching the table schemas in `migrations/`.

pub mod submissions;
pub mod users;
