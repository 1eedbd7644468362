//! Common type definitions.
//!
//! - Type aliases for entity IDs ([`UserId`], [`SubmissionId`])
//! - [`Operation`] used when reporting authorization failures
//! - [`abbrev_uuid`] for compact IDs in logs and spans

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type SubmissionId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Operations that can be refused by an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    /// Create an entity on behalf of someone else (e.g. admin registration)
    CreateAll,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll => write!(f, "create"),
        }
    }
}
