//! Registration input checks.
//!
//! Runs before anything is hashed or stored. The error texts are part of the public contract: the
//! web client shows them verbatim.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::api::models::auth::RegisterRequest;
use crate::errors::Error;

// Dot-atom local part (UTF-8 allowed), dotted hostname, alphabetic or punycode TLD
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~\x{00A1}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFEF}-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~\x{00A1}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFEF}-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+(?:[A-Za-z]{2,63}|xn--[A-Za-z0-9-]{1,59})$",
    )
    .unwrap()
});

const MAX_EMAIL_LENGTH: usize = 254;
const MAX_LOCAL_PART_LENGTH: usize = 64;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Some Field Missing")]
    MissingField,
    #[error("Invalid Email")]
    InvalidEmail,
    #[error("Weak Password")]
    WeakPassword,
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::BadRequest { message: err.to_string() }
    }
}

/// Minimum character-class counts a password must meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub min_lowercase: usize,
    pub min_uppercase: usize,
    pub min_digits: usize,
    pub min_symbols: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            min_lowercase: 1,
            min_uppercase: 0,
            min_digits: 1,
            min_symbols: 0,
        }
    }
}

impl PasswordPolicy {
    pub fn is_satisfied_by(&self, password: &str) -> bool {
        let length = password.chars().count();
        if length < self.min_length || length > self.max_length {
            return false;
        }

        let (mut lower, mut upper, mut digits, mut symbols) = (0, 0, 0, 0);
        for c in password.chars() {
            if c.is_ascii_lowercase() {
                lower += 1;
            } else if c.is_ascii_uppercase() {
                upper += 1;
            } else if c.is_ascii_digit() {
                digits += 1;
            } else if c.is_ascii_punctuation() || c == ' ' {
                symbols += 1;
            }
        }

        lower >= self.min_lowercase && upper >= self.min_uppercase && digits >= self.min_digits && symbols >= self.min_symbols
    }
}

pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH {
        return false;
    }
    match email.split_once('@') {
        Some((local, _)) if local.len() <= MAX_LOCAL_PART_LENGTH => EMAIL_REGEX.is_match(email),
        _ => false,
    }
}

/// Canonical form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// A registration that passed every check, with its email normalized.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub first_name: String,
    pub email: String,
    pub password: String,
}

/// Check presence, then email shape, then password strength, stopping at the first failure.
pub fn validate_registration(request: RegisterRequest, policy: &PasswordPolicy) -> Result<NewAccount, ValidationError> {
    let (Some(first_name), Some(email), Some(password)) = (request.first_name, request.email, request.password) else {
        return Err(ValidationError::MissingField);
    };

    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidEmail);
    }

    if !policy.is_satisfied_by(&password) {
        return Err(ValidationError::WeakPassword);
    }

    Ok(NewAccount {
        first_name,
        email,
        password,
    })
}
