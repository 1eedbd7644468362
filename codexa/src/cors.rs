//! Cross-origin policy.
//!
//! Origins are matched against a list of [`OriginRule`]s read from `auth.cors.allowed_origins`:
//!
//! - `https://codexa.example.com` allows exactly that origin
//! - `*.example.com` allows any `http(s)` origin whose host is a subdomain of `example.com`
//! - `localhost` allows `http(s)://localhost` and `http(s)://127.0.0.1` on any port
//!
//! Requests without an `Origin` header are not cross-origin and pass through untouched.

use crate::config::Config;
use axum::http::{self, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OriginRule {
    /// A literal origin, compared byte for byte
    Exact(String),
    /// Any subdomain of the given domain (stored without the leading `*.`)
    Suffix(String),
    /// Loopback origins on any port
    Localhost,
}

impl FromStr for OriginRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("origin rule cannot be empty".to_string());
        }
        if s == "*" {
            return Err("wildcard '*' is not a valid origin rule, list origins explicitly".to_string());
        }
        if s == "localhost" {
            return Ok(OriginRule::Localhost);
        }
        if let Some(domain) = s.strip_prefix("*.") {
            if domain.is_empty() || domain.contains('*') {
                return Err(format!("invalid wildcard origin rule: {s}"));
            }
            return Ok(OriginRule::Suffix(domain.to_ascii_lowercase()));
        }
        if !(s.starts_with("http://") || s.starts_with("https://")) {
            return Err(format!("origin must start with http:// or https://: {s}"));
        }
        Ok(OriginRule::Exact(s.trim_end_matches('/').to_string()))
    }
}

impl TryFrom<String> for OriginRule {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OriginRule> for String {
    fn from(rule: OriginRule) -> Self {
        rule.to_string()
    }
}

impl fmt::Display for OriginRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginRule::Exact(origin) => write!(f, "{origin}"),
            OriginRule::Suffix(domain) => write!(f, "*.{domain}"),
            OriginRule::Localhost => write!(f, "localhost"),
        }
    }
}

/// Split an origin into its host, discarding scheme and port. None for anything that is not
/// `http(s)://host[:port]`.
fn origin_host(origin: &str) -> Option<&str> {
    let rest = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    match rest.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => Some(host),
        Some(_) => None,
        None => Some(rest),
    }
}

impl OriginRule {
    pub fn matches(&self, origin: &str) -> bool {
        match self {
            OriginRule::Exact(allowed) => origin == allowed,
            OriginRule::Suffix(domain) => origin_host(origin)
                .map(|host| {
                    let host = host.to_ascii_lowercase();
                    host.len() > domain.len() + 1
                        && host.ends_with(domain.as_str())
                        && host[..host.len() - domain.len()].ends_with('.')
                })
                .unwrap_or(false),
            OriginRule::Localhost => matches!(origin_host(origin), Some("localhost" | "127.0.0.1")),
        }
    }
}

/// The single cross-origin predicate.
pub fn is_origin_allowed(origin: &str, rules: &[OriginRule]) -> bool {
    rules.iter().any(|rule| rule.matches(origin))
}

pub fn create_cors_layer(config: &Config) -> CorsLayer {
    let rules = config.auth.cors.allowed_origins.clone();
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &http::request::Parts| {
        let allowed = origin.to_str().map(|o| is_origin_allowed(o, &rules)).unwrap_or(false);
        if !allowed {
            warn!(origin = ?origin, "CORS blocked origin");
        }
        allowed
    });

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(config.auth.cors.allow_credentials)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION]);

    if let Some(max_age) = config.auth.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    cors
}
